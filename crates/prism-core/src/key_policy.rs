//! Key policy
//!
//! Decides from a storage key alone whether an object should be turned into
//! derivatives, and if so how the derivatives are named. Derivatives are written
//! back into the bucket that triggered the invocation, so this check is also what
//! stops the pipeline from reprocessing its own output.

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::catalog::VariantCatalog;
use crate::constants::NOCOMPRESSION_MARKER;
use crate::models::{DerivativeJob, SourceFormat};

/// Outcome of the key gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingDecision {
    Proceed,
    /// The key has no `.` at all
    SkipUnknownType,
    /// The extension is not jpg or png
    SkipUnsupportedType,
    /// The base name carries a catalog suffix or the no-compression marker
    SkipAlreadyDerivative,
}

impl ProcessingDecision {
    pub fn is_proceed(self) -> bool {
        self == ProcessingDecision::Proceed
    }
}

impl Display for ProcessingDecision {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let reason = match self {
            ProcessingDecision::Proceed => "proceed",
            ProcessingDecision::SkipUnknownType => "could not determine the image type",
            ProcessingDecision::SkipUnsupportedType => "unsupported image type",
            ProcessingDecision::SkipAlreadyDerivative => "already a derivative or excluded",
        };
        f.write_str(reason)
    }
}

/// Everything derived from a source key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Key with the final extension removed
    pub base_name: String,
    /// Extension token exactly as written in the key
    pub extension: Option<String>,
    pub format: Option<SourceFormat>,
    /// Last path segment of the base name followed by the lowercased extension
    pub folder_token: Option<String>,
    pub decision: ProcessingDecision,
}

impl Classification {
    /// The naming parts of a source that passed the gate, or `None` for any
    /// skip decision.
    pub fn into_source(self) -> Option<ClassifiedSource> {
        if !self.decision.is_proceed() {
            return None;
        }
        Some(ClassifiedSource {
            base_name: self.base_name,
            extension: self.extension?,
            format: self.format?,
            folder_token: self.folder_token?,
        })
    }
}

/// A source key that will be turned into derivatives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedSource {
    pub base_name: String,
    pub extension: String,
    pub format: SourceFormat,
    pub folder_token: String,
}

impl ClassifiedSource {
    /// Destination key for one derivative job:
    /// `{base_name}/{folder_token}{suffix}.{ext}`.
    pub fn destination_key(&self, job: &DerivativeJob) -> String {
        format!(
            "{}/{}{}.{}",
            self.base_name,
            self.folder_token,
            job.variant.suffix,
            job.output_extension(&self.extension)
        )
    }
}

/// Classify a (decoded) storage key.
///
/// Total over all inputs: unrecognised keys produce a skip decision.
pub fn classify(key: &str, catalog: &VariantCatalog) -> Classification {
    let Some(dot) = key.rfind('.') else {
        return Classification {
            base_name: key.to_string(),
            extension: None,
            format: None,
            folder_token: None,
            decision: ProcessingDecision::SkipUnknownType,
        };
    };

    let extension = &key[dot + 1..];
    let lowered = extension.to_lowercase();

    let Some(format) = SourceFormat::from_extension(&lowered) else {
        return Classification {
            base_name: strip_final_extension(key).to_string(),
            extension: Some(extension.to_string()),
            format: None,
            folder_token: None,
            decision: ProcessingDecision::SkipUnsupportedType,
        };
    };

    // A supported extension has no '/' or '.', so the final dot is exactly
    // where the extension starts.
    let base_name = &key[..dot];
    let folder_token = format!("{}{}", final_segment(base_name), lowered);

    let decision = if base_name.ends_with(NOCOMPRESSION_MARKER)
        || catalog.find_by_trailing_suffix(base_name).is_some()
    {
        ProcessingDecision::SkipAlreadyDerivative
    } else {
        ProcessingDecision::Proceed
    };

    Classification {
        base_name: base_name.to_string(),
        extension: Some(extension.to_string()),
        format: Some(format),
        folder_token: Some(folder_token),
        decision,
    }
}

/// Remove a trailing `.ext` where `ext` is non-empty and holds no `/` or `.`.
fn strip_final_extension(key: &str) -> &str {
    match key.rfind('.') {
        Some(dot) => {
            let ext = &key[dot + 1..];
            if ext.is_empty() || ext.contains('/') {
                key
            } else {
                &key[..dot]
            }
        }
        None => key,
    }
}

fn final_segment(path: &str) -> &str {
    match path.rfind('/') {
        Some(slash) => &path[slash + 1..],
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::VariantSpec;
    use crate::models::TargetFormat;

    fn decide(key: &str) -> ProcessingDecision {
        classify(key, &VariantCatalog::standard()).decision
    }

    #[test]
    fn test_keys_without_dot_are_unknown() {
        for key in ["", "photos/vacation", "README", "a/b/c", "no_extension_here"] {
            assert_eq!(decide(key), ProcessingDecision::SkipUnknownType, "{key}");
        }
        let classification = classify("photos/vacation", &VariantCatalog::standard());
        assert_eq!(classification.extension, None);
        assert_eq!(classification.base_name, "photos/vacation");
    }

    #[test]
    fn test_unsupported_extensions() {
        for key in [
            "photo.gif",
            "photo.jpeg",
            "photo.webp",
            "photo.",
            "photo.tar.gz",
            "photos.v2/image",
            "photo.jpg.bak",
            "photo-sm.gif",
        ] {
            assert_eq!(decide(key), ProcessingDecision::SkipUnsupportedType, "{key}");
        }
    }

    #[test]
    fn test_unsupported_base_name() {
        let catalog = VariantCatalog::standard();
        assert_eq!(classify("photo.tar.gz", &catalog).base_name, "photo.tar");
        assert_eq!(classify("photos.v2/image", &catalog).base_name, "photos.v2/image");
        assert_eq!(
            classify("photos.v2/image", &catalog).extension.as_deref(),
            Some("v2/image")
        );
        assert_eq!(classify("photo.", &catalog).base_name, "photo.");
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        for key in ["a.jpg", "a.JPG", "a.Jpg", "a.png", "a.PNG", "dir/a.pNg"] {
            assert_eq!(decide(key), ProcessingDecision::Proceed, "{key}");
        }
    }

    #[test]
    fn test_derivative_suffixes_are_skipped() {
        for suffix in ["-sm", "-md", "-lg", "-xl", "-pl", "_nocompression"] {
            for ext in ["jpg", "png", "JPG"] {
                let key = format!("photos/vacation{suffix}.{ext}");
                assert_eq!(
                    decide(&key),
                    ProcessingDecision::SkipAlreadyDerivative,
                    "{key}"
                );
            }
        }
    }

    #[test]
    fn test_generated_keys_are_never_reprocessed() {
        let catalog = VariantCatalog::standard();
        let source = classify("photos/vacation.jpg", &catalog).into_source().unwrap();
        for job in DerivativeJob::matrix(&catalog) {
            let key = source.destination_key(&job);
            let decision = classify(&key, &catalog).decision;
            assert_ne!(decision, ProcessingDecision::Proceed, "{key}");
        }
    }

    #[test]
    fn test_suffix_must_be_at_end_of_base_name() {
        assert_eq!(decide("photos/-sm/vacation.jpg"), ProcessingDecision::Proceed);
        assert_eq!(decide("photos/vacation-small.jpg"), ProcessingDecision::Proceed);
        assert_eq!(
            decide("photos/vacation_nocompression_v2.jpg"),
            ProcessingDecision::Proceed
        );
    }

    #[test]
    fn test_alternate_catalog_drives_skip_decision() {
        let catalog =
            VariantCatalog::new(vec![VariantSpec::new("thumb", 100, 50, "@thumb")]).unwrap();
        assert_eq!(
            classify("a/b@thumb.png", &catalog).decision,
            ProcessingDecision::SkipAlreadyDerivative
        );
        assert_eq!(classify("a/b-sm.png", &catalog).decision, ProcessingDecision::Proceed);
    }

    #[test]
    fn test_classification_fields() {
        let classification = classify("photos/vacation.jpg", &VariantCatalog::standard());
        assert_eq!(classification.base_name, "photos/vacation");
        assert_eq!(classification.extension.as_deref(), Some("jpg"));
        assert_eq!(classification.format, Some(SourceFormat::Jpeg));
        assert_eq!(classification.folder_token.as_deref(), Some("vacationjpg"));
        assert_eq!(classification.decision, ProcessingDecision::Proceed);
    }

    #[test]
    fn test_folder_token_without_directory() {
        let classification = classify("logo.png", &VariantCatalog::standard());
        assert_eq!(classification.base_name, "logo");
        assert_eq!(classification.folder_token.as_deref(), Some("logopng"));
    }

    #[test]
    fn test_destination_keys() {
        let catalog = VariantCatalog::standard();
        let source = classify("photos/vacation.jpg", &catalog).into_source().unwrap();
        let mobile = catalog.get("mobile").unwrap().clone();

        assert_eq!(
            source.destination_key(&DerivativeJob::new(mobile.clone(), TargetFormat::Original)),
            "photos/vacation/vacationjpg-sm.jpg"
        );
        assert_eq!(
            source.destination_key(&DerivativeJob::new(mobile, TargetFormat::WebP)),
            "photos/vacation/vacationjpg-sm.webp"
        );
    }

    #[test]
    fn test_destination_key_keeps_extension_case() {
        let catalog = VariantCatalog::standard();
        let source = classify("Photo.JPG", &catalog).into_source().unwrap();
        let tablet = catalog.get("tablet").unwrap().clone();

        assert_eq!(
            source.destination_key(&DerivativeJob::new(tablet.clone(), TargetFormat::Original)),
            "Photo/Photojpg-md.JPG"
        );
        assert_eq!(
            source.destination_key(&DerivativeJob::new(tablet, TargetFormat::WebP)),
            "Photo/Photojpg-md.webp"
        );
    }

    #[test]
    fn test_only_proceed_yields_a_source() {
        let catalog = VariantCatalog::standard();
        for key in ["photo.gif", "photo", "photo-sm.jpg", "photo_nocompression.png"] {
            assert!(classify(key, &catalog).into_source().is_none(), "{key}");
        }

        let source = classify("dir/Logo.PNG", &catalog).into_source().unwrap();
        assert_eq!(
            source,
            ClassifiedSource {
                base_name: "dir/Logo".to_string(),
                extension: "PNG".to_string(),
                format: SourceFormat::Png,
                folder_token: "Logopng".to_string(),
            }
        );
    }

    #[test]
    fn test_classify_is_deterministic() {
        let catalog = VariantCatalog::standard();
        for key in ["photos/vacation.jpg", "x.png", "y.gif", "z", "w-sm.jpg"] {
            assert_eq!(classify(key, &catalog), classify(key, &catalog));
        }
    }
}
