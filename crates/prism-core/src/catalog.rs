//! Variant catalog
//!
//! The catalog is the ordered table of size presets every source image is
//! rendered into. It is built once at startup and handed to the key policy and
//! the derivative engine explicitly, so tests can swap in alternate tables.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Catalog construction errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("variant catalog is empty")]
    Empty,

    #[error("variant '{name}' has an empty suffix")]
    EmptySuffix { name: String },

    #[error("duplicate variant suffix '{suffix}'")]
    DuplicateSuffix { suffix: String },

    #[error("variant '{name}' has a zero target width")]
    ZeroWidth { name: String },

    #[error("variant '{name}' has quality {quality}, expected 0-100")]
    QualityOutOfRange { name: String, quality: u8 },

    #[error("failed to read variant catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse variant catalog {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One named output sizing preset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSpec {
    pub name: String,
    pub target_width: u32,
    pub quality: u8,
    pub suffix: String,
}

impl VariantSpec {
    pub fn new(name: &str, target_width: u32, quality: u8, suffix: &str) -> Self {
        Self {
            name: name.to_string(),
            target_width,
            quality,
            suffix: suffix.to_string(),
        }
    }
}

/// Immutable, ordered set of variant presets.
///
/// Invariants (checked by [`VariantCatalog::new`]): at least one entry, every
/// suffix non-empty and unique, every width positive, every quality in 0-100.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantCatalog {
    variants: Vec<VariantSpec>,
}

impl VariantCatalog {
    pub fn new(variants: Vec<VariantSpec>) -> Result<Self, CatalogError> {
        if variants.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        for variant in &variants {
            if variant.suffix.is_empty() {
                return Err(CatalogError::EmptySuffix {
                    name: variant.name.clone(),
                });
            }
            if !seen.insert(variant.suffix.as_str()) {
                return Err(CatalogError::DuplicateSuffix {
                    suffix: variant.suffix.clone(),
                });
            }
            if variant.target_width == 0 {
                return Err(CatalogError::ZeroWidth {
                    name: variant.name.clone(),
                });
            }
            if variant.quality > 100 {
                return Err(CatalogError::QualityOutOfRange {
                    name: variant.name.clone(),
                    quality: variant.quality,
                });
            }
        }

        Ok(Self { variants })
    }

    /// The built-in responsive image table.
    pub fn standard() -> Self {
        Self {
            variants: vec![
                VariantSpec::new("mobile", 640, 40, "-sm"),
                VariantSpec::new("tablet", 768, 60, "-md"),
                VariantSpec::new("small-laptop", 1080, 80, "-lg"),
                VariantSpec::new("widescreen", 1440, 100, "-xl"),
                VariantSpec::new("placeholder", 1440, 30, "-pl"),
            ],
        }
    }

    /// Load a catalog from a JSON array of variant specs.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let variants: Vec<VariantSpec> =
            serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        Self::new(variants)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariantSpec> {
        self.variants.iter()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Find the variant whose suffix terminates `name`, if any.
    pub fn find_by_trailing_suffix(&self, name: &str) -> Option<&VariantSpec> {
        self.variants.iter().find(|v| name.ends_with(&v.suffix))
    }

    pub fn get(&self, name: &str) -> Option<&VariantSpec> {
        self.variants.iter().find(|v| v.name == name)
    }
}

impl Default for VariantCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
