//! Pipeline data model: source descriptors, derivative jobs and artifacts.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::catalog::{VariantCatalog, VariantSpec};
use crate::constants::WEBP_EXTENSION;

/// Identifies the object that triggered an invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub bucket: String,
    pub key: String,
}

impl SourceDescriptor {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl Display for SourceDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Source encodings the pipeline accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    Jpeg,
    Png,
}

impl SourceFormat {
    /// Match a lowercased extension token.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "jpg" => Some(SourceFormat::Jpeg),
            "png" => Some(SourceFormat::Png),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            SourceFormat::Jpeg => "jpg",
            SourceFormat::Png => "png",
        }
    }
}

impl Display for SourceFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.extension())
    }
}

/// Which encoding a derivative is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    /// Same encoding as the source (jpg stays jpg, png stays png)
    Original,
    WebP,
}

/// One (variant × target format) cell of the output matrix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivativeJob {
    pub variant: VariantSpec,
    pub target: TargetFormat,
}

impl DerivativeJob {
    pub fn new(variant: VariantSpec, target: TargetFormat) -> Self {
        Self { variant, target }
    }

    /// Build the full job set for a catalog: every variant in the source
    /// format, followed by every variant as WebP.
    pub fn matrix(catalog: &VariantCatalog) -> Vec<DerivativeJob> {
        [TargetFormat::Original, TargetFormat::WebP]
            .into_iter()
            .flat_map(|target| {
                catalog
                    .iter()
                    .map(move |variant| DerivativeJob::new(variant.clone(), target))
            })
            .collect()
    }

    /// File extension for this job's output. `original_extension` is the
    /// extension token exactly as written in the source key.
    pub fn output_extension<'a>(&self, original_extension: &'a str) -> &'a str {
        match self.target {
            TargetFormat::Original => original_extension,
            TargetFormat::WebP => WEBP_EXTENSION,
        }
    }
}

impl Display for DerivativeJob {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let target = match self.target {
            TargetFormat::Original => "original",
            TargetFormat::WebP => WEBP_EXTENSION,
        };
        write!(f, "{}/{}", self.variant.name, target)
    }
}

/// An encoded derivative waiting to be written
#[derive(Debug, Clone)]
pub struct DerivativeArtifact {
    pub job: DerivativeJob,
    pub destination_key: String,
    pub bytes: Bytes,
    pub content_type: String,
}
