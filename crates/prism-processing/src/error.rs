use prism_core::SourceFormat;
use thiserror::Error;

/// Derivative encoding errors. Every variant is fatal for the invocation.
#[derive(Debug, Clone, Error)]
pub enum EncodeError {
    #[error("source is not a valid {format} image: {message}")]
    Decode {
        format: SourceFormat,
        message: String,
    },

    #[error("degenerate dimensions {width}x{height}")]
    DegenerateDimensions { width: u32, height: u32 },

    #[error("source resolution {width}x{height} exceeds {max_pixels} pixels")]
    ResolutionTooLarge {
        width: u32,
        height: u32,
        max_pixels: u64,
    },

    #[error("codec failure: {0}")]
    Codec(String),
}

impl EncodeError {
    pub fn codec(err: impl std::fmt::Display) -> Self {
        EncodeError::Codec(err.to_string())
    }
}
