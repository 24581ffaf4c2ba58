//! Prism Processing Library
//!
//! Decodes a source image once and produces every derivative of the job
//! matrix: shrink-only resize followed by progressive JPEG, palette PNG or
//! WebP encoding.

pub mod codec;
pub mod compression;
pub mod engine;
pub mod error;
pub mod image;

// Re-export commonly used types
#[cfg(feature = "native-codec")]
pub use codec::NativeCodec;
pub use codec::ImageCodec;
#[cfg(feature = "native-codec")]
pub use compression::ImageCompressor;
pub use compression::{JpegOptions, OutputFormat, PngOptions, WebPOptions};
pub use engine::{DerivativeEngine, JobOutcome};
pub use error::EncodeError;
pub use image::{resize_to_width, shrink_to_width};
