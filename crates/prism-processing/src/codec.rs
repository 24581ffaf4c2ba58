//! Codec seam between the engine and the image libraries.
//!
//! The engine only talks to [`ImageCodec`]; [`NativeCodec`] is the production
//! implementation. Tests substitute their own to inject failures.

use bytes::Bytes;
use image::{DynamicImage, ImageFormat};
use prism_core::SourceFormat;
use std::borrow::Cow;

use crate::compression::OutputFormat;
use crate::error::EncodeError;
use crate::image::resize_to_width;

pub trait ImageCodec: Send + Sync + 'static {
    /// Decode raw source bytes. The format comes from the key, not from sniffing.
    fn decode(&self, data: &[u8], format: SourceFormat) -> Result<DynamicImage, EncodeError> {
        let image_format = match format {
            SourceFormat::Jpeg => ImageFormat::Jpeg,
            SourceFormat::Png => ImageFormat::Png,
        };
        image::load_from_memory_with_format(data, image_format).map_err(|e| {
            EncodeError::Decode {
                format,
                message: e.to_string(),
            }
        })
    }

    /// Shrink-only resize to `target_width`.
    fn resize<'a>(
        &self,
        img: &'a DynamicImage,
        target_width: u32,
    ) -> Result<Cow<'a, DynamicImage>, EncodeError> {
        resize_to_width(img, target_width)
    }

    fn encode(&self, img: &DynamicImage, format: &OutputFormat) -> Result<Bytes, EncodeError>;
}

/// mozjpeg / NeuQuant+png / libwebp
#[cfg(feature = "native-codec")]
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCodec;

#[cfg(feature = "native-codec")]
impl ImageCodec for NativeCodec {
    fn encode(&self, img: &DynamicImage, format: &OutputFormat) -> Result<Bytes, EncodeError> {
        crate::compression::ImageCompressor::compress(img, format)
    }
}
