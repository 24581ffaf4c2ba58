//! Shrink-only width resize

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::borrow::Cow;

use crate::error::EncodeError;

/// Output dimensions for fitting `(width, height)` to `target_width` without
/// ever enlarging. Height follows the aspect ratio, rounded, at least 1px.
pub fn shrink_to_width(
    width: u32,
    height: u32,
    target_width: u32,
) -> Result<(u32, u32), EncodeError> {
    if width == 0 || height == 0 || target_width == 0 {
        return Err(EncodeError::DegenerateDimensions {
            width: if target_width == 0 { 0 } else { width },
            height,
        });
    }

    if width <= target_width {
        return Ok((width, height));
    }

    let scaled =
        (u64::from(height) * u64::from(target_width) + u64::from(width) / 2) / u64::from(width);
    Ok((target_width, scaled.max(1) as u32))
}

/// Resize `img` to `target_width`, borrowing it untouched when no shrink is needed.
pub fn resize_to_width(
    img: &DynamicImage,
    target_width: u32,
) -> Result<Cow<'_, DynamicImage>, EncodeError> {
    let (width, height) = img.dimensions();
    let (dst_w, dst_h) = shrink_to_width(width, height, target_width)?;

    if (dst_w, dst_h) == (width, height) {
        return Ok(Cow::Borrowed(img));
    }

    tracing::debug!(
        from_width = width,
        from_height = height,
        to_width = dst_w,
        to_height = dst_h,
        "Resizing image"
    );

    Ok(Cow::Owned(img.resize_exact(dst_w, dst_h, FilterType::Lanczos3)))
}
