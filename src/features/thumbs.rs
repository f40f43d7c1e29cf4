//! Thumbnail generation.
//!
//! Lanczos3 downsample preserving aspect ratio, one JPEG per size tag.
//! A size tag names the longest edge; variants larger than the source
//! are omitted unless the caller opts into upscaling. Grayscale sources
//! are promoted to RGB before encoding.

use crate::catalog::model::THUMBNAIL_SIZES;
use crate::error::{ApertureError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

pub const JPEG_QUALITY: u8 = 85;

/// Generate the standard thumbnail set for an oriented image.
/// Returns (size, jpeg bytes) pairs, smallest first.
pub fn generate_thumbnails(img: &DynamicImage) -> Result<Vec<(u32, Vec<u8>)>> {
    generate_thumbnails_with(img, &THUMBNAIL_SIZES, false)
}

/// Generate thumbnails for explicit sizes. `allow_upscale` lets a
/// caller force variants larger than the source.
pub fn generate_thumbnails_with(
    img: &DynamicImage,
    sizes: &[u32],
    allow_upscale: bool,
) -> Result<Vec<(u32, Vec<u8>)>> {
    let longest = img.width().max(img.height());
    let mut out = Vec::new();
    for &size in sizes {
        if size > longest && !allow_upscale {
            tracing::debug!(
                "thumbnail {}px omitted: source longest edge is {}px",
                size,
                longest
            );
            continue;
        }
        let resized = img.resize(size, size, FilterType::Lanczos3);
        out.push((size, encode_jpeg(&resized)?));
    }
    Ok(out)
}

/// Encode as JPEG at the catalog quality. The encoder rejects some
/// grayscale/alpha layouts, so everything goes through an RGB8 buffer.
pub fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>> {
    let rgb = img.to_rgb8();
    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)
        .map_err(|e| ApertureError::Decode {
            path: Default::default(),
            message: format!("jpeg encode failed: {}", e),
        })?;
    Ok(bytes)
}
