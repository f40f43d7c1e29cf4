//! Native RAW decode via rawler.
//!
//! Some monochrome JPEG-compressed raw variants decode "successfully"
//! into an all-zero buffer; that diagnostic is surfaced as an error so
//! the registry falls through to the embedded-preview extractor.

use crate::error::{ApertureError, Result};
use image::DynamicImage;
use std::path::Path;

/// Mean-luminance floor below which a decode is treated as the
/// all-black diagnostic.
const BLACK_FRAME_MEAN: f64 = 1.0;

pub fn decode_raw(path: &Path) -> Result<DynamicImage> {
    let raw = rawler::decode_file(path).map_err(|e| ApertureError::Decode {
        path: path.to_path_buf(),
        message: format!("rawler decode failed: {}", e),
    })?;

    let developed = rawler::imgop::develop::RawDevelop::default()
        .develop_intermediate(&raw)
        .map_err(|e| ApertureError::Decode {
            path: path.to_path_buf(),
            message: format!("raw develop failed: {}", e),
        })?;

    let img = developed.to_dynamic_image().ok_or_else(|| ApertureError::Decode {
        path: path.to_path_buf(),
        message: "developed raw has unsupported layout".into(),
    })?;

    if is_black_frame(&img) {
        return Err(ApertureError::Decode {
            path: path.to_path_buf(),
            message: "raw decode produced an all-black buffer".into(),
        });
    }
    Ok(img)
}

/// All-zero / all-black detection over a cheap downsample.
pub fn is_black_frame(img: &DynamicImage) -> bool {
    let sample = img
        .resize(64, 64, image::imageops::FilterType::Triangle)
        .to_luma8();
    let (count, sum) = sample
        .pixels()
        .fold((0u64, 0u64), |(n, s), p| (n + 1, s + p.0[0] as u64));
    if count == 0 {
        return true;
    }
    (sum as f64 / count as f64) < BLACK_FRAME_MEAN
}
