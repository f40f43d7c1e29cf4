//! Last-resort embedded-JPEG extraction.
//!
//! Raw containers embed one or more JPEG previews. When the native
//! decoder fails (or produces the all-black buffer some monochrome
//! JPEG-compressed variants trigger), the file is scanned for SOI/EOI
//! marker pairs and the largest decodable candidate wins.

use crate::error::{ApertureError, Result};
use image::DynamicImage;
use std::path::Path;

const SOI: [u8; 3] = [0xFF, 0xD8, 0xFF];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Minimum candidate size worth decoding. EXIF IFD1 thumbnails are a
/// few KB; anything smaller is marker noise.
const MIN_CANDIDATE_LEN: usize = 1024;

/// Extract and decode the largest embedded JPEG preview.
pub fn extract_embedded_jpeg(path: &Path) -> Result<DynamicImage> {
    let bytes = std::fs::read(path).map_err(|e| ApertureError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let candidates = scan_jpeg_segments(&bytes);
    if candidates.is_empty() {
        return Err(ApertureError::Decode {
            path: path.to_path_buf(),
            message: "no embedded JPEG preview found".into(),
        });
    }

    // Largest first: the biggest preview is the most useful one.
    let mut ordered: Vec<&(usize, usize)> = candidates.iter().collect();
    ordered.sort_by_key(|(start, end)| std::cmp::Reverse(end - start));

    for &&(start, end) in &ordered {
        match image::load_from_memory(&bytes[start..end]) {
            Ok(img) => {
                tracing::debug!(
                    "embedded preview {}..{} ({} bytes) decoded for {:?}",
                    start,
                    end,
                    end - start,
                    path
                );
                return Ok(img);
            }
            Err(e) => {
                tracing::debug!("candidate {}..{} failed to decode: {}", start, end, e);
            }
        }
    }

    Err(ApertureError::Decode {
        path: path.to_path_buf(),
        message: format!(
            "{} embedded JPEG candidate(s) found, none decodable",
            candidates.len()
        ),
    })
}

/// Byte ranges [start, end) of SOI..EOI candidates in `bytes`.
pub fn scan_jpeg_segments(bytes: &[u8]) -> Vec<(usize, usize)> {
    let mut segments = Vec::new();
    let mut pos = 0;
    while let Some(start) = find(bytes, &SOI, pos) {
        // Search the EOI from the end of the SOI marker onward.
        match find(bytes, &EOI, start + SOI.len()) {
            Some(eoi) => {
                let end = eoi + EOI.len();
                if end - start >= MIN_CANDIDATE_LEN {
                    segments.push((start, end));
                }
                // Next candidate may begin inside this range (nested
                // thumbnails), so only advance past the SOI.
                pos = start + SOI.len();
            }
            None => break,
        }
    }
    segments
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}
