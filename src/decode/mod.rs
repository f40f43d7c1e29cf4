//! Image decoding: a registry of decoder capabilities with an ordered
//! fallback chain. Standard containers go through the `image` crate,
//! raw sensor files through rawler, and the embedded-JPEG extractor is
//! the last resort for raw files whose native decode fails or comes
//! back all-black.

pub mod orientation;
pub mod preview;
pub mod raw;

pub use orientation::OrientationTracker;

use crate::catalog::model::DecodeSource;
use crate::error::{ApertureError, Result};
use image::DynamicImage;
use std::path::Path;

const STANDARD_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "webp"];
const RAW_EXTENSIONS: &[&str] = &[
    "cr2", "cr3", "nef", "arw", "dng", "orf", "rw2", "raf", "pef", "srw",
];

/// Broad input class, used by discovery to decide whether a file enters
/// the pipeline at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Standard,
    Raw,
}

/// Classify a file by extension, falling back to magic bytes for files
/// with unknown or missing extensions.
pub fn sniff_format(path: &Path) -> Option<FileKind> {
    if let Some(ext) = extension(path) {
        if STANDARD_EXTENSIONS.contains(&ext.as_str()) {
            return Some(FileKind::Standard);
        }
        if RAW_EXTENSIONS.contains(&ext.as_str()) {
            return Some(FileKind::Raw);
        }
    }
    sniff_magic(path)
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
}

fn sniff_magic(path: &Path) -> Option<FileKind> {
    use std::io::Read;
    let mut head = [0u8; 12];
    let mut f = std::fs::File::open(path).ok()?;
    let n = f.read(&mut head).ok()?;
    let head = &head[..n];
    if head.starts_with(&[0xFF, 0xD8, 0xFF])
        || head.starts_with(b"\x89PNG\r\n\x1a\n")
        || (head.starts_with(b"RIFF") && head.get(8..12) == Some(&b"WEBP"[..]))
        || head.starts_with(b"II*\x00")
        || head.starts_with(b"MM\x00*")
    {
        return Some(FileKind::Standard);
    }
    None
}

/// A decoded image plus provenance and any warnings the fallback chain
/// produced along the way.
#[derive(Debug)]
pub struct DecodedImage {
    pub image: DynamicImage,
    pub source: DecodeSource,
    pub warnings: Vec<String>,
}

/// One decoder capability.
pub trait ImageDecoder: Send + Sync {
    fn name(&self) -> &'static str;
    fn source(&self) -> DecodeSource;
    fn can_decode(&self, path: &Path) -> bool;
    fn decode(&self, path: &Path) -> Result<DynamicImage>;
}

struct StandardDecoder;

impl ImageDecoder for StandardDecoder {
    fn name(&self) -> &'static str {
        "standard"
    }
    fn source(&self) -> DecodeSource {
        DecodeSource::Standard
    }
    fn can_decode(&self, path: &Path) -> bool {
        match extension(path) {
            Some(ext) => STANDARD_EXTENSIONS.contains(&ext.as_str()),
            None => sniff_magic(path) == Some(FileKind::Standard),
        }
    }
    fn decode(&self, path: &Path) -> Result<DynamicImage> {
        image::open(path).map_err(|e| match e {
            image::ImageError::IoError(io) => ApertureError::Io {
                path: path.to_path_buf(),
                message: io.to_string(),
            },
            other => ApertureError::Decode {
                path: path.to_path_buf(),
                message: other.to_string(),
            },
        })
    }
}

struct RawDecoder;

impl ImageDecoder for RawDecoder {
    fn name(&self) -> &'static str {
        "raw"
    }
    fn source(&self) -> DecodeSource {
        DecodeSource::Raw
    }
    fn can_decode(&self, path: &Path) -> bool {
        matches!(extension(path), Some(ext) if RAW_EXTENSIONS.contains(&ext.as_str()))
    }
    fn decode(&self, path: &Path) -> Result<DynamicImage> {
        raw::decode_raw(path)
    }
}

struct EmbeddedPreviewDecoder;

impl ImageDecoder for EmbeddedPreviewDecoder {
    fn name(&self) -> &'static str {
        "embedded_preview"
    }
    fn source(&self) -> DecodeSource {
        DecodeSource::EmbeddedPreview
    }
    fn can_decode(&self, path: &Path) -> bool {
        // Last resort for raw containers only; a standard file that the
        // image crate rejects is simply broken.
        matches!(extension(path), Some(ext) if RAW_EXTENSIONS.contains(&ext.as_str()))
    }
    fn decode(&self, path: &Path) -> Result<DynamicImage> {
        preview::extract_embedded_jpeg(path)
    }
}

/// Ordered decoder chain. The first capable decoder that succeeds wins;
/// failures are downgraded to warnings while a later decoder remains.
pub struct DecoderRegistry {
    decoders: Vec<Box<dyn ImageDecoder>>,
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self {
            decoders: vec![
                Box::new(StandardDecoder),
                Box::new(RawDecoder),
                Box::new(EmbeddedPreviewDecoder),
            ],
        }
    }
}

impl DecoderRegistry {
    pub fn decode(&self, path: &Path) -> Result<DecodedImage> {
        let mut warnings = Vec::new();
        let mut last_err: Option<ApertureError> = None;

        for decoder in self.decoders.iter().filter(|d| d.can_decode(path)) {
            match decoder.decode(path) {
                Ok(image) => {
                    if !warnings.is_empty() {
                        tracing::debug!(
                            "{:?} decoded via {} after fallback",
                            path,
                            decoder.name()
                        );
                    }
                    return Ok(DecodedImage {
                        image,
                        source: decoder.source(),
                        warnings,
                    });
                }
                Err(e) => {
                    warnings.push(format!("{} decoder: {}", decoder.name(), e));
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ApertureError::Decode {
            path: path.to_path_buf(),
            message: "no decoder accepts this file".into(),
        }))
    }
}
