//! EXIF orientation handling.
//!
//! The transform must run exactly once per photo. Workers own one
//! `OrientationTracker` per photo; a second apply is a no-op plus a
//! warning rather than a silently double-rotated image.

use image::DynamicImage;
use std::path::{Path, PathBuf};

/// Tracks whether orientation has been applied to one photo's pixels.
/// Owned by the worker processing that photo, never shared.
#[derive(Debug)]
pub struct OrientationTracker {
    path: PathBuf,
    applied: bool,
    apply_events: u32,
}

impl OrientationTracker {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            applied: false,
            apply_events: 0,
        }
    }

    /// Apply the EXIF orientation transform if it has not run yet.
    /// Returns the (possibly rotated) image.
    pub fn apply(&mut self, img: DynamicImage, orientation: Option<u16>) -> DynamicImage {
        if self.applied {
            tracing::warn!(
                "orientation already applied to {:?}, ignoring re-apply",
                self.path
            );
            return img;
        }
        self.applied = true;
        self.apply_events += 1;
        transform(img, orientation)
    }

    pub fn was_applied(&self) -> bool {
        self.applied
    }

    /// Number of times the transform actually ran. The pipeline asserts
    /// this is exactly one per processed photo.
    pub fn apply_events(&self) -> u32 {
        self.apply_events
    }
}

/// The eight EXIF orientation codes. 1 is identity; 2/4/5/7 involve a
/// mirror, 3/6/8 are pure rotations.
fn transform(img: DynamicImage, orientation: Option<u16>) -> DynamicImage {
    match orientation {
        Some(2) => img.fliph(),
        Some(3) => img.rotate180(),
        Some(4) => img.flipv(),
        Some(5) => img.rotate90().fliph(),
        Some(6) => img.rotate90(),
        Some(7) => img.rotate270().fliph(),
        Some(8) => img.rotate270(),
        _ => img,
    }
}
