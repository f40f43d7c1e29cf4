//! Discovery walk.
//!
//! Recursively scans a root for supported image files by extension or
//! magic bytes. Symlinks are skipped; unreadable directories are logged
//! and skipped, never fatal.

use crate::decode::{sniff_format, FileKind};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub kind: FileKind,
}

/// Walk `root` and return all supported photo files plus an error log.
pub fn scan_directory(root: &Path) -> (Vec<DiscoveredFile>, Vec<String>) {
    let mut files = Vec::new();
    let mut errors = Vec::new();
    for item in walk(root) {
        match item {
            Ok(found) => files.push(found),
            Err(msg) => errors.push(msg),
        }
    }
    tracing::debug!(
        "scan {:?}: {} files, {} errors",
        root,
        files.len(),
        errors.len()
    );
    (files, errors)
}

/// Streaming variant used by the pipeline's discovery thread: yields
/// files one at a time so a bounded queue can apply back-pressure
/// mid-walk.
pub fn walk(root: &Path) -> impl Iterator<Item = std::result::Result<DiscoveredFile, String>> + '_ {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !e.path_is_symlink())
        .filter_map(|entry| match entry {
            Err(e) => {
                let msg = format!("scan error: {}", e);
                tracing::warn!("{}", msg);
                Some(Err(msg))
            }
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    return None;
                }
                sniff_format(entry.path()).map(|kind| {
                    Ok(DiscoveredFile {
                        path: entry.path().to_path_buf(),
                        kind,
                    })
                })
            }
        })
}
