//! Subcommand implementations. Each returns a process exit code: 0 for
//! success (per-file ingest failures included), 2 for fatal store
//! errors, 1 for failed verification.

pub mod analyze;
pub mod compact;
pub mod explore;
pub mod index;
pub mod query;
pub mod stats;
pub mod verify;

use crate::catalog::Catalog;
use std::path::Path;

/// Open the catalog or print the fatal-store-error message and map to
/// exit code 2.
pub(crate) fn open_catalog(db: &Path) -> Result<Catalog, i32> {
    match Catalog::open_or_create(db) {
        Ok(catalog) => Ok(catalog),
        Err(e) => {
            eprintln!("fatal: cannot open catalog {:?}: {}", db, e);
            Err(2)
        }
    }
}
