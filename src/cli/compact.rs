//! `compact --db <file> [--prune]`: offline VACUUM/ANALYZE, with an
//! opt-in pass that drops photos whose source files are gone.

use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct CompactArgs {
    /// Catalog file
    #[arg(long)]
    pub db: PathBuf,

    /// Also remove photos whose source file no longer exists
    #[arg(long)]
    pub prune: bool,
}

pub fn execute(args: CompactArgs) -> i32 {
    let catalog = match super::open_catalog(&args.db) {
        Ok(c) => c,
        Err(code) => return code,
    };

    if args.prune {
        match catalog.prune_missing() {
            Ok(removed) => println!("pruned {} missing photo(s)", removed),
            Err(e) => {
                eprintln!("fatal: prune failed: {}", e);
                return 2;
            }
        }
    }

    match catalog.compact() {
        Ok((before, after)) => {
            println!(
                "compacted: {} -> {} bytes ({:.1}% saved)",
                before,
                after,
                if before > 0 {
                    (before.saturating_sub(after)) as f64 / before as f64 * 100.0
                } else {
                    0.0
                }
            );
            0
        }
        Err(e) => {
            eprintln!("fatal: compact failed: {}", e);
            2
        }
    }
}
