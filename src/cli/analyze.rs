//! `analyze --db <file>`: recompute burst groups and duplicate
//! clusters. Idempotent.

use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Catalog file
    #[arg(long)]
    pub db: PathBuf,
}

pub fn execute(args: AnalyzeArgs) -> i32 {
    let catalog = match super::open_catalog(&args.db) {
        Ok(c) => c,
        Err(code) => return code,
    };
    match crate::analyze::run_analyzer(&catalog) {
        Ok(report) => {
            println!(
                "{} burst group(s) over {} photo(s); {} duplicate cluster(s) over {} photo(s)",
                report.burst_groups,
                report.burst_members,
                report.duplicate_clusters,
                report.duplicate_members
            );
            0
        }
        Err(e) => {
            eprintln!("fatal: analyze failed: {}", e);
            2
        }
    }
}
