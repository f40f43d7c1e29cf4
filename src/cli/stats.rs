//! `stats --db <file>`: aggregate counts and the date range.

use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Catalog file
    #[arg(long)]
    pub db: PathBuf,
}

pub fn execute(args: StatsArgs) -> i32 {
    let catalog = match super::open_catalog(&args.db) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let stats = match catalog.stats() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("fatal: stats failed: {}", e);
            return 2;
        }
    };

    println!("photos:             {}", stats.photo_count);
    println!("thumbnails:         {}", stats.thumbnail_count);
    println!("burst groups:       {}", stats.burst_group_count);
    println!("duplicate clusters: {}", stats.duplicate_cluster_count);
    match (&stats.earliest_capture, &stats.latest_capture) {
        (Some(earliest), Some(latest)) => {
            println!("date range:         {} .. {}", earliest, latest)
        }
        _ => println!("date range:         (no dated photos)"),
    }

    if !stats.by_year.is_empty() {
        println!("\nby year:");
        for (year, count) in &stats.by_year {
            println!("  {:<10} {}", year, count);
        }
    }
    if !stats.by_camera.is_empty() {
        println!("\nby camera:");
        for (camera, count) in &stats.by_camera {
            println!("  {:<30} {}", camera, count);
        }
    }
    0
}
