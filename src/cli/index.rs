//! `index <path> --db <file> [-w N]`

use crate::ingest::pipeline::{run_pipeline, PipelineConfig, DEFAULT_WORKERS};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Directory tree to ingest
    pub path: PathBuf,

    /// Catalog file
    #[arg(long)]
    pub db: PathBuf,

    /// Worker thread count
    #[arg(short = 'w', long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,
}

pub fn execute(args: IndexArgs, verbose: bool) -> i32 {
    let catalog = match super::open_catalog(&args.db) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let cancel = Arc::new(AtomicBool::new(false));
    {
        // first SIGINT drains gracefully; a second one exits hard
        let cancel = Arc::clone(&cancel);
        let result = ctrlc::set_handler(move || {
            if cancel.swap(true, Ordering::SeqCst) {
                std::process::exit(130);
            }
            eprintln!("cancelling; waiting for in-flight photos");
        });
        if let Err(e) = result {
            tracing::warn!("cannot install SIGINT handler: {}", e);
        }
    }

    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}").expect("static template"),
    );

    let config = PipelineConfig::new(&args.path).with_workers(args.workers);
    let report = run_pipeline(&catalog, &config, &cancel, &|event| {
        bar.set_message(format!(
            "{} discovered, {} processed, {} skipped, {} failed ({:.0}/s)",
            event.discovered, event.processed, event.skipped, event.failed, event.throughput
        ));
        bar.tick();
    });
    bar.finish_and_clear();

    // one-line summary plus per-kind failure counts
    println!(
        "indexed {} photo(s) in {:.1}s ({} skipped, {} failed{})",
        report.processed,
        report.duration_s,
        report.skipped_unchanged + report.skipped_duplicate,
        report.failed,
        if report.cancelled { ", cancelled" } else { "" }
    );
    for (kind, count) in &report.failures_by_kind {
        println!("  {}: {}", kind, count);
    }
    if verbose {
        for failure in &report.failure_details {
            println!("  {} [{}] {}", failure.path.display(), failure.kind.as_str(), failure.message);
        }
    }

    // per-file failures do not fail the run
    0
}
