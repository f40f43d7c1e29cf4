//! Aperture - faceted photo catalog over a single-file index.
//!
//! # Usage
//!
//! ```bash
//! # Ingest a directory tree into a catalog file
//! aperture index ~/Pictures --db photos.db -w 4
//!
//! # Group bursts and duplicate clusters
//! aperture analyze --db photos.db
//!
//! # Query from the shell; temporal flags are independent
//! aperture query --db photos.db --month 10 --camera_make Canon --facets
//!
//! # Browse with facets in the browser
//! aperture explore --db photos.db --addr 127.0.0.1:8890
//! ```

use aperture::cli;
use aperture::logging;
use clap::{Parser, Subcommand};

/// Aperture - index, analyze, and explore a local photo corpus.
#[derive(Parser, Debug)]
#[command(name = "aperture")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Walk a directory and ingest new or changed files
    Index(cli::index::IndexArgs),

    /// Recompute burst groups and duplicate clusters
    Analyze(cli::analyze::AnalyzeArgs),

    /// Print matching photos and optional facet counts
    Query(cli::query::QueryArgs),

    /// Print aggregate counts and the date range
    Stats(cli::stats::StatsArgs),

    /// Start the web UI
    Explore(cli::explore::ExploreArgs),

    /// Run integrity checks, optionally the facet invariant
    Verify(cli::verify::VerifyArgs),

    /// Vacuum and analyze the catalog file
    Compact(cli::compact::CompactArgs),
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let code = match cli.command {
        Commands::Index(args) => cli::index::execute(args, cli.verbose),
        Commands::Analyze(args) => cli::analyze::execute(args),
        Commands::Query(args) => cli::query::execute(args),
        Commands::Stats(args) => cli::stats::execute(args),
        Commands::Explore(args) => cli::explore::execute(args),
        Commands::Verify(args) => cli::verify::execute(args),
        Commands::Compact(args) => cli::compact::execute(args),
    };
    std::process::exit(code);
}
