//! `explore --db <file> [--addr host:port] [--open]`: the web UI.

use clap::Args;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct ExploreArgs {
    /// Catalog file
    #[arg(long)]
    pub db: PathBuf,

    /// Listen address
    #[arg(long, default_value = "127.0.0.1:8890")]
    pub addr: SocketAddr,

    /// Print the URL prominently for a browser to pick up
    #[arg(long)]
    pub open: bool,
}

pub fn execute(args: ExploreArgs) -> i32 {
    let catalog = match super::open_catalog(&args.db) {
        Ok(c) => c,
        Err(code) => return code,
    };

    if args.open {
        println!("open http://{}/photos in your browser", args.addr);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("fatal: cannot start runtime: {}", e);
            return 2;
        }
    };
    match runtime.block_on(crate::web::serve(Arc::new(catalog), args.addr)) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("fatal: server error: {}", e);
            2
        }
    }
}
