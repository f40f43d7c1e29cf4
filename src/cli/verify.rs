//! `verify --db <file> [--facets]`: integrity checks, plus an
//! optional pass that replays the facet-count invariant over a sampled
//! set of states.

use crate::catalog::Catalog;
use crate::query::engine::{run_query, Page, QueryEngine, SortKey};
use crate::query::state::FilterState;
use crate::query::url::parse_state;
use clap::Args;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Catalog file
    #[arg(long)]
    pub db: PathBuf,

    /// Also verify facet counts against result counts over sampled states
    #[arg(long)]
    pub facets: bool,

    /// Number of sampled states for the facet pass
    #[arg(long, default_value_t = 25)]
    pub samples: usize,
}

pub fn execute(args: VerifyArgs) -> i32 {
    let catalog = match super::open_catalog(&args.db) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let report = match catalog.check_integrity() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("fatal: integrity check failed to run: {}", e);
            return 2;
        }
    };

    let mut failed = false;
    if report.is_clean() {
        println!("integrity: ok");
    } else {
        failed = true;
        println!("integrity: FAILED");
        println!("  orphan burst memberships:    {}", report.orphan_burst_memberships);
        println!("  orphan cluster memberships:  {}", report.orphan_cluster_memberships);
        println!("  representatives outside set: {}", report.representatives_outside_group);
        println!("  undersized bursts:           {}", report.undersized_bursts);
        println!("  undersized clusters:         {}", report.undersized_clusters);
    }

    if args.facets {
        match verify_facet_invariant(&catalog, args.samples) {
            Ok(0) => println!("facet invariant: ok over {} sampled state(s)", args.samples),
            Ok(mismatches) => {
                failed = true;
                println!("facet invariant: {} mismatch(es)", mismatches);
            }
            Err(e) => {
                eprintln!("fatal: facet verification failed to run: {}", e);
                return 2;
            }
        }
    }

    if failed {
        1
    } else {
        0
    }
}

/// Sample filter states and check that every advertised facet count
/// equals the total of the state its URL leads to.
fn verify_facet_invariant(catalog: &Catalog, samples: usize) -> crate::error::Result<usize> {
    let engine = QueryEngine::new(catalog);
    let conn = catalog.open_reader()?;
    let mut rng = StdRng::seed_from_u64(0xFACE7);
    let mut mismatches = 0usize;

    for sample in 0..samples {
        // Grow a state by following real facet URLs so every sampled
        // state is reachable through the UI.
        let mut state = FilterState::default();
        let depth = rng.gen_range(0..=5);
        for _ in 0..depth {
            let facets = engine.facets(&state)?;
            let candidates: Vec<&str> = facets
                .iter()
                .flat_map(|f| f.values.iter())
                .filter(|v| v.count > 0 && !v.selected)
                .map(|v| v.url.as_str())
                .collect();
            if candidates.is_empty() {
                break;
            }
            state = parse_state(candidates[rng.gen_range(0..candidates.len())]);
        }

        let facets = engine.facets(&state)?;
        for facet in &facets {
            for value in &facet.values {
                let target = parse_state(&value.url);
                let total = run_query(&conn, &target, SortKey::default(), Page::default())?.total;
                if total != value.count {
                    mismatches += 1;
                    tracing::error!(
                        sample,
                        facet = %facet.name,
                        value = %value.value,
                        advertised = value.count,
                        actual = total,
                        url = %value.url,
                        "facet count does not match the result count behind its url"
                    );
                }
            }
        }
    }

    Ok(mismatches)
}
