//! Post-indexing analysis: burst grouping and perceptual-duplicate
//! clustering. Both passes are re-runnable; each replaces its tables
//! and the membership columns in one transaction.

pub mod bursts;
pub mod duplicates;

use crate::catalog::Catalog;
use crate::error::Result;

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct AnalyzeReport {
    pub burst_groups: usize,
    pub burst_members: usize,
    pub duplicate_clusters: usize,
    pub duplicate_members: usize,
}

/// Run both analysis passes over the catalog.
pub fn run_analyzer(catalog: &Catalog) -> Result<AnalyzeReport> {
    let mut report = AnalyzeReport::default();

    let candidates = catalog.burst_candidates()?;
    let groups = bursts::detect_bursts(&candidates);
    report.burst_groups = groups.len();
    report.burst_members = groups.iter().map(|(_, m)| m.len()).sum();
    catalog.replace_bursts(&groups)?;
    tracing::info!(
        "analyze: {} burst group(s) over {} photo(s)",
        report.burst_groups,
        report.burst_members
    );

    let hashes = catalog.perceptual_hashes()?;
    let clusters = duplicates::cluster_duplicates(&hashes);
    report.duplicate_clusters = clusters.len();
    report.duplicate_members = clusters.iter().map(|(_, m)| m.len()).sum();
    catalog.replace_clusters(&clusters)?;
    tracing::info!(
        "analyze: {} duplicate cluster(s) over {} photo(s)",
        report.duplicate_clusters,
        report.duplicate_members
    );

    Ok(report)
}
