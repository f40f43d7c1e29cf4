//! Burst detection.
//!
//! Candidates arrive sorted by (camera make, model, timestamp). A walk
//! keeps a running accumulator: a photo joins the current burst iff the
//! camera matches, the gap to the previous frame is at most 2 seconds,
//! and its focal length stays within 5mm of the burst's median. An
//! accumulator commits when it breaks with at least 3 members.

use crate::catalog::model::BurstGroup;
use crate::catalog::store::BurstCandidate;

pub const MAX_GAP_SECONDS: i64 = 2;
pub const MAX_FOCAL_DRIFT_MM: f64 = 5.0;
pub const MIN_BURST_SIZE: usize = 3;

/// Detect bursts over sorted candidates. Returns each group paired with
/// its member ids in timestamp order; group ids count from 1.
pub fn detect_bursts(candidates: &[BurstCandidate]) -> Vec<(BurstGroup, Vec<i64>)> {
    let mut groups: Vec<(BurstGroup, Vec<i64>)> = Vec::new();
    let mut acc: Vec<&BurstCandidate> = Vec::new();

    for candidate in candidates {
        if joins(&acc, candidate) {
            acc.push(candidate);
            continue;
        }
        commit(&mut groups, &acc);
        acc.clear();
        acc.push(candidate);
    }
    commit(&mut groups, &acc);
    groups
}

fn joins(acc: &[&BurstCandidate], next: &BurstCandidate) -> bool {
    let Some(prev) = acc.last() else {
        return true;
    };
    if prev.camera_make != next.camera_make || prev.camera_model != next.camera_model {
        return false;
    }
    let gap = (next.capture_time - prev.capture_time).num_seconds();
    if gap.abs() > MAX_GAP_SECONDS {
        return false;
    }
    // A frame without a focal length cannot violate the drift rule.
    match (next.focal_mm, median_focal(acc)) {
        (Some(focal), Some(median)) => (focal - median).abs() <= MAX_FOCAL_DRIFT_MM,
        _ => true,
    }
}

fn median_focal(acc: &[&BurstCandidate]) -> Option<f64> {
    let mut focals: Vec<f64> = acc.iter().filter_map(|c| c.focal_mm).collect();
    if focals.is_empty() {
        return None;
    }
    focals.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Some(focals[focals.len() / 2])
}

fn commit(groups: &mut Vec<(BurstGroup, Vec<i64>)>, acc: &[&BurstCandidate]) {
    if acc.len() < MIN_BURST_SIZE {
        return;
    }
    let members: Vec<i64> = acc.iter().map(|c| c.id).collect();
    // Representative: the middle member by timestamp.
    let representative_id = members[members.len() / 2];
    let span = (acc[acc.len() - 1].capture_time - acc[0].capture_time).num_seconds();
    let group = BurstGroup {
        id: groups.len() as i64 + 1,
        photo_count: members.len() as u32,
        time_span_s: span,
        representative_id,
    };
    groups.push((group, members));
}
