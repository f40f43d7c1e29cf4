//! Perceptual-duplicate clustering.
//!
//! Neighbour search runs through a BK-tree over the 64-bit hashes
//! (Hamming metric), so sparse corpora stay near-linear instead of the
//! naive O(n^2) scan. Clusters are the connected components of the
//! thresholded neighbour graph, built with a disjoint-set union.

use crate::catalog::model::{ClusterType, DuplicateCluster};
use crate::features::phash::hamming;
use std::collections::HashMap;

/// Two photos within this Hamming distance are duplicates.
pub const DISTANCE_THRESHOLD: u32 = 15;

// ── BK-tree ───────────────────────────────────────────────────────────────

struct BkNode {
    hash: u64,
    children: HashMap<u32, BkNode>,
}

/// Metric index over hashes. Distinct hashes only; callers map a hash
/// back to the photos that share it.
pub struct BkTree {
    root: Option<BkNode>,
    len: usize,
}

impl BkTree {
    pub fn new() -> Self {
        Self { root: None, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, hash: u64) {
        let Some(root) = &mut self.root else {
            self.root = Some(BkNode {
                hash,
                children: HashMap::new(),
            });
            self.len = 1;
            return;
        };
        let mut node = root;
        loop {
            let d = hamming(hash, node.hash);
            if d == 0 {
                return; // already present
            }
            match node.children.entry(d) {
                std::collections::hash_map::Entry::Occupied(occupied) => {
                    node = occupied.into_mut();
                }
                std::collections::hash_map::Entry::Vacant(vacant) => {
                    vacant.insert(BkNode {
                        hash,
                        children: HashMap::new(),
                    });
                    self.len += 1;
                    return;
                }
            }
        }
    }

    /// All stored hashes within `radius` of `hash` (including itself).
    pub fn query(&self, hash: u64, radius: u32) -> Vec<u64> {
        let mut out = Vec::new();
        let mut stack: Vec<&BkNode> = self.root.iter().collect();
        while let Some(node) = stack.pop() {
            let d = hamming(hash, node.hash);
            if d <= radius {
                out.push(node.hash);
            }
            // Triangle inequality prunes children outside [d-r, d+r].
            let lo = d.saturating_sub(radius);
            let hi = d + radius;
            for (&edge, child) in &node.children {
                if edge >= lo && edge <= hi {
                    stack.push(child);
                }
            }
        }
        out
    }
}

impl Default for BkTree {
    fn default() -> Self {
        Self::new()
    }
}

// ── disjoint set ──────────────────────────────────────────────────────────

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        if self.parent[i] != i {
            let root = self.find(self.parent[i]);
            self.parent[i] = root;
        }
        self.parent[i]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

// ── clustering ────────────────────────────────────────────────────────────

/// Cluster (photo_id, hash) pairs into duplicate groups. Returns each
/// cluster with its member ids sorted ascending; cluster ids count from
/// 1 in order of smallest member id.
pub fn cluster_duplicates(photos: &[(i64, u64)]) -> Vec<(DuplicateCluster, Vec<i64>)> {
    if photos.len() < 2 {
        return Vec::new();
    }

    let mut tree = BkTree::new();
    let mut by_hash: HashMap<u64, Vec<usize>> = HashMap::new();
    for (idx, (_, hash)) in photos.iter().enumerate() {
        tree.insert(*hash);
        by_hash.entry(*hash).or_default().push(idx);
    }

    let mut set = DisjointSet::new(photos.len());
    for (idx, (_, hash)) in photos.iter().enumerate() {
        for neighbour_hash in tree.query(*hash, DISTANCE_THRESHOLD) {
            for &other in &by_hash[&neighbour_hash] {
                set.union(idx, other);
            }
        }
    }

    let mut components: HashMap<usize, Vec<usize>> = HashMap::new();
    for idx in 0..photos.len() {
        components.entry(set.find(idx)).or_default().push(idx);
    }

    let mut clusters: Vec<(DuplicateCluster, Vec<i64>)> = Vec::new();
    let mut ordered: Vec<Vec<usize>> = components
        .into_values()
        .filter(|members| members.len() >= 2)
        .collect();
    ordered.sort_by_key(|members| members.iter().map(|&i| photos[i].0).min());

    for members in ordered {
        let ids: Vec<i64> = {
            let mut ids: Vec<i64> = members.iter().map(|&i| photos[i].0).collect();
            ids.sort_unstable();
            ids
        };

        let (min_distance, representative_id) = cluster_shape(&members, photos);
        let cluster = DuplicateCluster {
            id: clusters.len() as i64 + 1,
            cluster_type: ClusterType::from_min_distance(min_distance),
            member_count: ids.len() as u32,
            representative_id,
        };
        clusters.push((cluster, ids));
    }
    clusters
}

/// Minimum intra-cluster distance and the representative: the member
/// with the smallest average distance to the others, ties to the
/// smallest id.
fn cluster_shape(members: &[usize], photos: &[(i64, u64)]) -> (u32, i64) {
    let mut min_distance = u32::MAX;
    let mut best: Option<(f64, i64)> = None;

    for &a in members {
        let mut total = 0u64;
        for &b in members {
            if a == b {
                continue;
            }
            let d = hamming(photos[a].1, photos[b].1);
            total += d as u64;
            min_distance = min_distance.min(d);
        }
        let avg = total as f64 / (members.len() - 1) as f64;
        let id = photos[a].0;
        best = match best {
            None => Some((avg, id)),
            Some((best_avg, best_id)) => {
                if avg < best_avg || (avg == best_avg && id < best_id) {
                    Some((avg, id))
                } else {
                    Some((best_avg, best_id))
                }
            }
        };
    }
    (min_distance, best.map(|(_, id)| id).unwrap_or(0))
}
