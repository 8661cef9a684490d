//! Pure path-scoring functions.
//!
//! Each scorer produces a permutation of candidate indices; ties always break
//! toward the original index so orderings are stable across runs.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::paths::Path;
use crate::topology::Topology;

/// Synthetic resource name understood by [`path_score`]: its "capacity" is
/// the path length, letting a weight map penalize (or reward) long paths.
pub const LEN_RESOURCE: &str = "len";

/// Candidate indices ordered by ascending path length (node count), ties by
/// original index.
pub fn length_order(paths: &[Path]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..paths.len()).collect();
    order.sort_by_key(|&i| (paths[i].len(), i));
    order
}

/// Resource-weighted score for one path.
///
/// For each weighted resource, the path is charged the largest normalized
/// capacity it touches (over its nodes and links); the total is penalized
/// once by path length over the topology diameter:
///
/// ```text
/// score(p) = sum_r  max_e(res(e, r) / totals[r]) * weights[r]  -  len(p) / diameter
/// ```
///
/// Higher is better.
pub fn resource_score(
    path: &Path,
    topo: &Topology,
    weights: &HashMap<String, f64>,
    totals: &HashMap<String, f64>,
    diameter: f64,
) -> f64 {
    let mut score = 0.0;
    for (resource, weight) in weights {
        let norm = totals.get(resource).copied().unwrap_or(0.0);
        if norm <= 0.0 {
            continue;
        }
        let mut best = 0.0f64;
        for node in path.nodes() {
            if let Some(res) = topo.node_resources(*node) {
                best = best.max(res.get(resource).copied().unwrap_or(0.0) / norm);
            }
        }
        for (src, dst) in path.links() {
            if let Some(res) = topo.link_resources(src, dst) {
                best = best.max(res.get(resource).copied().unwrap_or(0.0) / norm);
            }
        }
        score += best * weight;
    }
    score - path.len() as f64 / diameter
}

/// Candidate indices ordered by descending resource score, ties by original
/// index.
pub fn resource_order(
    paths: &[Path],
    topo: &Topology,
    weights: &HashMap<String, f64>,
) -> Vec<usize> {
    let totals: HashMap<String, f64> = weights
        .keys()
        .map(|r| (r.clone(), topo.total_resource(r)))
        .collect();
    let diameter = topo.diameter() as f64;
    let scores: Vec<f64> = paths
        .iter()
        .map(|p| resource_score(p, topo, weights, &totals, diameter))
        .collect();
    sort_descending(&scores)
}

/// Bottleneck-style score used once at annealing setup: for each weighted
/// resource, the smallest capacity along the path's nodes; the synthetic
/// [`LEN_RESOURCE`] contributes the path length instead.
pub fn path_score(path: &Path, topo: &Topology, weights: &HashMap<String, f64>) -> f64 {
    let mut score = 0.0;
    for (resource, weight) in weights {
        if resource == LEN_RESOURCE {
            score += weight * path.len() as f64;
            continue;
        }
        let mut min = f64::INFINITY;
        for node in path.nodes() {
            let cap = topo
                .node_resources(*node)
                .and_then(|res| res.get(resource).copied())
                .unwrap_or(0.0);
            min = min.min(cap);
        }
        if min.is_finite() {
            score += weight * min;
        }
    }
    score
}

/// Candidate indices ordered by descending path score, ties by original
/// index.
pub fn path_score_order(
    paths: &[Path],
    topo: &Topology,
    weights: &HashMap<String, f64>,
) -> Vec<usize> {
    let scores: Vec<f64> = paths.iter().map(|p| path_score(p, topo, weights)).collect();
    sort_descending(&scores)
}

fn sort_descending(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });
    order
}
