//! Traffic-volume clustering preprocessor.
//!
//! Groups traffic classes with similar per-epoch volume profiles and rewrites
//! each class's volume vector with its bucket's representative, shrinking the
//! distinct profiles the optimizer must reason about.

use rand::rngs::StdRng;
use rand::seq::index;
use tracing::debug;

use crate::traffic::TrafficClass;
use crate::{Result, SelectorError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterMethod {
    /// Lloyd's k-means; bucket representative is the center (mean).
    KMeans,
    /// Complete-linkage agglomerative merging; bucket representative is the
    /// element-wise maximum of its members (a conservative envelope).
    MaxAgglomerative,
}

impl ClusterMethod {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "kmeans" => Ok(ClusterMethod::KMeans),
            "agg" => Ok(ClusterMethod::MaxAgglomerative),
            other => Err(SelectorError::InvalidConfig(format!(
                "unknown clustering method: {other}"
            ))),
        }
    }
}

/// Result of clustering: one representative volume vector per bucket, plus
/// the bucket each traffic class landed in.
#[derive(Debug, Clone)]
pub struct TcClustering {
    pub representatives: Vec<Vec<f64>>,
    pub assignment: Vec<usize>,
}

impl TcClustering {
    /// Rewrite each traffic class's volume vector with its bucket
    /// representative. Classes must be in the same order as passed to
    /// [`cluster_tcs`].
    pub fn apply(&self, tcs: &mut [TrafficClass]) {
        for (tc, bucket) in tcs.iter_mut().zip(&self.assignment) {
            tc.vol_flows = self.representatives[*bucket].clone();
        }
    }
}

/// Cluster traffic classes by their per-epoch volume vectors.
///
/// All classes must carry the same number of epochs, and
/// `1 <= num_clusters <= |tcs|`.
pub fn cluster_tcs(
    tcs: &[TrafficClass],
    num_clusters: usize,
    method: ClusterMethod,
    rng: &mut StdRng,
) -> Result<TcClustering> {
    if tcs.is_empty() {
        return Err(SelectorError::InvalidConfig(
            "cannot cluster an empty traffic class set".into(),
        ));
    }
    if num_clusters == 0 || num_clusters > tcs.len() {
        return Err(SelectorError::InvalidConfig(format!(
            "num_clusters must be in 1..={}, got {num_clusters}",
            tcs.len()
        )));
    }
    let epochs = tcs[0].num_epochs();
    if epochs == 0 || tcs.iter().any(|tc| tc.num_epochs() != epochs) {
        return Err(SelectorError::InvalidConfig(
            "all traffic classes must carry the same nonzero epoch count".into(),
        ));
    }

    let vols: Vec<&[f64]> = tcs.iter().map(|tc| tc.vol_flows.as_slice()).collect();
    let clustering = match method {
        ClusterMethod::KMeans => kmeans(&vols, num_clusters, rng),
        ClusterMethod::MaxAgglomerative => agglomerative_max(&vols, num_clusters),
    };
    debug!(
        "clustered {} traffic classes into {} buckets",
        tcs.len(),
        clustering.representatives.len()
    );
    Ok(clustering)
}

fn dist_sq(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn kmeans(vols: &[&[f64]], num_clusters: usize, rng: &mut StdRng) -> TcClustering {
    // Seed centers from distinct input vectors.
    let mut centers: Vec<Vec<f64>> = index::sample(rng, vols.len(), num_clusters)
        .into_iter()
        .map(|i| vols[i].to_vec())
        .collect();
    let mut assignment = vec![0usize; vols.len()];

    for _ in 0..100 {
        let mut next = vec![0usize; vols.len()];
        for (i, v) in vols.iter().enumerate() {
            let mut best = 0usize;
            let mut best_d = f64::INFINITY;
            for (c, center) in centers.iter().enumerate() {
                let d = dist_sq(v, center);
                if d < best_d {
                    best_d = d;
                    best = c;
                }
            }
            next[i] = best;
        }
        let converged = next == assignment;
        assignment = next;

        for (c, center) in centers.iter_mut().enumerate() {
            let members: Vec<&[f64]> = vols
                .iter()
                .zip(&assignment)
                .filter(|(_, a)| **a == c)
                .map(|(v, _)| *v)
                .collect();
            // An emptied cluster keeps its previous center.
            if members.is_empty() {
                continue;
            }
            for (e, slot) in center.iter_mut().enumerate() {
                *slot = members.iter().map(|m| m[e]).sum::<f64>() / members.len() as f64;
            }
        }
        if converged {
            break;
        }
    }

    TcClustering {
        representatives: centers,
        assignment,
    }
}

fn agglomerative_max(vols: &[&[f64]], num_clusters: usize) -> TcClustering {
    let mut clusters: Vec<Vec<usize>> = (0..vols.len()).map(|i| vec![i]).collect();

    while clusters.len() > num_clusters {
        // Complete linkage: cluster distance is the farthest member pair.
        let mut best = (0usize, 1usize);
        let mut best_d = f64::INFINITY;
        for i in 0..clusters.len() {
            for j in (i + 1)..clusters.len() {
                let mut d = 0.0f64;
                for a in &clusters[i] {
                    for b in &clusters[j] {
                        d = d.max(dist_sq(vols[*a], vols[*b]));
                    }
                }
                if d < best_d {
                    best_d = d;
                    best = (i, j);
                }
            }
        }
        let merged = clusters.remove(best.1);
        clusters[best.0].extend(merged);
    }

    let epochs = vols[0].len();
    let mut representatives = Vec::with_capacity(clusters.len());
    let mut assignment = vec![0usize; vols.len()];
    for (c, members) in clusters.iter().enumerate() {
        let mut rep = vec![f64::NEG_INFINITY; epochs];
        for m in members {
            assignment[*m] = c;
            for (e, slot) in rep.iter_mut().enumerate() {
                *slot = slot.max(vols[*m][e]);
            }
        }
        representatives.push(rep);
    }

    TcClustering {
        representatives,
        assignment,
    }
}
