//! Per-traffic-class mask mutators: the expel/replace kernel driving the
//! annealing selector.
//!
//! Expel hides some currently visible paths based on the last solve's flow
//! tensor; replace fills the set back up to `k` visible paths, avoiding mask
//! combinations already proposed in this run.

use itertools::Itertools;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::Rng;
use std::collections::HashSet;

use crate::solver::Xps;
use crate::tree::PathTree;
use crate::{Result, SelectorError, TcId};

/// How paths are evicted from the visible set. Discriminants match the wire
/// encoding accepted from callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpelMode {
    /// Hide visible paths that carried no flow in any epoch.
    NoFlow = 1,
    /// Hide each visible path with probability `1 - mean_flow`.
    InverseFlow = 2,
    /// Hide each visible path with probability one half.
    Random = 3,
    /// Hide everything.
    All = 4,
}

impl TryFrom<u8> for ExpelMode {
    type Error = SelectorError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(ExpelMode::NoFlow),
            2 => Ok(ExpelMode::InverseFlow),
            3 => Ok(ExpelMode::Random),
            4 => Ok(ExpelMode::All),
            other => Err(SelectorError::InvalidConfig(format!(
                "unknown expel mode: {other}"
            ))),
        }
    }
}

/// How evicted paths are replaced. Discriminants match the wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceMode {
    /// First unexplored combination of unused paths in candidate order.
    NextSorted = 1,
    /// Uniform random sample of unused paths.
    Random = 3,
    /// Round-robin draws from the per-middlebox path index.
    PathTree = 4,
    /// As `NextSorted`, but walking a precomputed path-score ordering.
    PathScore = 6,
}

impl TryFrom<u8> for ReplaceMode {
    type Error = SelectorError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(ReplaceMode::NextSorted),
            3 => Ok(ReplaceMode::Random),
            4 => Ok(ReplaceMode::PathTree),
            6 => Ok(ReplaceMode::PathScore),
            other => Err(SelectorError::InvalidConfig(format!(
                "unknown replace mode: {other}"
            ))),
        }
    }
}

/// Bound on duplicate-avoidance retries in the randomized replace policies.
const MAX_REPLACE_TRIES: usize = 100;

/// Hide visible paths per `mode`.
///
/// Flow-reading modes index `xps` rows through a running counter over
/// currently visible paths: visible paths map densely onto solver columns,
/// so the raw candidate index must never be used. A missing row counts as
/// zero flow.
pub(crate) fn expel(tc: TcId, mask: &mut [bool], xps: &Xps, mode: ExpelMode, rng: &mut StdRng) {
    match mode {
        ExpelMode::All => mask.iter_mut().for_each(|m| *m = true),
        ExpelMode::Random => {
            for m in mask.iter_mut().filter(|m| !**m) {
                if rng.gen::<f64>() < 0.5 {
                    *m = true;
                }
            }
        }
        ExpelMode::NoFlow => {
            let rows = xps.flows(tc);
            let mut col = 0usize;
            for m in mask.iter_mut() {
                if *m {
                    continue;
                }
                let no_flow = rows
                    .and_then(|r| r.get(col))
                    .map(|row| row.iter().all(|v| v.value() == 0.0))
                    .unwrap_or(true);
                if no_flow {
                    *m = true;
                }
                col += 1;
            }
        }
        ExpelMode::InverseFlow => {
            let rows = xps.flows(tc);
            let mut col = 0usize;
            for m in mask.iter_mut() {
                if *m {
                    continue;
                }
                let mean = rows
                    .and_then(|r| r.get(col))
                    .map(|row| {
                        let decisions: Vec<f64> =
                            row.iter().filter_map(|v| v.decision_value()).collect();
                        if decisions.is_empty() {
                            0.0
                        } else {
                            decisions.iter().sum::<f64>() / decisions.len() as f64
                        }
                    })
                    .unwrap_or(0.0);
                if rng.gen::<f64>() < (1.0 - mean).clamp(0.0, 1.0) {
                    *m = true;
                }
                col += 1;
            }
        }
    }
}

/// Unhide paths until `k` are visible, avoiding masks already in `explored`.
///
/// If fewer unused paths remain than needed, every path is enabled and the
/// policy is skipped. `tree` is required for [`ReplaceMode::PathTree`];
/// `score_order` for [`ReplaceMode::PathScore`].
pub(crate) fn replace(
    explored: &[Vec<bool>],
    mask: &mut Vec<bool>,
    k: usize,
    mode: ReplaceMode,
    mut tree: Option<&mut PathTree>,
    score_order: Option<&[usize]>,
    rng: &mut StdRng,
) -> Result<()> {
    let visible = mask.iter().filter(|m| !**m).count();
    let replace_len = k.saturating_sub(visible);
    if replace_len == 0 {
        return Ok(());
    }

    let unused: Vec<usize> = mask
        .iter()
        .enumerate()
        .filter(|(_, m)| **m)
        .map(|(i, _)| i)
        .collect();
    if unused.len() < replace_len {
        mask.iter_mut().for_each(|m| *m = false);
        return Ok(());
    }

    match mode {
        ReplaceMode::NextSorted => {
            walk_combinations(explored, mask, &unused, replace_len, rng);
        }
        ReplaceMode::PathScore => {
            let order = score_order.ok_or_else(|| {
                SelectorError::InvalidConfig(
                    "pathscore replacement requires a precomputed score order".into(),
                )
            })?;
            let mut rank = vec![usize::MAX; mask.len()];
            for (pos, idx) in order.iter().enumerate() {
                if *idx < rank.len() {
                    rank[*idx] = pos;
                }
            }
            let mut by_score = unused.clone();
            by_score.sort_by_key(|i| rank[*i]);
            walk_combinations(explored, mask, &by_score, replace_len, rng);
        }
        ReplaceMode::Random => {
            let mut candidate = unmask_sample(mask, &unused, replace_len, rng);
            for _ in 1..MAX_REPLACE_TRIES {
                if !is_explored(explored, &candidate) {
                    break;
                }
                candidate = unmask_sample(mask, &unused, replace_len, rng);
            }
            *mask = candidate;
        }
        ReplaceMode::PathTree => {
            let tree = tree.as_deref_mut().ok_or_else(|| {
                SelectorError::InvalidConfig("pathtree replacement requires a path index".into())
            })?;
            let mut candidate = draw_from_tree(mask, tree, replace_len);
            for _ in 1..MAX_REPLACE_TRIES {
                if !is_explored(explored, &candidate) {
                    break;
                }
                candidate = draw_from_tree(mask, tree, replace_len);
            }
            *mask = candidate;
        }
    }
    Ok(())
}

/// Accept the first combination of `pool` (in the given order) whose
/// resulting mask is unexplored; fall back to a uniform random sample.
fn walk_combinations(
    explored: &[Vec<bool>],
    mask: &mut Vec<bool>,
    pool: &[usize],
    replace_len: usize,
    rng: &mut StdRng,
) {
    for combo in pool.iter().copied().combinations(replace_len) {
        let mut candidate = mask.clone();
        for idx in &combo {
            candidate[*idx] = false;
        }
        if !is_explored(explored, &candidate) {
            *mask = candidate;
            return;
        }
    }
    *mask = unmask_sample(mask, pool, replace_len, rng);
}

fn unmask_sample(
    mask: &[bool],
    pool: &[usize],
    replace_len: usize,
    rng: &mut StdRng,
) -> Vec<bool> {
    let mut candidate = mask.to_vec();
    for pick in index::sample(rng, pool.len(), replace_len) {
        candidate[pool[pick]] = false;
    }
    candidate
}

/// Unhide `replace_len` distinct indices drawn round-robin from the tree.
fn draw_from_tree(mask: &[bool], tree: &mut PathTree, replace_len: usize) -> Vec<bool> {
    let mut drawn: HashSet<usize> = HashSet::new();
    while drawn.len() < replace_len {
        match tree.next_index() {
            Some(idx) => {
                drawn.insert(idx);
            }
            None => break,
        }
    }
    let mut candidate = mask.to_vec();
    for idx in drawn {
        candidate[idx] = false;
    }
    candidate
}

fn is_explored(explored: &[Vec<bool>], candidate: &[bool]) -> bool {
    explored.iter().any(|m| m == candidate)
}
