//! Candidate paths and the paths-per-traffic-class (PPTC) container.
//!
//! A path is an ordered node sequence, optionally carrying the middleboxes it
//! traverses. The PPTC maps each traffic class to its ordered candidate list
//! plus a boolean mask: `true` means suppressed, `false` means the path
//! participates in the next optimization. Paths are never deleted once added;
//! selection only flips mask bits, so indices stay meaningful for the whole
//! run.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::topology::Topology;
use crate::traffic::TrafficClass;
use crate::{NodeId, Result, SelectorError, TcId};

/// A plain end-to-end route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlainPath {
    pub nodes: Vec<NodeId>,
    /// Fraction of the class volume routed here, set from solver results.
    #[serde(default)]
    pub flow_fraction: f64,
}

/// A route that traverses an ordered list of middlebox nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MboxPath {
    pub nodes: Vec<NodeId>,
    pub mboxes: Vec<NodeId>,
    #[serde(default)]
    pub flow_fraction: f64,
}

/// An end-to-end candidate route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Path {
    Plain(PlainPath),
    WithMbox(MboxPath),
}

impl Path {
    pub fn plain(nodes: Vec<NodeId>) -> Self {
        Path::Plain(PlainPath {
            nodes,
            flow_fraction: 0.0,
        })
    }

    pub fn with_mboxes(nodes: Vec<NodeId>, mboxes: Vec<NodeId>) -> Self {
        Path::WithMbox(MboxPath {
            nodes,
            mboxes,
            flow_fraction: 0.0,
        })
    }

    pub fn nodes(&self) -> &[NodeId] {
        match self {
            Path::Plain(p) => &p.nodes,
            Path::WithMbox(p) => &p.nodes,
        }
    }

    /// Directed links along the route.
    pub fn links(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.nodes().windows(2).map(|w| (w[0], w[1]))
    }

    /// Path length is the node count.
    pub fn len(&self) -> usize {
        self.nodes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes().is_empty()
    }

    pub fn mboxes(&self) -> Option<&[NodeId]> {
        match self {
            Path::Plain(_) => None,
            Path::WithMbox(p) => Some(&p.mboxes),
        }
    }

    pub fn flow_fraction(&self) -> f64 {
        match self {
            Path::Plain(p) => p.flow_fraction,
            Path::WithMbox(p) => p.flow_fraction,
        }
    }

    pub fn set_flow_fraction(&mut self, fraction: f64) {
        match self {
            Path::Plain(p) => p.flow_fraction = fraction,
            Path::WithMbox(p) => p.flow_fraction = fraction,
        }
    }
}

/// Keep every candidate path.
pub fn null_predicate(_path: &Path, _topo: &Topology) -> bool {
    true
}

/// Keep only paths that traverse at least one middlebox node.
pub fn has_mbox_predicate(path: &Path, topo: &Topology) -> bool {
    match path.mboxes() {
        Some(mboxes) => !mboxes.is_empty(),
        None => path.nodes().iter().any(|n| topo.has_mbox(*n)),
    }
}

#[derive(Debug, Clone)]
struct TcEntry {
    app: String,
    tc: TrafficClass,
    paths: Vec<Path>,
    mask: Vec<bool>,
}

/// Paths-per-traffic-class: the sole selection state.
#[derive(Debug, Clone, Default)]
pub struct Pptc {
    // BTreeMap keeps traffic-class iteration order stable across runs.
    entries: BTreeMap<TcId, TcEntry>,
}

impl Pptc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register candidate paths for a traffic class under an application
    /// name. Adding to an existing class appends, preserving earlier indices.
    pub fn add(&mut self, app: impl Into<String>, tc: TrafficClass, paths: Vec<Path>) {
        let id = tc.id;
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.mask.extend(std::iter::repeat(false).take(paths.len()));
                entry.paths.extend(paths);
            }
            None => {
                let mask = vec![false; paths.len()];
                self.entries.insert(
                    id,
                    TcEntry {
                        app: app.into(),
                        tc,
                        paths,
                        mask,
                    },
                );
            }
        }
    }

    /// Unioning constructor over many containers.
    pub fn merge<'a, I>(parts: I) -> Pptc
    where
        I: IntoIterator<Item = &'a Pptc>,
    {
        let mut merged = Pptc::new();
        for part in parts {
            for entry in part.entries.values() {
                match merged.entries.get_mut(&entry.tc.id) {
                    Some(existing) => {
                        existing.paths.extend(entry.paths.iter().cloned());
                        existing.mask.extend(entry.mask.iter().copied());
                    }
                    None => {
                        merged.entries.insert(entry.tc.id, entry.clone());
                    }
                }
            }
        }
        merged
    }

    /// Traffic classes in stable (id) order.
    pub fn tcs(&self) -> impl Iterator<Item = &TrafficClass> {
        self.entries.values().map(|e| &e.tc)
    }

    pub fn tc_ids(&self) -> Vec<TcId> {
        self.entries.keys().copied().collect()
    }

    pub fn contains(&self, tc: TcId) -> bool {
        self.entries.contains_key(&tc)
    }

    pub fn app_of(&self, tc: TcId) -> Option<&str> {
        self.entries.get(&tc).map(|e| e.app.as_str())
    }

    /// The full candidate list, masked or not.
    pub fn all_paths(&self, tc: TcId) -> Option<&[Path]> {
        self.entries.get(&tc).map(|e| e.paths.as_slice())
    }

    pub fn all_paths_mut(&mut self, tc: TcId) -> Option<&mut [Path]> {
        self.entries.get_mut(&tc).map(|e| e.paths.as_mut_slice())
    }

    /// Currently visible paths, in candidate order.
    pub fn paths(&self, tc: TcId) -> Vec<&Path> {
        match self.entries.get(&tc) {
            Some(e) => e
                .paths
                .iter()
                .zip(&e.mask)
                .filter(|(_, masked)| !**masked)
                .map(|(p, _)| p)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Candidate count; visible-only unless `all` is set.
    pub fn num_paths(&self, tc: TcId, all: bool) -> usize {
        match self.entries.get(&tc) {
            Some(e) if all => e.paths.len(),
            Some(e) => e.mask.iter().filter(|m| !**m).count(),
            None => 0,
        }
    }

    /// Replace the mask for a traffic class. The new mask must cover every
    /// candidate path.
    pub fn mask(&mut self, tc: TcId, mask: Vec<bool>) -> Result<()> {
        let entry = self
            .entries
            .get_mut(&tc)
            .ok_or(SelectorError::UnknownTrafficClass(tc))?;
        if mask.len() != entry.paths.len() {
            return Err(SelectorError::MaskLength {
                tc,
                expected: entry.paths.len(),
                got: mask.len(),
            });
        }
        entry.mask = mask;
        Ok(())
    }

    /// Make every candidate visible again.
    pub fn unmask(&mut self, tc: TcId) {
        if let Some(entry) = self.entries.get_mut(&tc) {
            entry.mask.iter_mut().for_each(|m| *m = false);
        }
    }

    pub fn get_mask(&self, tc: TcId) -> Option<&[bool]> {
        self.entries.get(&tc).map(|e| e.mask.as_slice())
    }

    pub fn get_mask_mut(&mut self, tc: TcId) -> Option<&mut Vec<bool>> {
        self.entries.get_mut(&tc).map(|e| &mut e.mask)
    }

    /// Maximum candidate count over all traffic classes.
    pub fn max_paths(&self, all: bool) -> usize {
        self.entries
            .keys()
            .map(|id| self.num_paths(*id, all))
            .max()
            .unwrap_or(0)
    }

    /// Adopt masks and flow fractions from another container for every
    /// traffic class the two share. Length mismatches are skipped with a
    /// warning rather than failing the whole adoption.
    pub fn apply_selection(&mut self, other: &Pptc) {
        for (id, entry) in self.entries.iter_mut() {
            let Some(theirs) = other.entries.get(id) else {
                continue;
            };
            if theirs.mask.len() != entry.mask.len() {
                warn!(
                    "traffic class {id}: selection has {} candidates, ours has {}; skipping",
                    theirs.mask.len(),
                    entry.mask.len()
                );
                continue;
            }
            entry.mask.copy_from_slice(&theirs.mask);
            for (ours, other_path) in entry.paths.iter_mut().zip(&theirs.paths) {
                ours.set_flow_fraction(other_path.flow_fraction());
            }
        }
    }
}

/// Assemble a PPTC by assigning ingress/egress-keyed candidate paths to each
/// traffic class, keeping only paths admitted by `predicate`. Intended for
/// one traffic class per ingress-egress pair.
pub fn assign_to_tc(
    app: &str,
    tcs: &[TrafficClass],
    paths: &HashMap<NodeId, HashMap<NodeId, Vec<Path>>>,
    predicate: fn(&Path, &Topology) -> bool,
    topo: &Topology,
) -> Result<Pptc> {
    let mut pptc = Pptc::new();
    for tc in tcs {
        let candidates = paths
            .get(&tc.ingress)
            .and_then(|by_dst| by_dst.get(&tc.egress))
            .ok_or_else(|| {
                SelectorError::InvalidConfig(format!(
                    "no candidate paths between {} and {} for traffic class {}",
                    tc.ingress, tc.egress, tc.id
                ))
            })?;
        let admitted: Vec<Path> = candidates
            .iter()
            .filter(|p| predicate(p, topo))
            .cloned()
            .collect();
        if admitted.is_empty() {
            warn!(
                "no path between ({}, {}) admitted by the predicate for traffic class {}",
                tc.ingress, tc.egress, tc.id
            );
        }
        debug!(
            "traffic class {}: {} of {} candidates admitted",
            tc.id,
            admitted.len(),
            candidates.len()
        );
        pptc.add(app, tc.clone(), admitted);
    }
    Ok(pptc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn tc(id: TcId, ingress: NodeId, egress: NodeId) -> TrafficClass {
        TrafficClass::new(id, "tc", ingress, egress, vec![1.0])
    }

    fn three_path_pptc() -> Pptc {
        let mut pptc = Pptc::new();
        pptc.add(
            "app0",
            tc(1, 0, 3),
            vec![
                Path::plain(vec![0, 1, 2, 3]),
                Path::plain(vec![0, 2, 1, 3]),
                Path::plain(vec![0, 1, 2, 4, 3]),
            ],
        );
        pptc
    }

    #[test]
    fn test_mask_and_views() {
        let mut pptc = three_path_pptc();
        assert_eq!(pptc.num_paths(1, true), 3);
        assert_eq!(pptc.num_paths(1, false), 3);

        pptc.mask(1, vec![false, true, true]).unwrap();
        assert_eq!(pptc.num_paths(1, false), 1);
        assert_eq!(pptc.num_paths(1, true), 3);
        assert_eq!(pptc.paths(1).len(), 1);
        assert_eq!(pptc.all_paths(1).unwrap().len(), 3);

        pptc.unmask(1);
        assert_eq!(pptc.num_paths(1, false), 3);
    }

    #[test]
    fn test_mask_length_checked() {
        let mut pptc = three_path_pptc();
        let err = pptc.mask(1, vec![false, true]).unwrap_err();
        assert!(matches!(err, SelectorError::MaskLength { tc: 1, .. }));
        let err = pptc.mask(7, vec![false]).unwrap_err();
        assert!(matches!(err, SelectorError::UnknownTrafficClass(7)));
    }

    #[test]
    fn test_merge_unions_and_keeps_order() {
        let mut a = Pptc::new();
        a.add("a", tc(2, 0, 1), vec![Path::plain(vec![0, 1])]);
        let mut b = Pptc::new();
        b.add("b", tc(1, 1, 0), vec![Path::plain(vec![1, 0])]);
        b.add("b", tc(2, 0, 1), vec![Path::plain(vec![0, 2, 1])]);

        let merged = Pptc::merge([&a, &b]);
        assert_eq!(merged.tc_ids(), vec![1, 2]);
        assert!(merged.contains(1));
        assert!(!merged.contains(3));
        // A shared class keeps the first writer's app; unshared classes
        // keep their own.
        assert_eq!(merged.app_of(2), Some("a"));
        assert_eq!(merged.app_of(1), Some("b"));
        assert_eq!(merged.num_paths(2, true), 2);
        assert_eq!(merged.max_paths(true), 2);
    }

    #[test]
    fn test_apply_selection_copies_masks_and_fractions() {
        let mut ours = three_path_pptc();
        let mut theirs = three_path_pptc();
        theirs.mask(1, vec![true, false, true]).unwrap();
        theirs.all_paths_mut(1).unwrap()[1].set_flow_fraction(0.75);

        ours.apply_selection(&theirs);
        assert_eq!(ours.get_mask(1).unwrap(), &[true, false, true]);
        assert!((ours.all_paths(1).unwrap()[1].flow_fraction() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_assign_to_tc_filters_by_predicate() {
        let mut topo = Topology::new("t");
        for id in 0..4 {
            topo.add_node(id, HashMap::new());
        }
        topo.set_mbox(1).unwrap();

        let mut by_pair: HashMap<NodeId, HashMap<NodeId, Vec<Path>>> = HashMap::new();
        by_pair.entry(0).or_default().insert(
            3,
            vec![Path::plain(vec![0, 1, 3]), Path::plain(vec![0, 2, 3])],
        );

        let tcs = vec![tc(1, 0, 3)];
        let pptc = assign_to_tc("app0", &tcs, &by_pair, has_mbox_predicate, &topo).unwrap();
        assert_eq!(pptc.num_paths(1, true), 1);
        assert_eq!(pptc.all_paths(1).unwrap()[0].nodes(), &[0, 1, 3]);
    }

    #[test]
    fn test_mbox_accessors() {
        let p = Path::with_mboxes(vec![0, 1, 2], vec![1]);
        assert_eq!(p.mboxes(), Some(&[1u32][..]));
        assert_eq!(p.len(), 3);
        assert_eq!(p.links().collect::<Vec<_>>(), vec![(0, 1), (1, 2)]);
        assert_eq!(Path::plain(vec![0, 1]).mboxes(), None);
    }
}
