//! Shared fixtures: a scripted composer/optimization pair and small PPTC
//! builders used across selector tests.

use std::collections::HashMap;

use crate::config::NetworkConfig;
use crate::paths::{Path, Pptc};
use crate::solver::{Composer, FlowVar, Optimization, Xps};
use crate::topology::Topology;
use crate::traffic::{App, AppObjective, Constraint, CostMode, Objective, ResourceCost, TrafficClass};
use crate::{EpochComposition, Fairness, Result, TcId};

/// Scripted optimization: a snapshot of the composed state plus a canned
/// verdict. The objective rewards short visible paths
/// (`100 - total visible path length`), so k-shortest masks are optimal.
#[derive(Debug)]
pub(crate) struct MockOpt {
    pub solved: bool,
    pub objective: f64,
    pub solve_time: f64,
    pub cap: Option<usize>,
    pub epochs: usize,
    pub zero_flow_on_odd_lengths: bool,
    pub pptc: Pptc,
}

impl Optimization for MockOpt {
    fn cap_num_paths(&mut self, cap: usize) {
        self.cap = Some(cap);
    }

    fn solve(&mut self) {}

    fn is_solved(&self) -> bool {
        self.solved
    }

    fn time(&self) -> f64 {
        self.solve_time
    }

    fn solved_objective(&self) -> f64 {
        self.objective
    }

    fn chosen_paths(&self, _relaxed: bool) -> Pptc {
        let mut out = self.pptc.clone();
        for tc in out.tc_ids() {
            let Some(mask) = out.get_mask(tc).map(|m| m.to_vec()) else {
                continue;
            };
            let visible = mask.iter().filter(|m| !**m).count().max(1);
            let share = 1.0 / visible as f64;
            if let Some(paths) = out.all_paths_mut(tc) {
                for (path, masked) in paths.iter_mut().zip(&mask) {
                    path.set_flow_fraction(if *masked { 0.0 } else { share });
                }
            }
        }
        out
    }

    fn xps(&self) -> Xps {
        let mut xps = Xps::new();
        for tc in self.pptc.tc_ids() {
            let visible = self.pptc.paths(tc);
            if visible.is_empty() {
                continue;
            }
            let share = 1.0 / visible.len() as f64;
            let rows = visible
                .iter()
                .map(|path| {
                    let flow = if self.zero_flow_on_odd_lengths {
                        if path.len() % 2 == 0 {
                            1.0
                        } else {
                            0.0
                        }
                    } else {
                        share
                    };
                    (0..self.epochs).map(|_| FlowVar::Decision(flow)).collect()
                })
                .collect();
            xps.insert(tc, rows);
        }
        xps
    }
}

/// Composer returning [`MockOpt`] snapshots. Feasibility can be scripted per
/// compose call; every committed mask state is recorded for assertions.
/// `zero_flow_on_odd_lengths` makes the flow tensor depend on path identity
/// (odd-length paths carry no flow) instead of spreading flow uniformly.
#[derive(Default)]
pub(crate) struct MockComposer {
    pub feasibility: Vec<bool>,
    pub calls: usize,
    pub epochs: usize,
    pub zero_flow_on_odd_lengths: bool,
    pub mask_history: HashMap<TcId, Vec<Vec<bool>>>,
}

impl MockComposer {
    pub fn with_feasibility(feasibility: Vec<bool>) -> Self {
        Self {
            feasibility,
            ..Self::default()
        }
    }
}

impl Composer for MockComposer {
    type Opt = MockOpt;

    fn compose(
        &mut self,
        apps: &[App],
        _topo: &Topology,
        _netcfg: &NetworkConfig,
        _fairness: Fairness,
        _epoch_mode: EpochComposition,
    ) -> Result<MockOpt> {
        let merged = Pptc::merge(apps.iter().map(|a| &a.pptc));
        for tc in merged.tc_ids() {
            if let Some(mask) = merged.get_mask(tc) {
                self.mask_history.entry(tc).or_default().push(mask.to_vec());
            }
        }

        let solved = self.feasibility.get(self.calls).copied().unwrap_or(true);
        self.calls += 1;

        let total_len: f64 = merged
            .tc_ids()
            .into_iter()
            .map(|tc| merged.paths(tc).iter().map(|p| p.len() as f64).sum::<f64>())
            .sum();

        Ok(MockOpt {
            solved,
            objective: 100.0 - total_len,
            solve_time: 0.01,
            cap: None,
            epochs: self.epochs.max(1),
            zero_flow_on_odd_lengths: self.zero_flow_on_odd_lengths,
            pptc: merged,
        })
    }
}

pub(crate) fn make_app(name: &str, pptc: Pptc) -> App {
    App::new(
        name,
        pptc,
        vec![Constraint::RouteAll],
        HashMap::from([(
            "bw".to_string(),
            ResourceCost {
                mode: CostMode::Links,
                cost: 1.0,
            },
        )]),
        AppObjective {
            objective: Objective::MinLinkLoad,
            resource: Some("bw".to_string()),
        },
    )
}

/// One traffic class (id 1, 0 -> 3) with candidate lengths 4, 5, 6.
pub(crate) fn line4_pptc() -> Pptc {
    let mut pptc = Pptc::new();
    pptc.add(
        "app0",
        TrafficClass::new(1, "tc", 0, 3, vec![10.0]),
        vec![
            Path::plain(vec![0, 1, 2, 3]),
            Path::plain(vec![0, 1, 4, 2, 3]),
            Path::plain(vec![0, 1, 4, 5, 2, 3]),
        ],
    );
    pptc
}

pub(crate) fn line4_app() -> App {
    make_app("app0", line4_pptc())
}

/// Two traffic classes with `n1` and `n2` candidates of strictly increasing
/// lengths.
pub(crate) fn two_tc_app(n1: usize, n2: usize) -> App {
    let chain = |len: usize| -> Path { Path::plain((0..len as u32).collect()) };
    let mut pptc = Pptc::new();
    pptc.add(
        "app0",
        TrafficClass::new(1, "tc1", 0, 1, vec![5.0]),
        (0..n1).map(|i| chain(i + 2)).collect(),
    );
    pptc.add(
        "app0",
        TrafficClass::new(2, "tc2", 0, 2, vec![7.0]),
        (0..n2).map(|i| chain(i + 2)).collect(),
    );
    make_app("app0", pptc)
}
