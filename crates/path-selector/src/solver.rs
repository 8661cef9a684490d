//! Contract with the external optimizer.
//!
//! The selection core never builds or solves the ILP itself; it composes
//! applications through a [`Composer`] and drives the returned
//! [`Optimization`]. Solver calls are blocking and opaque, and solver-internal
//! failures surface unchanged through `solve`/`is_solved`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::NetworkConfig;
use crate::paths::Pptc;
use crate::topology::Topology;
use crate::traffic::App;
use crate::{EpochComposition, Fairness, Result, TcId};

/// One entry of the per-path flow tensor. Solvers emit a mix of fixed
/// constants (paths forced on or off) and decision variables; expel policies
/// that read flow magnitudes must only trust the latter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FlowVar {
    Const(f64),
    Decision(f64),
}

impl FlowVar {
    /// The numeric value regardless of provenance.
    pub fn value(&self) -> f64 {
        match self {
            FlowVar::Const(v) | FlowVar::Decision(v) => *v,
        }
    }

    /// The value only if this entry is a solver decision variable.
    pub fn decision_value(&self) -> Option<f64> {
        match self {
            FlowVar::Decision(v) => Some(*v),
            FlowVar::Const(_) => None,
        }
    }
}

/// Flow decision tensor `xps[tc][visible_path][epoch]`.
///
/// The path axis is dense over *visible* paths in candidate order: row `j`
/// belongs to the j-th unmasked path at solve time, never to raw candidate
/// index `j`.
#[derive(Debug, Clone, Default)]
pub struct Xps {
    per_tc: HashMap<TcId, Vec<Vec<FlowVar>>>,
}

impl Xps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tc: TcId, rows: Vec<Vec<FlowVar>>) {
        self.per_tc.insert(tc, rows);
    }

    /// Rows for one traffic class, one per visible path.
    pub fn flows(&self, tc: TcId) -> Option<&[Vec<FlowVar>]> {
        self.per_tc.get(&tc).map(|rows| rows.as_slice())
    }
}

/// A composed optimization, ready to solve.
pub trait Optimization {
    /// Add a global cap on the total number of chosen paths.
    fn cap_num_paths(&mut self, cap: usize);

    /// Solve. Blocking; inspect [`Optimization::is_solved`] afterwards.
    fn solve(&mut self);

    fn is_solved(&self) -> bool;

    /// Solver-internal wall time of the last `solve`, in seconds.
    fn time(&self) -> f64;

    /// Objective value of the solved optimization.
    fn solved_objective(&self) -> f64;

    /// Solver-selected paths with masks (and flow fractions) updated.
    /// `relaxed` admits paths carrying any nonzero fractional flow.
    fn chosen_paths(&self, relaxed: bool) -> Pptc;

    /// Per-path flow decision tensor of the last solve.
    fn xps(&self) -> Xps;

    /// Write the model as a debug artifact. Best-effort: callers log and
    /// continue on failure.
    fn write(&self, _path: &std::path::Path) -> std::io::Result<()> {
        Ok(())
    }

    /// Write the solution as a debug artifact. Best-effort.
    fn write_solution(&self, _path: &std::path::Path) -> std::io::Result<()> {
        Ok(())
    }
}

/// Composes applications into a single optimization under a fairness rule.
pub trait Composer {
    type Opt: Optimization;

    fn compose(
        &mut self,
        apps: &[App],
        topo: &Topology,
        netcfg: &NetworkConfig,
        fairness: Fairness,
        epoch_mode: EpochComposition,
    ) -> Result<Self::Opt>;
}
