//! Path-Selection Core
//!
//! Chooses a small subset of candidate paths per traffic class so that a
//! downstream optimizer, composing all applications under a fairness rule,
//! stays tractable instead of considering every candidate path.
//!
//! Selection state is a boolean mask per traffic class over its ordered
//! candidate list (`true` = suppressed, `false` = participating). The
//! strategies manipulate the masks and drive an opaque solver:
//!
//! | Strategy    | Entry point                        |
//! |-------------|------------------------------------|
//! | random      | [`PathSelector::choose_rand`]      |
//! | k-shortest  | [`PathSelector::k_shortest_paths`] |
//! | k-resource  | [`PathSelector::k_resource_paths`] |
//! | ILP-bounded | [`PathSelector::select_ilp`]       |
//! | doubling    | [`PathSelector::select_iterative`] |
//! | annealing   | [`PathSelector::select_sa`]        |
//!
//! The solver itself is an external collaborator behind the
//! [`Composer`]/[`Optimization`] traits; tests drive the selectors with a
//! scripted mock.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod cluster;
pub mod config;
pub mod mutate;
pub mod observe;
pub mod paths;
pub mod score;
pub mod select;
pub mod solver;
pub mod topology;
pub mod traffic;
pub mod tree;

#[cfg(test)]
pub(crate) mod testutil;

pub use cluster::{cluster_tcs, ClusterMethod, TcClustering};
pub use config::{NetworkCaps, NetworkConfig};
pub use mutate::{ExpelMode, ReplaceMode};
pub use observe::{IterationEvent, SelectionObserver, TracingObserver};
pub use paths::{assign_to_tc, has_mbox_predicate, null_predicate, Path, Pptc};
pub use select::{IterConfig, PathSelector, SaConfig, Selection, SelectionMetadata};
pub use solver::{Composer, FlowVar, Optimization, Xps};
pub use topology::Topology;
pub use traffic::{App, TrafficClass};
pub use tree::PathTree;

/// Node identifier within a topology.
pub type NodeId = u32;

/// Traffic class identifier, unique within one selection run.
pub type TcId = u32;

#[derive(Error, Debug)]
pub enum SelectorError {
    /// The solver returned no feasible solution and selection cannot proceed.
    #[error("optimization is infeasible: no solution found")]
    Unsolvable,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unknown traffic class: {0}")]
    UnknownTrafficClass(TcId),
    #[error("mask length {got} does not match candidate count {expected} for traffic class {tc}")]
    MaskLength { tc: TcId, expected: usize, got: usize },
    #[error("candidate set mixes plain and middlebox paths")]
    MixedPathKinds,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SelectorError>;

/// Fairness rule applied when composing applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fairness {
    Weighted,
    PropFair,
    MaxMin,
}

impl Fairness {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "weighted" => Ok(Fairness::Weighted),
            "propfair" => Ok(Fairness::PropFair),
            "maxmin" => Ok(Fairness::MaxMin),
            other => Err(SelectorError::InvalidConfig(format!(
                "unknown fairness mode: {other}"
            ))),
        }
    }
}

/// How per-epoch objectives are combined into a single composed objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpochComposition {
    Worst,
    Average,
}

impl EpochComposition {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "worst" => Ok(EpochComposition::Worst),
            "average" | "avg" => Ok(EpochComposition::Average),
            other => Err(SelectorError::InvalidConfig(format!(
                "unknown epoch composition: {other}"
            ))),
        }
    }
}

/// Preordering used by the iterative-doubling selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortMode {
    Len,
    Resource,
}

impl SortMode {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "len" => Ok(SortMode::Len),
            "resource" => Ok(SortMode::Resource),
            other => Err(SelectorError::InvalidConfig(format!(
                "unknown sort mode: {other}"
            ))),
        }
    }
}
