//! Traffic classes and the application model handed to the composer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::paths::Pptc;
use crate::{NodeId, Result, SelectorError, TcId};

/// An aggregate of flows with a common ingress, egress, priority, and
/// per-epoch volume profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficClass {
    pub id: TcId,
    pub name: String,
    pub ingress: NodeId,
    pub egress: NodeId,
    pub priority: u32,
    /// Traffic volume per epoch, in flows. May be replaced by clustering.
    pub vol_flows: Vec<f64>,
    /// Source IP prefix, e.g. "10.0.1.0/24".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_prefix: Option<String>,
    /// Destination IP prefix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_prefix: Option<String>,
}

impl TrafficClass {
    pub fn new(
        id: TcId,
        name: impl Into<String>,
        ingress: NodeId,
        egress: NodeId,
        vol_flows: Vec<f64>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            ingress,
            egress,
            priority: 1,
            vol_flows,
            src_prefix: None,
            dst_prefix: None,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_prefixes(
        mut self,
        src_prefix: impl Into<String>,
        dst_prefix: impl Into<String>,
    ) -> Self {
        self.src_prefix = Some(src_prefix.into());
        self.dst_prefix = Some(dst_prefix.into());
        self
    }

    pub fn num_epochs(&self) -> usize {
        self.vol_flows.len()
    }
}

/// Constraints an application places on the composed optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Constraint {
    RouteAll,
    AllocateFlow,
    ReqAllLinks,
    ReqAllNodes,
    ReqSomeLinks,
    ReqSomeNodes,
    CapLinks,
    CapNodes,
    FixPaths,
    MinDiff,
    NodeBudget,
}

impl Constraint {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "route_all" => Ok(Constraint::RouteAll),
            "allocate_flow" => Ok(Constraint::AllocateFlow),
            "req_all_links" => Ok(Constraint::ReqAllLinks),
            "req_all_nodes" => Ok(Constraint::ReqAllNodes),
            "req_some_links" => Ok(Constraint::ReqSomeLinks),
            "req_some_nodes" => Ok(Constraint::ReqSomeNodes),
            "cap_links" => Ok(Constraint::CapLinks),
            "cap_nodes" => Ok(Constraint::CapNodes),
            "fix_path" => Ok(Constraint::FixPaths),
            "mindiff" => Ok(Constraint::MinDiff),
            "node_budget" => Ok(Constraint::NodeBudget),
            other => Err(SelectorError::InvalidConfig(format!(
                "unknown constraint: {other}"
            ))),
        }
    }
}

/// Objective an application optimizes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    MinLinkLoad,
    MinNodeLoad,
    MinLatency,
    MaxFlow,
    MinEnabledNodes,
}

impl Objective {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "minlinkload" => Ok(Objective::MinLinkLoad),
            "minnodeload" => Ok(Objective::MinNodeLoad),
            "minlatency" => Ok(Objective::MinLatency),
            "maxflow" => Ok(Objective::MaxFlow),
            "minenablednodes" => Ok(Objective::MinEnabledNodes),
            other => Err(SelectorError::InvalidConfig(format!(
                "unknown objective: {other}"
            ))),
        }
    }
}

/// Objective plus the resource it applies to, where relevant
/// (e.g. min-link-load over "bw").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppObjective {
    pub objective: Objective,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

/// Which topology elements a resource cost is charged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostMode {
    Nodes,
    Links,
    Mboxes,
}

/// Per-unit cost an application incurs on a resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceCost {
    pub mode: CostMode,
    pub cost: f64,
}

/// One application: its candidate paths, constraints, resource costs, and
/// objective, composed with its peers into a single optimization.
#[derive(Debug, Clone)]
pub struct App {
    pub name: String,
    pub pptc: Pptc,
    pub constraints: Vec<Constraint>,
    pub resource_cost: HashMap<String, ResourceCost>,
    pub objective: AppObjective,
}

impl App {
    pub fn new(
        name: impl Into<String>,
        pptc: Pptc,
        constraints: Vec<Constraint>,
        resource_cost: HashMap<String, ResourceCost>,
        objective: AppObjective,
    ) -> Self {
        Self {
            name: name.into(),
            pptc,
            constraints,
            resource_cost,
            objective,
        }
    }

    /// Resources this application is charged for.
    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.resource_cost.keys().map(|s| s.as_str())
    }
}
