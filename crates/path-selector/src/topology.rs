//! Network topology: a directed graph with per-node and per-link resource
//! capacities, a middlebox set, and derived quantities (diameter, resource
//! totals) used by the path scorers.

use petgraph::algo::dijkstra;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{NodeId, Result, SelectorError};

/// Attributes stored on every topology node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeAttrs {
    pub id: NodeId,
    /// Resource name -> capacity (e.g. "cpu" -> 4.0, "tcam" -> 1000.0).
    #[serde(default)]
    pub resources: HashMap<String, f64>,
    /// Whether this node hosts a middlebox service.
    #[serde(default)]
    pub has_mbox: bool,
}

/// Attributes stored on every directed link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkAttrs {
    pub src: NodeId,
    pub dst: NodeId,
    /// Resource name -> capacity (e.g. "bw" -> 10000.0).
    #[serde(default)]
    pub resources: HashMap<String, f64>,
}

/// The network topology. Read-only to the selection core.
pub struct Topology {
    name: String,
    graph: DiGraph<NodeAttrs, LinkAttrs>,
    node_index: HashMap<NodeId, NodeIndex>,
}

#[derive(Serialize, Deserialize)]
struct TopologyJson {
    name: String,
    nodes: Vec<NodeAttrs>,
    links: Vec<LinkAttrs>,
}

impl Topology {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            graph: DiGraph::new(),
            node_index: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a node with its resource capacities. Re-adding an id replaces the
    /// stored attributes.
    pub fn add_node(&mut self, id: NodeId, resources: HashMap<String, f64>) {
        match self.node_index.get(&id) {
            Some(idx) => {
                self.graph[*idx].resources = resources;
            }
            None => {
                let idx = self.graph.add_node(NodeAttrs {
                    id,
                    resources,
                    has_mbox: false,
                });
                self.node_index.insert(id, idx);
            }
        }
    }

    /// Add a directed link. Both endpoints must already exist.
    pub fn add_link(
        &mut self,
        src: NodeId,
        dst: NodeId,
        resources: HashMap<String, f64>,
    ) -> Result<()> {
        let si = self.index_of(src)?;
        let di = self.index_of(dst)?;
        self.graph.add_edge(si, di, LinkAttrs { src, dst, resources });
        Ok(())
    }

    fn index_of(&self, id: NodeId) -> Result<NodeIndex> {
        self.node_index.get(&id).copied().ok_or_else(|| {
            SelectorError::InvalidConfig(format!(
                "node {id} is not part of topology {}",
                self.name
            ))
        })
    }

    /// Mark a node as hosting a middlebox.
    pub fn set_mbox(&mut self, id: NodeId) -> Result<()> {
        let idx = self.index_of(id)?;
        self.graph[idx].has_mbox = true;
        Ok(())
    }

    pub fn has_mbox(&self, id: NodeId) -> bool {
        self.node_index
            .get(&id)
            .map(|idx| self.graph[*idx].has_mbox)
            .unwrap_or(false)
    }

    pub fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_weights().map(|n| n.id)
    }

    pub fn links(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.graph.edge_references().map(|e| {
            let l = e.weight();
            (l.src, l.dst)
        })
    }

    pub fn node_resources(&self, id: NodeId) -> Option<&HashMap<String, f64>> {
        self.node_index.get(&id).map(|idx| &self.graph[*idx].resources)
    }

    pub fn link_resources(&self, src: NodeId, dst: NodeId) -> Option<&HashMap<String, f64>> {
        let si = self.node_index.get(&src)?;
        let di = self.node_index.get(&dst)?;
        let edge = self.graph.find_edge(*si, *di)?;
        Some(&self.graph[edge].resources)
    }

    /// Sum of capacity for resource `r` across all nodes and links.
    pub fn total_resource(&self, r: &str) -> f64 {
        let node_total: f64 = self
            .graph
            .node_weights()
            .filter_map(|n| n.resources.get(r))
            .sum();
        let link_total: f64 = self
            .graph
            .edge_references()
            .filter_map(|e| e.weight().resources.get(r))
            .sum();
        node_total + link_total
    }

    /// Longest shortest-path (in hops) over all reachable node pairs.
    ///
    /// Returns at least 1 so it is always safe as a length normalizer.
    pub fn diameter(&self) -> usize {
        let mut longest = 0usize;
        for start in self.graph.node_indices() {
            let dist = dijkstra(&self.graph, start, None, |_| 1usize);
            if let Some(d) = dist.values().max() {
                longest = longest.max(*d);
            }
        }
        longest.max(1)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let nodes: Vec<NodeAttrs> = self.graph.node_weights().cloned().collect();
        let links: Vec<LinkAttrs> = self
            .graph
            .edge_references()
            .map(|e| e.weight().clone())
            .collect();
        serde_json::json!(TopologyJson {
            name: self.name.clone(),
            nodes,
            links,
        })
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let parsed: TopologyJson = serde_json::from_value(value)?;
        let mut topo = Topology::new(parsed.name);
        for n in parsed.nodes {
            topo.add_node(n.id, n.resources);
            if n.has_mbox {
                topo.set_mbox(n.id)?;
            }
        }
        for l in parsed.links {
            topo.add_link(l.src, l.dst, l.resources)?;
        }
        Ok(topo)
    }
}
