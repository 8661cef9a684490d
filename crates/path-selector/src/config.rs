//! Network-wide configuration handed to the composer alongside the topology.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::traffic::App;

/// Per-resource capacity fractions. A cap of 1.0 lets the optimization use
/// the full capacity recorded in the topology; lower values reserve headroom.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkCaps {
    caps: HashMap<String, f64>,
}

impl NetworkCaps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap every resource any of the applications is charged for at
    /// `cap_fraction`.
    pub fn for_apps(apps: &[App], cap_fraction: f64) -> Self {
        let mut caps = Self::new();
        for app in apps {
            for resource in app.resources() {
                caps.add_cap(resource, cap_fraction);
            }
        }
        caps
    }

    pub fn add_cap(&mut self, resource: impl Into<String>, cap_fraction: f64) {
        self.caps.insert(resource.into(), cap_fraction);
    }

    pub fn get(&self, resource: &str) -> Option<f64> {
        self.caps.get(resource).copied()
    }

    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.caps.keys().map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub caps: NetworkCaps,
}

impl NetworkConfig {
    pub fn new(caps: NetworkCaps) -> Self {
        Self { caps }
    }
}
