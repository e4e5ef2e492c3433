//! Point-in-time observations of the whole network

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One health monitor tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSample {
    pub timestamp: DateTime<Utc>,
    pub total_nodes: usize,
    pub healthy_nodes: usize,
    /// Neighbor count per node id, -1 when the node could not be reached
    pub neighbor_counts: BTreeMap<String, i64>,
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

impl NetworkSample {
    pub fn unreachable_nodes(&self) -> impl Iterator<Item = &str> {
        self.neighbor_counts
            .iter()
            .filter(|(_, count)| **count < 0)
            .map(|(id, _)| id.as_str())
    }

    /// Mean neighbor count over reachable nodes
    pub fn average_neighbors(&self) -> Option<f64> {
        let reachable: Vec<i64> = self
            .neighbor_counts
            .values()
            .copied()
            .filter(|c| *c >= 0)
            .collect();
        if reachable.is_empty() {
            None
        } else {
            Some(reachable.iter().sum::<i64>() as f64 / reachable.len() as f64)
        }
    }
}
