//! Network health monitoring
//!
//! [`HealthMonitor::sample`] probes every node concurrently with a bounded
//! fan-out and folds the answers into one [`NetworkSample`]. A node that does
//! not answer is recorded with a neighbor count of -1; sampling itself never
//! fails. [`HealthMonitor::run_loop`] repeats this on a fixed interval and
//! appends to the run's sample log.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use gauntlet_core::{NetworkSample, NodeDescriptor, NodeRole};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::client::{NodeClient, NodeTarget};
use crate::state::RunState;

// ----------------------------------------------------------------------------
// Health Monitor
// ----------------------------------------------------------------------------

/// Per-node view printed by `probe`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDetails {
    pub id: String,
    pub role: NodeRole,
    pub healthy: bool,
    /// -1 when unreachable
    pub neighbors: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<serde_json::Value>,
}

pub struct HealthMonitor {
    client: NodeClient,
    probe_timeout: Duration,
    concurrency: usize,
    host: HostSampler,
}

impl HealthMonitor {
    pub fn new(client: NodeClient, probe_timeout: Duration, concurrency: usize) -> Self {
        Self {
            client,
            probe_timeout,
            concurrency: concurrency.max(1),
            host: HostSampler::new(),
        }
    }

    pub async fn sample(&self, descriptors: &[NodeDescriptor]) -> NetworkSample {
        let timeout = self.probe_timeout;
        let targets: Vec<NodeTarget> = descriptors.iter().map(|n| self.client.target(n)).collect();
        let client = self.client.clone();
        let probes: Vec<(String, Option<i64>)> = stream::iter(targets.into_iter().map(move |target| {
            let client = client.clone();
            async move {
                let health = client.health(&target, timeout).await;
                if !health.success {
                    debug!(node = %target.id, status = health.status_code, "Health probe failed");
                    return (target.id, None);
                }
                let neighbors = client.neighbor_count(&target, timeout).await.unwrap_or(0);
                (target.id, Some(neighbors))
            }
        }))
        .buffer_unordered(self.concurrency)
        .collect::<Vec<_>>()
        .boxed()
        .await;

        let mut neighbor_counts = BTreeMap::new();
        let mut healthy_nodes = 0;
        for (id, result) in probes {
            match result {
                Some(count) => {
                    healthy_nodes += 1;
                    neighbor_counts.insert(id, count);
                }
                None => {
                    neighbor_counts.insert(id, -1);
                }
            }
        }

        let (cpu_percent, memory_percent) = self.host.sample().await;
        NetworkSample {
            timestamp: Utc::now(),
            total_nodes: descriptors.len(),
            healthy_nodes,
            neighbor_counts,
            cpu_percent,
            memory_percent,
        }
    }

    /// Fetch `node/info` from every node the sample saw healthy
    ///
    /// Order follows `descriptors`. A node that answers its health probe but
    /// not the info query is reported healthy with no info.
    pub async fn inspect(&self, descriptors: &[NodeDescriptor], sample: &NetworkSample) -> Vec<NodeDetails> {
        let nodes: Vec<(NodeDescriptor, i64)> = descriptors
            .iter()
            .map(|n| (n.clone(), sample.neighbor_counts.get(&n.id).copied().unwrap_or(-1)))
            .collect();
        let client = self.client.clone();
        stream::iter(nodes.into_iter().map(move |(node, neighbors)| {
            let client = client.clone();
            async move {
                let healthy = neighbors >= 0;
                let info = if healthy {
                    let outcome = client.node_info(&client.target(&node)).await;
                    if !outcome.success {
                        debug!(node = %node.id, status = outcome.status_code, "Node info unavailable");
                    }
                    outcome.success.then(|| outcome.json()).flatten()
                } else {
                    None
                };
                NodeDetails {
                    id: node.id,
                    role: node.role,
                    healthy,
                    neighbors,
                    info,
                }
            }
        }))
        .buffered(self.concurrency)
        .collect::<Vec<_>>()
        .boxed()
        .await
    }

    /// Sample `ceil(duration / interval)` times, the first tick immediately
    ///
    /// Descriptors are re-read from `state` on every tick so nodes added by a
    /// later stage are picked up. Returns the number of samples taken.
    pub async fn run_loop(&self, state: &RunState, interval: Duration, duration: Duration) -> usize {
        let ticks = tick_count(interval, duration);
        let mut timer = tokio::time::interval(interval.max(Duration::from_millis(1)));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for tick in 0..ticks {
            timer.tick().await;
            let descriptors = state.descriptors().await;
            let sample = self.sample(&descriptors).await;
            debug!(
                tick,
                healthy = sample.healthy_nodes,
                total = sample.total_nodes,
                cpu = sample.cpu_percent,
                "Health sample"
            );
            state.samples.push(sample).await;
        }
        ticks
    }
}

fn tick_count(interval: Duration, duration: Duration) -> usize {
    if duration.is_zero() {
        return 0;
    }
    let interval = interval.as_millis().max(1);
    duration.as_millis().div_ceil(interval) as usize
}

/// Log the per-node status table
pub fn summarize(descriptors: &[NodeDescriptor], sample: &NetworkSample) {
    info!(
        "Network: {}/{} nodes healthy, cpu {:.1}%, memory {:.1}%",
        sample.healthy_nodes, sample.total_nodes, sample.cpu_percent, sample.memory_percent
    );
    for node in descriptors {
        match sample.neighbor_counts.get(&node.id) {
            Some(count) if *count >= 0 => {
                info!("  ok   {:<8} {:<12} neighbors: {}", node.id, node.role.as_str(), count)
            }
            _ => warn!("  down {:<8} {:<12} ({})", node.id, node.role.as_str(), node.status),
        }
    }
}

// ----------------------------------------------------------------------------
// Host Metrics
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CpuTimes {
    busy: u64,
    total: u64,
}

/// Host-level CPU and memory usage from procfs
///
/// CPU usage is the delta since the previous call. Platforms without procfs
/// report zeros.
pub struct HostSampler {
    previous: Mutex<Option<CpuTimes>>,
}

impl HostSampler {
    pub fn new() -> Self {
        Self {
            previous: Mutex::new(None),
        }
    }

    /// (cpu percent, memory percent)
    pub async fn sample(&self) -> (f64, f64) {
        let cpu = match read_proc("/proc/stat").await.as_deref().and_then(parse_cpu_times) {
            Some(now) => {
                let mut previous = self.previous.lock().await;
                let base = previous.unwrap_or(CpuTimes { busy: 0, total: 0 });
                *previous = Some(now);
                cpu_percent(base, now)
            }
            None => 0.0,
        };
        let memory = read_proc("/proc/meminfo")
            .await
            .as_deref()
            .and_then(parse_memory_percent)
            .unwrap_or(0.0);
        (cpu, memory)
    }
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_proc(path: &str) -> Option<String> {
    if !cfg!(target_os = "linux") {
        return None;
    }
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => Some(raw),
        Err(e) => {
            warn!(path, error = %e, "Failed to read host metrics");
            None
        }
    }
}

fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|f| f.parse().ok())
        .collect();
    if fields.len() < 4 {
        return None;
    }
    // guest time is already folded into user and nice
    let total: u64 = fields.iter().take(8).sum();
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Some(CpuTimes {
        busy: total.saturating_sub(idle),
        total,
    })
}

fn cpu_percent(previous: CpuTimes, now: CpuTimes) -> f64 {
    let total = now.total.saturating_sub(previous.total);
    if total == 0 {
        return 0.0;
    }
    let busy = now.busy.saturating_sub(previous.busy);
    (busy as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

fn parse_memory_percent(meminfo: &str) -> Option<f64> {
    let field = |name: &str| -> Option<u64> {
        meminfo
            .lines()
            .find(|l| l.starts_with(name))?
            .split_whitespace()
            .nth(1)?
            .parse()
            .ok()
    };
    let total = field("MemTotal:")?;
    let available = field("MemAvailable:").or_else(|| field("MemFree:"))?;
    if total == 0 {
        return None;
    }
    Some((total.saturating_sub(available)) as f64 / total as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_count_rounds_up() {
        assert_eq!(tick_count(Duration::from_secs(2), Duration::from_secs(10)), 5);
        assert_eq!(tick_count(Duration::from_millis(300), Duration::from_secs(1)), 4);
        assert_eq!(tick_count(Duration::from_secs(2), Duration::ZERO), 0);
        assert_eq!(tick_count(Duration::from_secs(5), Duration::from_secs(1)), 1);
    }

    #[test]
    fn test_parse_cpu_delta() {
        let first = parse_cpu_times("cpu  100 0 100 800 0 0 0 0 0 0\ncpu0 1 2 3 4\n").unwrap();
        let second = parse_cpu_times("cpu  200 0 200 1000 0 0 0 0 0 0\n").unwrap();
        assert_eq!(first, CpuTimes { busy: 200, total: 1000 });
        assert_eq!(cpu_percent(first, second), 50.0);
        assert!(parse_cpu_times("intr 1 2 3").is_none());
    }

    #[test]
    fn test_parse_memory_percent() {
        let meminfo = "MemTotal:       1000 kB\nMemFree:         100 kB\nMemAvailable:    250 kB\n";
        assert_eq!(parse_memory_percent(meminfo), Some(75.0));
        assert_eq!(parse_memory_percent("MemFree: 1 kB"), None);
    }
}
