//! Harness configuration
//!
//! Every section is plain serde data with defaults so the binary can layer it
//! with figment. Durations are stored as integer `_ms`/`_secs` fields and
//! exposed through accessor methods.

use std::path::PathBuf;
use std::time::Duration;

use gauntlet_core::{AttackType, PortBases, ScoringConfig};
use serde::{Deserialize, Serialize};

use crate::error::HarnessError;

// ----------------------------------------------------------------------------
// Top-level Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GauntletConfig {
    pub node: NodeConfig,
    pub topology: TopologyConfig,
    pub timing: TimingConfig,
    pub attacks: AttackConfig,
    pub scoring: ScoringConfig,
    pub supervisor: SupervisorConfig,
    pub output: OutputConfig,
}

impl GauntletConfig {
    pub fn validate(&self) -> Result<(), HarnessError> {
        let topo = &self.topology;
        if topo.nodes == 0 {
            return Err(HarnessError::Config("topology.nodes must be at least 1".into()));
        }
        if let Some(&bad) = topo.adversarial.iter().find(|&&i| i == 0 || i >= topo.nodes) {
            return Err(HarnessError::Config(format!(
                "adversarial index {} must be between 1 and {}",
                bad,
                topo.nodes.saturating_sub(1)
            )));
        }
        if let Some(expand_to) = topo.expand_to {
            if expand_to <= topo.nodes {
                return Err(HarnessError::Config(format!(
                    "topology.expand_to ({}) must exceed topology.nodes ({})",
                    expand_to, topo.nodes
                )));
            }
        }
        if !(0.0..=1.0).contains(&topo.min_viable_fraction) {
            return Err(HarnessError::Config(
                "topology.min_viable_fraction must be within 0.0..=1.0".into(),
            ));
        }
        if self.timing.sample_interval_ms == 0 {
            return Err(HarnessError::Config("timing.sample_interval_ms must be positive".into()));
        }
        if self.timing.readiness_poll_ms == 0 {
            return Err(HarnessError::Config("timing.readiness_poll_ms must be positive".into()));
        }
        if self.node.request_timeout_ms == 0 {
            return Err(HarnessError::Config("node.request_timeout_ms must be positive".into()));
        }
        if self.attacks.pool_size == 0 || self.supervisor.max_concurrency == 0 {
            return Err(HarnessError::Config("pool sizes must be positive".into()));
        }
        if self.node.binary.as_os_str().is_empty() {
            return Err(HarnessError::Config("node.binary must be set".into()));
        }
        if self.supervisor.kind == SupervisorKind::Container && self.supervisor.image.is_empty() {
            return Err(HarnessError::Config(
                "supervisor.image is required for the container supervisor".into(),
            ));
        }
        self.scoring.validate()?;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Sections
// ----------------------------------------------------------------------------

/// How to launch and talk to the node binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub binary: PathBuf,
    /// Arguments placed before the generated flags
    pub subcommand: Vec<String>,
    /// Arguments appended after the generated flags
    pub extra_args: Vec<String>,
    /// Appended after `extra_args` for adversarial nodes only
    pub adversarial_args: Vec<String>,
    /// Address the p2p listener binds to
    pub listen_host: String,
    /// Host used to reach node APIs and dial bootstrap peers
    pub api_host: String,
    /// Host part of the `--http`/`--admin` bind flags, empty for all interfaces
    pub bind_host: String,
    pub api_prefix: String,
    pub api_token: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("./node"),
            subcommand: vec!["run".to_string()],
            extra_args: Vec::new(),
            adversarial_args: Vec::new(),
            listen_host: "0.0.0.0".to_string(),
            api_host: "127.0.0.1".to_string(),
            bind_host: String::new(),
            api_prefix: "/api/v1".to_string(),
            api_token: None,
            request_timeout_ms: 5000,
        }
    }
}

impl NodeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    pub nodes: usize,
    /// Absolute indices of adversarial nodes
    pub adversarial: Vec<usize>,
    pub p2p_base: u16,
    pub http_base: u16,
    pub admin_base: u16,
    /// Grow the network to this many nodes in an extra stage
    pub expand_to: Option<usize>,
    /// Fraction of a stage's nodes that must become ready for the run to go on
    pub min_viable_fraction: f64,
    pub work_dir: PathBuf,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        let bases = PortBases::default();
        Self {
            nodes: 5,
            adversarial: vec![3, 4],
            p2p_base: bases.p2p,
            http_base: bases.http,
            admin_base: bases.admin,
            expand_to: None,
            min_viable_fraction: 0.8,
            work_dir: PathBuf::from("gauntlet-work"),
        }
    }
}

impl TopologyConfig {
    pub fn port_bases(&self) -> PortBases {
        PortBases {
            p2p: self.p2p_base,
            http: self.http_base,
            admin: self.admin_base,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub readiness_timeout_secs: u64,
    pub readiness_poll_ms: u64,
    pub stop_grace_secs: u64,
    /// Pause after each bring-up stage to let peers connect
    pub settle_ms: u64,
    /// Health loop duration once attacks begin
    pub observe_secs: u64,
    pub sample_interval_ms: u64,
    pub health_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            readiness_timeout_secs: 30,
            readiness_poll_ms: 500,
            stop_grace_secs: 5,
            settle_ms: 2000,
            observe_secs: 10,
            sample_interval_ms: 2000,
            health_timeout_ms: 2000,
        }
    }
}

impl TimingConfig {
    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_secs)
    }

    pub fn readiness_poll(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn observe(&self) -> Duration {
        Duration::from_secs(self.observe_secs)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }
}

/// Scenario selection and parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    pub scenarios: Vec<AttackType>,
    pub flood_requests: u32,
    pub replay_count: u32,
    pub sybil_identities: u32,
    pub exhaustion_connections: u32,
    pub exhaustion_hold_ms: u64,
    /// Worker pool bound for flood and resource exhaustion
    pub pool_size: usize,
    /// Pause between scenarios of one actor
    pub pause_ms: u64,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            scenarios: AttackType::DEFAULT_SUITE.to_vec(),
            flood_requests: 20,
            replay_count: 10,
            sybil_identities: 5,
            exhaustion_connections: 20,
            exhaustion_hold_ms: 2000,
            pool_size: 8,
            pause_ms: 500,
        }
    }
}

impl AttackConfig {
    pub fn exhaustion_hold(&self) -> Duration {
        Duration::from_millis(self.exhaustion_hold_ms)
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorKind {
    #[default]
    Local,
    Container,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub kind: SupervisorKind,
    /// Container runtime CLI
    pub runtime: String,
    pub image: String,
    pub name_prefix: String,
    /// Parallel readiness waits and health probes
    pub max_concurrency: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            kind: SupervisorKind::Local,
            runtime: "docker".to_string(),
            image: String::new(),
            name_prefix: "gauntlet".to_string(),
            max_concurrency: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Leave nodes up after the run until interrupted
    pub keep_running: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            keep_running: false,
        }
    }
}
