//! Process supervision
//!
//! A [`ProcessSupervisor`] owns the lifecycle of node processes: launch,
//! readiness, and a stop that always ends with the node marked stopped.
//! Descriptors are passed as [`NodeHandle`]s and only written under their lock.
//!
//! Two implementations exist: [`LocalProcessSupervisor`] runs the node binary
//! directly, [`ContainerSupervisor`] runs it through a container runtime CLI.

use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use gauntlet_core::{NodeDescriptor, NodeStatus};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::client::{NodeClient, NodeTarget};
use crate::config::NodeConfig;
use crate::error::SupervisorError;
use crate::state::NodeHandle;

mod container;
mod local;

pub use container::ContainerSupervisor;
pub use local::LocalProcessSupervisor;

// ----------------------------------------------------------------------------
// Supervisor Trait
// ----------------------------------------------------------------------------

/// How a node ended up stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMethod {
    /// Nothing was running
    NotRunning,
    /// Process had already exited on its own
    Exited,
    Graceful,
    /// Grace period ran out and the process was killed
    Forced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReport {
    pub node: String,
    pub method: StopMethod,
    pub warning: Option<String>,
}

impl StopReport {
    pub fn new(node: impl Into<String>, method: StopMethod) -> Self {
        Self {
            node: node.into(),
            method,
            warning: None,
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }
}

#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// Short name used in logs
    fn kind(&self) -> &'static str;

    /// Launch the node; on success the node is `starting` with a pid
    async fn start(&self, node: &NodeHandle, extra_args: &[String]) -> Result<(), SupervisorError>;

    /// Poll health until it succeeds (node becomes `running`) or `timeout`
    /// elapses (node untouched)
    async fn wait_ready(&self, node: &NodeHandle, timeout: Duration) -> bool;

    /// Stop the node; always leaves it `stopped` with pid 0
    async fn stop(&self, node: &NodeHandle, grace: Duration) -> StopReport;

    /// Stop every node in reverse order, continuing past individual problems
    async fn stop_all(&self, nodes: &[NodeHandle], grace: Duration) -> Vec<StopReport> {
        let mut reports = Vec::with_capacity(nodes.len());
        for node in nodes.iter().rev() {
            reports.push(self.stop(node, grace).await);
        }
        reports
    }
}

// ----------------------------------------------------------------------------
// Shared Helpers
// ----------------------------------------------------------------------------

/// Fail with `PortInUse` if any of the node's ports is already bound
pub fn ensure_ports_free(node: &NodeDescriptor) -> Result<(), SupervisorError> {
    for port in node.ports() {
        if TcpListener::bind(("0.0.0.0", port)).is_err() {
            return Err(SupervisorError::PortInUse {
                node: node.id.clone(),
                port,
            });
        }
    }
    Ok(())
}

/// Flags passed to the node binary after its subcommand
pub fn launch_args(node: &NodeDescriptor, config: &NodeConfig, data_dir: &Path) -> Vec<String> {
    let mut args: Vec<String> = config.subcommand.clone();
    args.extend([
        "--data".to_string(),
        data_dir.display().to_string(),
        "--listen".to_string(),
        node.listen_multiaddr(&config.listen_host),
        "--http".to_string(),
        format!("{}:{}", config.bind_host, node.http_port),
        "--admin".to_string(),
        format!("{}:{}", config.bind_host, node.admin_port),
    ]);
    if let Some(bootstrap) = &node.bootstrap_address {
        args.push("--bootstrap".to_string());
        args.push(bootstrap.clone());
    }
    args.push("--role".to_string());
    args.push(node.role.launch_role().to_string());
    args.extend(config.extra_args.iter().cloned());
    args
}

/// Mark a node failed after a start error
pub(crate) async fn mark_failed(node: &NodeHandle, error: SupervisorError) -> SupervisorError {
    let mut guard = node.write().await;
    guard.status = NodeStatus::Failed;
    guard.pid = 0;
    error
}

/// Mark a node stopped; the terminal state of every stop path
pub(crate) async fn mark_stopped(node: &NodeHandle) {
    let mut guard = node.write().await;
    guard.status = NodeStatus::Stopped;
    guard.pid = 0;
}

/// Poll `GET /health` until success, timeout, or `exited` reports the process gone
pub async fn poll_ready<F, Fut>(
    client: &NodeClient,
    node: &NodeHandle,
    timeout: Duration,
    poll_interval: Duration,
    mut exited: F,
) -> bool
where
    F: FnMut() -> Fut + Send,
    Fut: std::future::Future<Output = bool> + Send,
{
    let target: NodeTarget = client.target(&*node.read().await);
    let deadline = Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            debug!(node = %target.id, "Readiness timed out");
            return false;
        }
        if exited().await {
            debug!(node = %target.id, "Process exited before becoming ready");
            return false;
        }

        let probe_timeout = remaining.min(client.default_timeout());
        if client.health(&target, probe_timeout).await.success {
            node.write().await.status = NodeStatus::Running;
            info!(node = %target.id, port = target.http_port, "Node ready");
            return true;
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::sleep(poll_interval.min(remaining)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_core::{PortBases, TopologyPlanner};
    use std::path::PathBuf;

    fn nodes() -> Vec<NodeDescriptor> {
        TopologyPlanner::with_probe("/tmp/sup", |_: u16| false)
            .plan(4, &[3], PortBases::default())
            .unwrap()
    }

    #[test]
    fn test_launch_args_for_genesis() {
        let nodes = nodes();
        let config = NodeConfig::default();
        let args = launch_args(&nodes[0], &config, &nodes[0].data_dir);
        assert_eq!(
            args,
            vec![
                "run",
                "--data",
                "/tmp/sup/data/node00",
                "--listen",
                "/ip4/0.0.0.0/tcp/9000",
                "--http",
                ":18000",
                "--admin",
                ":18500",
                "--role",
                "bootstrap",
            ]
        );
    }

    #[test]
    fn test_launch_args_for_adversary() {
        let nodes = nodes();
        let config = NodeConfig {
            extra_args: vec!["--verbose".into()],
            bind_host: "127.0.0.1".into(),
            ..NodeConfig::default()
        };
        let args = launch_args(&nodes[3], &config, &PathBuf::from("/data"));
        let joined = args.join(" ");
        assert!(joined.contains("--data /data"));
        assert!(joined.contains("--http 127.0.0.1:18003"));
        assert!(joined.contains("--bootstrap /ip4/127.0.0.1/tcp/9000"));
        assert!(joined.ends_with("--role normal --verbose"));
    }

    #[test]
    fn test_ensure_ports_free_detects_listener() {
        let listener = TcpListener::bind("0.0.0.0:0").unwrap();
        let mut node = nodes().remove(1);
        let busy = listener.local_addr().unwrap().port();
        node.p2p_port = busy;
        node.http_port = busy;
        node.admin_port = busy;
        match ensure_ports_free(&node) {
            Err(SupervisorError::PortInUse { port, .. }) => assert_eq!(port, node.http_port),
            other => panic!("expected PortInUse, got {:?}", other),
        }
    }
}
