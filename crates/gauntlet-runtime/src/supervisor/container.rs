//! Container supervisor
//!
//! Drives a docker-compatible CLI. Each node runs in its own container on the
//! host network with its data directory mounted at `/data`; the container log
//! is copied into the node's log file when it is stopped.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use gauntlet_core::{NodeDescriptor, NodeStatus};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{
    ensure_ports_free, launch_args, mark_failed, mark_stopped, poll_ready, ProcessSupervisor,
    StopMethod, StopReport,
};
use crate::client::NodeClient;
use crate::config::{NodeConfig, SupervisorConfig};
use crate::error::SupervisorError;
use crate::state::NodeHandle;

const CONTAINER_DATA_DIR: &str = "/data";

pub struct ContainerSupervisor {
    node_config: NodeConfig,
    config: SupervisorConfig,
    client: NodeClient,
    poll_interval: Duration,
    containers: Mutex<HashSet<String>>,
}

impl ContainerSupervisor {
    pub fn new(
        node_config: NodeConfig,
        config: SupervisorConfig,
        client: NodeClient,
        poll_interval: Duration,
    ) -> Self {
        Self {
            node_config,
            config,
            client,
            poll_interval,
            containers: Mutex::new(HashSet::new()),
        }
    }

    pub fn container_name(&self, node: &NodeDescriptor) -> String {
        format!("{}-{}", self.config.name_prefix, node.id)
    }

    /// Arguments for `<runtime> run`
    pub fn run_args(&self, node: &NodeDescriptor, host_data_dir: &Path, extra_args: &[String]) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            self.container_name(node),
            "--network".to_string(),
            "host".to_string(),
            "-v".to_string(),
            format!("{}:{}", host_data_dir.display(), CONTAINER_DATA_DIR),
            self.config.image.clone(),
        ];
        args.extend(launch_args(node, &self.node_config, Path::new(CONTAINER_DATA_DIR)));
        args.extend(extra_args.iter().cloned());
        args
    }

    async fn cli(&self, args: &[&str]) -> Result<String, String> {
        let output = Command::new(&self.config.runtime)
            .args(args)
            .output()
            .await
            .map_err(|e| format!("{} {}: {}", self.config.runtime, args.join(" "), e))?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
        }
    }

    async fn is_running(&self, name: &str) -> bool {
        matches!(
            self.cli(&["inspect", "-f", "{{.State.Running}}", name]).await.as_deref(),
            Ok("true")
        )
    }

    async fn capture_logs(&self, name: &str, log_file: &Path) {
        match Command::new(&self.config.runtime).args(["logs", name]).output().await {
            Ok(output) => {
                let mut bytes = output.stdout;
                bytes.extend_from_slice(&output.stderr);
                if let Err(e) = fs::write(log_file, bytes) {
                    warn!(container = %name, error = %e, "Failed to write container log");
                }
            }
            Err(e) => warn!(container = %name, error = %e, "Failed to read container log"),
        }
    }
}

#[async_trait]
impl ProcessSupervisor for ContainerSupervisor {
    fn kind(&self) -> &'static str {
        "container"
    }

    async fn start(&self, node: &NodeHandle, extra_args: &[String]) -> Result<(), SupervisorError> {
        let descriptor = node.read().await.clone();
        let id = descriptor.id.clone();

        if let Err(e) = ensure_ports_free(&descriptor) {
            return Err(mark_failed(node, e).await);
        }

        let prepared = fs::create_dir_all(&descriptor.data_dir)
            .and_then(|_| match descriptor.log_file.parent() {
                Some(parent) => fs::create_dir_all(parent),
                None => Ok(()),
            })
            .and_then(|_| fs::canonicalize(&descriptor.data_dir));
        let host_data_dir = match prepared {
            Ok(path) => path,
            Err(source) => {
                let error = SupervisorError::Io {
                    node: id.clone(),
                    source,
                };
                return Err(mark_failed(node, error).await);
            }
        };

        let name = self.container_name(&descriptor);
        // Leftover from an earlier run would block the name
        let _ = self.cli(&["rm", "-f", &name]).await;

        let args = self.run_args(&descriptor, &host_data_dir, extra_args);
        debug!(node = %id, runtime = %self.config.runtime, ?args, "Launching container");
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        // Tracked before `run` so a start cancelled mid-launch is still removed by `stop`
        self.containers.lock().await.insert(id.clone());
        if let Err(message) = self.cli(&arg_refs).await {
            self.containers.lock().await.remove(&id);
            let error = SupervisorError::Container {
                node: id.clone(),
                message,
            };
            return Err(mark_failed(node, error).await);
        }

        let pid = self
            .cli(&["inspect", "-f", "{{.State.Pid}}", &name])
            .await
            .ok()
            .and_then(|out| out.parse::<u32>().ok())
            .unwrap_or(0);
        {
            let mut guard = node.write().await;
            guard.pid = pid;
            guard.status = NodeStatus::Starting;
        }
        info!(node = %id, container = %name, pid, "Container started");
        Ok(())
    }

    async fn wait_ready(&self, node: &NodeHandle, timeout: Duration) -> bool {
        let name = self.container_name(&*node.read().await);
        let name = name.as_str();
        poll_ready(&self.client, node, timeout, self.poll_interval, move || async move {
            !self.is_running(name).await
        })
        .await
    }

    async fn stop(&self, node: &NodeHandle, grace: Duration) -> StopReport {
        let descriptor = node.read().await.clone();
        let id = descriptor.id.clone();
        if !self.containers.lock().await.remove(&id) {
            mark_stopped(node).await;
            return StopReport::new(id, StopMethod::NotRunning);
        }

        let name = self.container_name(&descriptor);
        let grace_secs = grace.as_secs().max(1).to_string();
        let deadline = grace + Duration::from_secs(10);
        let stopped = tokio::time::timeout(
            deadline,
            self.cli(&["stop", "-t", &grace_secs, &name]),
        )
        .await;

        let report = match stopped {
            Ok(Ok(_)) => StopReport::new(&id, StopMethod::Graceful),
            Ok(Err(message)) => {
                warn!(node = %id, %message, "Container stop failed, removing forcibly");
                StopReport::new(&id, StopMethod::Forced).with_warning(message)
            }
            Err(_) => {
                warn!(node = %id, "Container stop hung, removing forcibly");
                StopReport::new(&id, StopMethod::Forced).with_warning("stop timed out")
            }
        };

        self.capture_logs(&name, &descriptor.log_file).await;
        if let Err(message) = self.cli(&["rm", "-f", &name]).await {
            warn!(node = %id, %message, "Container removal failed");
        }
        mark_stopped(node).await;
        info!(node = %id, container = %name, "Container stopped");
        report
    }
}
