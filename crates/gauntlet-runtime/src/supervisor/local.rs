//! Local process supervisor

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use gauntlet_core::NodeStatus;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{
    ensure_ports_free, launch_args, mark_failed, mark_stopped, poll_ready, ProcessSupervisor,
    StopMethod, StopReport,
};
use crate::client::NodeClient;
use crate::config::NodeConfig;
use crate::error::SupervisorError;
use crate::state::NodeHandle;

/// Runs the node binary as a child process of the harness
pub struct LocalProcessSupervisor {
    config: NodeConfig,
    client: NodeClient,
    poll_interval: Duration,
    children: Mutex<HashMap<String, Child>>,
}

impl LocalProcessSupervisor {
    pub fn new(config: NodeConfig, client: NodeClient, poll_interval: Duration) -> Self {
        Self {
            config,
            client,
            poll_interval,
            children: Mutex::new(HashMap::new()),
        }
    }

    async fn has_exited(&self, id: &str) -> bool {
        let mut children = self.children.lock().await;
        match children.get_mut(id) {
            Some(child) => match child.try_wait() {
                Ok(Some(status)) => {
                    warn!(node = %id, %status, "Node process exited during startup");
                    true
                }
                Ok(None) => false,
                Err(e) => {
                    warn!(node = %id, error = %e, "Failed to query node process");
                    false
                }
            },
            None => true,
        }
    }
}

#[async_trait]
impl ProcessSupervisor for LocalProcessSupervisor {
    fn kind(&self) -> &'static str {
        "local"
    }

    async fn start(&self, node: &NodeHandle, extra_args: &[String]) -> Result<(), SupervisorError> {
        let descriptor = node.read().await.clone();
        let id = descriptor.id.clone();

        if let Err(e) = ensure_ports_free(&descriptor) {
            return Err(mark_failed(node, e).await);
        }

        let io_err = |source| SupervisorError::Io {
            node: id.clone(),
            source,
        };
        let prepared = fs::create_dir_all(&descriptor.data_dir)
            .and_then(|_| match descriptor.log_file.parent() {
                Some(parent) => fs::create_dir_all(parent),
                None => Ok(()),
            })
            .and_then(|_| {
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&descriptor.log_file)
            })
            .and_then(|log| log.try_clone().map(|err_log| (log, err_log)));
        let (stdout_log, stderr_log) = match prepared {
            Ok(logs) => logs,
            Err(source) => return Err(mark_failed(node, io_err(source)).await),
        };

        let mut args = launch_args(&descriptor, &self.config, &descriptor.data_dir);
        args.extend(extra_args.iter().cloned());
        debug!(node = %id, binary = %self.config.binary.display(), ?args, "Launching node");

        let spawned = Command::new(&self.config.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_log))
            .stderr(Stdio::from(stderr_log))
            .kill_on_drop(true)
            .spawn();
        let child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let error = SupervisorError::LaunchFailed {
                    node: id.clone(),
                    reason: e.to_string(),
                };
                return Err(mark_failed(node, error).await);
            }
        };

        let pid = child.id().unwrap_or(0);
        {
            let mut guard = node.write().await;
            guard.pid = pid;
            guard.status = NodeStatus::Starting;
        }
        self.children.lock().await.insert(id.clone(), child);
        info!(node = %id, pid, p2p = descriptor.p2p_port, http = descriptor.http_port, "Node started");
        Ok(())
    }

    async fn wait_ready(&self, node: &NodeHandle, timeout: Duration) -> bool {
        let id = node.read().await.id.clone();
        let id = id.as_str();
        poll_ready(&self.client, node, timeout, self.poll_interval, move || {
            self.has_exited(id)
        })
        .await
    }

    async fn stop(&self, node: &NodeHandle, grace: Duration) -> StopReport {
        let id = node.read().await.id.clone();
        let child = self.children.lock().await.remove(&id);
        let Some(mut child) = child else {
            mark_stopped(node).await;
            return StopReport::new(id, StopMethod::NotRunning);
        };

        if let Ok(Some(status)) = child.try_wait() {
            debug!(node = %id, %status, "Node already exited");
            mark_stopped(node).await;
            return StopReport::new(id, StopMethod::Exited);
        }

        let mut warning = None;
        if let Err(e) = terminate(&mut child) {
            warning = Some(format!("graceful signal failed: {}", e));
        }

        let report = match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                info!(node = %id, %status, "Node stopped");
                StopReport::new(&id, StopMethod::Graceful)
            }
            Ok(Err(e)) => {
                warn!(node = %id, error = %e, "Waiting on node failed, killing");
                force_kill(&id, &mut child).await;
                StopReport::new(&id, StopMethod::Forced).with_warning(e.to_string())
            }
            Err(_) => {
                warn!(node = %id, grace_ms = grace.as_millis() as u64, "Node ignored termination, killing");
                force_kill(&id, &mut child).await;
                StopReport::new(&id, StopMethod::Forced)
                    .with_warning("grace period elapsed")
            }
        };

        mark_stopped(node).await;
        match warning {
            Some(w) if report.warning.is_none() => report.with_warning(w),
            _ => report,
        }
    }
}

/// Ask the child to exit
#[cfg(unix)]
fn terminate(child: &mut Child) -> std::io::Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };
    // SAFETY: plain signal delivery to a pid we spawned and have not reaped.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> std::io::Result<()> {
    child.start_kill()
}

async fn force_kill(id: &str, child: &mut Child) {
    if let Err(e) = child.kill().await {
        warn!(node = %id, error = %e, "Force kill failed");
    }
}
