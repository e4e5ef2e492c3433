//! Staged run orchestration
//!
//! One controlling task walks the stages in order:
//!
//! 1. `genesis`: start node 0; failure here aborts bring-up
//! 2. `normal-nodes` and `adversarial-nodes`: start in ascending index order,
//!    readiness waits joined through a bounded pool
//! 3. `expansion` (optional): grow the network from the same genesis
//! 4. `attacks`: every adversarial actor runs its suite while the health loop
//!    samples the network in a spawned task
//! 5. `teardown`: stop every node in reverse order
//!
//! The pipeline races a shutdown future. When the shutdown wins, the stage in
//! flight is recorded as interrupted, and teardown and the report still run.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use gauntlet_core::{
    FailedNode, NodeDescriptor, NodeRole, Report, ReportGenerator, StageOutcome, StageStatus,
    TopologyError, TopologyPlanner,
};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::attacks::AttackEngine;
use crate::client::NodeClient;
use crate::config::{GauntletConfig, SupervisorKind};
use crate::error::Result;
use crate::monitor::{self, HealthMonitor};
use crate::pool::WorkerPool;
use crate::state::{NodeHandle, RunState};
use crate::supervisor::{
    ContainerSupervisor, LocalProcessSupervisor, ProcessSupervisor, StopMethod,
};

pub const STAGE_GENESIS: &str = "genesis";
pub const STAGE_NORMAL: &str = "normal-nodes";
pub const STAGE_ADVERSARIAL: &str = "adversarial-nodes";
pub const STAGE_EXPANSION: &str = "expansion";
pub const STAGE_ATTACKS: &str = "attacks";
pub const STAGE_TEARDOWN: &str = "teardown";

// ----------------------------------------------------------------------------
// Run Outcome
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// Genesis failed or a stage fell below the minimum viable fraction
    BringUpFailed,
    Interrupted,
}

impl RunStatus {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Completed => 0,
            RunStatus::BringUpFailed => 1,
            RunStatus::Interrupted => 130,
        }
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub report: Report,
    pub report_path: PathBuf,
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }
}

// ----------------------------------------------------------------------------
// Construction Helpers
// ----------------------------------------------------------------------------

/// Supervisor implementation selected by `supervisor.kind`
pub fn build_supervisor(config: &GauntletConfig, client: NodeClient) -> Arc<dyn ProcessSupervisor> {
    let poll = config.timing.readiness_poll();
    match config.supervisor.kind {
        SupervisorKind::Local => Arc::new(LocalProcessSupervisor::new(config.node.clone(), client, poll)),
        SupervisorKind::Container => Arc::new(ContainerSupervisor::new(
            config.node.clone(),
            config.supervisor.clone(),
            client,
            poll,
        )),
    }
}

/// Plan the configured topology
///
/// With `check_host` unset, host ports are not probed; this reproduces the
/// layout of a topology that is already running.
pub fn plan_topology(
    config: &GauntletConfig,
    check_host: bool,
) -> std::result::Result<Vec<NodeDescriptor>, TopologyError> {
    let topology = &config.topology;
    let bases = topology.port_bases();
    if check_host {
        TopologyPlanner::new(&topology.work_dir)
            .bootstrap_host(config.node.api_host.clone())
            .plan(topology.nodes, &topology.adversarial, bases)
    } else {
        TopologyPlanner::with_probe(&topology.work_dir, |_: u16| false)
            .bootstrap_host(config.node.api_host.clone())
            .plan(topology.nodes, &topology.adversarial, bases)
    }
}

// ----------------------------------------------------------------------------
// Orchestrator
// ----------------------------------------------------------------------------

/// What the pipeline was doing when it stopped
#[derive(Default)]
struct Progress {
    stage: Option<&'static str>,
    monitor: Option<JoinHandle<usize>>,
}

pub struct Orchestrator {
    config: GauntletConfig,
    supervisor: Arc<dyn ProcessSupervisor>,
    client: NodeClient,
    state: Arc<RunState>,
    pool: WorkerPool,
    reports: ReportGenerator,
}

impl Orchestrator {
    pub fn new(config: GauntletConfig, supervisor: Arc<dyn ProcessSupervisor>, client: NodeClient) -> Self {
        let pool = WorkerPool::new(config.supervisor.max_concurrency);
        let reports = ReportGenerator::new(config.scoring.clone());
        Self {
            config,
            supervisor,
            client,
            state: Arc::new(RunState::new()),
            pool,
            reports,
        }
    }

    /// Validate the config and wire up the client and supervisor it names
    pub fn from_config(config: GauntletConfig) -> Result<Self> {
        config.validate()?;
        let client = NodeClient::new(&config.node)?;
        let supervisor = build_supervisor(&config, client.clone());
        Ok(Self::new(config, supervisor, client))
    }

    pub fn config(&self) -> &GauntletConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<RunState> {
        &self.state
    }

    /// Execute the whole run
    ///
    /// Errors only when planning fails before any node is started or when the
    /// report cannot be written. Everything in between is recorded as stage
    /// outcomes.
    pub async fn run<F>(&self, shutdown: F) -> Result<RunOutcome>
    where
        F: Future<Output = ()>,
    {
        let planned = plan_topology(&self.config, true)?;
        info!(
            nodes = planned.len(),
            adversarial = planned.iter().filter(|n| n.is_adversarial()).count(),
            supervisor = self.supervisor.kind(),
            "Planned topology"
        );
        let handles = self.state.add_nodes(planned).await;

        tokio::pin!(shutdown);
        let mut progress = Progress::default();
        let finished = tokio::select! {
            status = self.pipeline(&handles, &mut progress) => Some(status),
            _ = &mut shutdown => None,
        };

        let status = match finished {
            Some(status) => {
                if self.config.output.keep_running {
                    info!("Nodes left running, interrupt to tear down");
                    shutdown.await;
                }
                status
            }
            None => {
                warn!(stage = progress.stage.unwrap_or("none"), "Run interrupted");
                if let Some(monitor) = progress.monitor.take() {
                    monitor.abort();
                }
                if let Some(stage) = progress.stage {
                    self.state
                        .stages
                        .push(StageOutcome::interrupted(stage, "operator interrupt"))
                        .await;
                }
                RunStatus::Interrupted
            }
        };

        self.teardown().await;

        let report = self.reports.generate(
            self.state.started_at,
            self.state.stages.snapshot().await,
            self.state.events.snapshot().await,
            &self.state.samples.snapshot().await,
        );
        self.reports.log_summary(&report);
        let report_path = self.reports.write(&report, &self.config.output.dir)?;

        Ok(RunOutcome {
            status,
            report,
            report_path,
        })
    }

    async fn pipeline(&self, handles: &[NodeHandle], progress: &mut Progress) -> RunStatus {
        let mut genesis = Vec::new();
        let mut normal = Vec::new();
        let mut adversarial = Vec::new();
        for handle in handles {
            match handle.read().await.role {
                NodeRole::Genesis => genesis.push(handle.clone()),
                NodeRole::Normal => normal.push(handle.clone()),
                NodeRole::Adversarial => adversarial.push(handle.clone()),
            }
        }

        progress.stage = Some(STAGE_GENESIS);
        let stage = self.bring_up(STAGE_GENESIS, &genesis).await;
        let genesis_ready = stage.status == StageStatus::Success;
        self.record(stage, progress).await;
        if !genesis_ready {
            error!("Genesis node failed to start, aborting bring-up");
            for name in [STAGE_NORMAL, STAGE_ADVERSARIAL, STAGE_ATTACKS] {
                self.state
                    .stages
                    .push(StageOutcome::skipped(name, "genesis node failed"))
                    .await;
            }
            return RunStatus::BringUpFailed;
        }
        self.settle().await;

        let mut viable = true;
        for (name, batch) in [(STAGE_NORMAL, &normal), (STAGE_ADVERSARIAL, &adversarial)] {
            progress.stage = Some(name);
            let stage = self.bring_up(name, batch).await;
            viable &= stage.status.is_viable();
            self.record(stage, progress).await;
            self.settle().await;
        }

        if let Some(target) = self.config.topology.expand_to {
            progress.stage = Some(STAGE_EXPANSION);
            let stage = if viable {
                self.expand(target).await
            } else {
                StageOutcome::skipped(STAGE_EXPANSION, "bring-up below minimum viable fraction")
            };
            viable &= stage.status.is_viable();
            self.record(stage, progress).await;
            self.settle().await;
        }

        let descriptors = self.state.descriptors().await;
        let snapshot = self.health_monitor().sample(&descriptors).await;
        monitor::summarize(&descriptors, &snapshot);

        progress.stage = Some(STAGE_ATTACKS);
        progress.monitor = Some(self.spawn_monitor());
        let stage = if viable {
            self.attack().await
        } else {
            warn!("Bring-up below minimum viable fraction, skipping attacks");
            StageOutcome::skipped(STAGE_ATTACKS, "bring-up below minimum viable fraction")
        };

        if let Some(monitor) = progress.monitor.as_mut() {
            match monitor.await {
                Ok(samples) => debug!(samples, "Health loop finished"),
                Err(e) => warn!(error = %e, "Health loop task failed"),
            }
        }
        progress.monitor = None;
        self.record(stage, progress).await;

        if viable {
            RunStatus::Completed
        } else {
            RunStatus::BringUpFailed
        }
    }

    async fn record(&self, stage: StageOutcome, progress: &mut Progress) {
        info!(
            stage = %stage.name,
            status = ?stage.status,
            ready = stage.ready,
            attempted = stage.attempted,
            "Stage finished"
        );
        for failed in &stage.failed_nodes {
            warn!(stage = %stage.name, node = %failed.id, reason = %failed.reason, "Node failed");
        }
        self.state.stages.push(stage).await;
        progress.stage = None;
    }

    async fn settle(&self) {
        let settle = self.config.timing.settle();
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
    }

    /// Start a batch in index order, then wait for readiness in parallel
    async fn bring_up(&self, name: &'static str, batch: &[NodeHandle]) -> StageOutcome {
        info!(stage = name, nodes = batch.len(), "Bringing up nodes");
        let mut failed = Vec::new();
        let mut launched = Vec::new();

        for node in batch {
            let (id, role) = {
                let guard = node.read().await;
                (guard.id.clone(), guard.role)
            };
            let extra_args: &[String] = match role {
                NodeRole::Adversarial => &self.config.node.adversarial_args,
                _ => &[],
            };
            match self.supervisor.start(node, extra_args).await {
                Ok(()) => launched.push(node.clone()),
                Err(e) => {
                    warn!(node = %id, error = %e, "Node failed to launch");
                    failed.push(FailedNode::new(id, e.to_string()));
                }
            }
        }

        let timeout = self.config.timing.readiness_timeout();
        let jobs = launched.into_iter().map(|node| {
            let supervisor = self.supervisor.clone();
            async move {
                let ready = supervisor.wait_ready(&node, timeout).await;
                (node, ready)
            }
        });
        let mut ready = 0;
        let grace = self.config.timing.stop_grace();
        for (node, is_ready) in self.pool.run_all(jobs).await {
            if is_ready {
                ready += 1;
                continue;
            }
            let id = node.read().await.id.clone();
            warn!(node = %id, timeout_secs = timeout.as_secs(), "Node never became ready");
            self.supervisor.stop(&node, grace).await;
            failed.push(FailedNode::new(
                id,
                format!("not healthy within {}s", timeout.as_secs()),
            ));
        }

        StageOutcome::evaluate(
            name,
            batch.len(),
            ready,
            failed,
            self.config.topology.min_viable_fraction,
        )
    }

    /// Add nodes up to `target` total, bootstrapping from the same genesis
    async fn expand(&self, target: usize) -> StageOutcome {
        let existing = self.state.descriptors().await;
        let additional = target.saturating_sub(existing.len());
        let planner = TopologyPlanner::new(&self.config.topology.work_dir)
            .bootstrap_host(self.config.node.api_host.clone());
        let planned = match planner.extend(
            &existing,
            additional,
            &self.config.topology.adversarial,
            self.config.topology.port_bases(),
        ) {
            Ok(planned) => planned,
            Err(e) => {
                error!(error = %e, "Failed to plan expansion");
                return StageOutcome::evaluate(STAGE_EXPANSION, additional, 0, Vec::new(), 1.0)
                    .with_detail(e.to_string());
            }
        };
        let handles = self.state.add_nodes(planned).await;
        self.bring_up(STAGE_EXPANSION, &handles).await
    }

    fn health_monitor(&self) -> HealthMonitor {
        HealthMonitor::new(
            self.client.clone(),
            self.config.timing.health_timeout(),
            self.config.supervisor.max_concurrency,
        )
    }

    fn spawn_monitor(&self) -> JoinHandle<usize> {
        let monitor = self.health_monitor();
        let state = self.state.clone();
        let interval = self.config.timing.sample_interval();
        let duration = self.config.timing.observe();
        tokio::spawn(async move { monitor.run_loop(&state, interval, duration).await })
    }

    async fn attack(&self) -> StageOutcome {
        let running = self.state.running().await;
        let (actors, victims): (Vec<NodeDescriptor>, Vec<NodeDescriptor>) =
            running.into_iter().partition(|n| n.is_adversarial());
        if actors.is_empty() {
            warn!("No running adversarial nodes, nothing to attack with");
            return StageOutcome::skipped(STAGE_ATTACKS, "no running adversarial nodes");
        }

        let engine = AttackEngine::new(
            self.client.clone(),
            self.config.attacks.clone(),
            self.config.node.api_prefix.clone(),
        );
        info!(
            actors = actors.len(),
            victims = victims.len(),
            scenarios = engine.suite().len(),
            "Launching attacks"
        );
        let completed = engine.run(&actors, &victims, &self.state.events).await;
        StageOutcome::completed(
            STAGE_ATTACKS,
            format!("{} scenarios across {} actors", completed, actors.len()),
        )
    }

    async fn teardown(&self) {
        let nodes = self.state.nodes().await;
        info!(nodes = nodes.len(), "Tearing down");
        let reports = self
            .supervisor
            .stop_all(&nodes, self.config.timing.stop_grace())
            .await;

        let mut forced = 0;
        for report in &reports {
            if report.method == StopMethod::Forced {
                forced += 1;
            }
            if let Some(warning) = &report.warning {
                warn!(node = %report.node, "{}", warning);
            }
        }
        self.state
            .stages
            .push(StageOutcome::completed(
                STAGE_TEARDOWN,
                format!("{} nodes stopped, {} forced", reports.len(), forced),
            ))
            .await;
    }
}
