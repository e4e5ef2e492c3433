//! Gauntlet Runtime Engine
//!
//! The async half of the harness, built on tokio:
//! - `Orchestrator`: drives the staged run from bring-up to report
//! - `ProcessSupervisor`: node lifecycle, as local processes or containers
//! - `HealthMonitor`: periodic network and host sampling
//! - `AttackEngine`: the adversarial scenario catalog
//! - `NodeClient`: HTTP access to node APIs
//!
//! `gauntlet-core` holds the data model and scoring these components feed.

pub mod attacks;
pub mod client;
pub mod config;
pub mod error;
pub mod monitor;
pub mod orchestrator;
pub mod pool;
pub mod state;
pub mod supervisor;

pub use attacks::AttackEngine;
pub use client::{CallError, CallOutcome, NodeClient, NodeTarget, API_TOKEN_HEADER};
pub use config::{
    AttackConfig, GauntletConfig, NodeConfig, OutputConfig, SupervisorConfig, SupervisorKind,
    TimingConfig, TopologyConfig,
};
pub use error::{HarnessError, Result, SupervisorError};
pub use monitor::{HealthMonitor, HostSampler, NodeDetails};
pub use orchestrator::{build_supervisor, plan_topology, Orchestrator, RunOutcome, RunStatus};
pub use pool::WorkerPool;
pub use state::{node_handle, AppendLog, NodeHandle, RunState};
pub use supervisor::{
    ContainerSupervisor, LocalProcessSupervisor, ProcessSupervisor, StopMethod, StopReport,
};

// Re-export core types for convenience
pub use gauntlet_core::{
    AttackEvent, AttackOutcome, AttackType, NetworkSample, NodeDescriptor, NodeRole, NodeStatus,
    Report, StageOutcome, StageStatus,
};
