//! Error types for the runtime crate

use gauntlet_core::{CoreError, ReportError, TopologyError};

// ----------------------------------------------------------------------------
// Supervisor Errors
// ----------------------------------------------------------------------------

/// Failures starting a single node
///
/// Stopping never produces one of these: escalation problems are logged and
/// the node is still marked stopped.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("Node {node}: port {port} is already bound")]
    PortInUse { node: String, port: u16 },
    #[error("Node {node}: failed to launch process: {reason}")]
    LaunchFailed { node: String, reason: String },
    #[error("Node {node}: I/O error preparing launch: {source}")]
    Io {
        node: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Node {node}: container runtime error: {message}")]
    Container { node: String, message: String },
}

impl SupervisorError {
    pub fn node(&self) -> &str {
        match self {
            SupervisorError::PortInUse { node, .. }
            | SupervisorError::LaunchFailed { node, .. }
            | SupervisorError::Io { node, .. }
            | SupervisorError::Container { node, .. } => node,
        }
    }
}

// ----------------------------------------------------------------------------
// Harness Errors
// ----------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("HTTP client setup failed: {0}")]
    Client(#[from] reqwest::Error),
    #[error("Supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
