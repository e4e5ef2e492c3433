//! Error types for the Gauntlet core crate

use std::path::PathBuf;

use crate::topology::PortClass;

// ----------------------------------------------------------------------------
// Topology Errors
// ----------------------------------------------------------------------------

/// Errors raised while planning a topology
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("Topology needs at least one node")]
    Empty,
    #[error("Adversarial index {index} refers to the genesis node")]
    GenesisAdversarial { index: usize },
    #[error("Adversarial index {index} is out of range for {node_count} nodes")]
    IndexOutOfRange { index: usize, node_count: usize },
    #[error("No free {class} port left at or above {base}")]
    PortsExhausted { class: PortClass, base: u16 },
    #[error("Existing topology has no genesis node to bootstrap from")]
    MissingGenesis,
}

// ----------------------------------------------------------------------------
// Report Errors
// ----------------------------------------------------------------------------

/// Errors raised while persisting a report
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Report I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Report serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ----------------------------------------------------------------------------
// Core Error
// ----------------------------------------------------------------------------

/// Unified error for everything the core crate can reject
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
    #[error("Unknown attack scenario: {0}")]
    UnknownScenario(String),
    #[error("Invalid thresholds for {category}: good={good}, fair={fair}")]
    InvalidThresholds {
        category: String,
        good: f64,
        fair: f64,
    },
}
