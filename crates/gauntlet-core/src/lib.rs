//! Gauntlet Core
//!
//! Pure data model and logic for the Gauntlet peer-to-peer resilience harness:
//! node descriptors and the topology planner that allocates them, attack event
//! records, network health samples, per-category defence scoring and the
//! persisted run report.
//!
//! Nothing in this crate talks to the network or spawns processes; that is the
//! job of `gauntlet-runtime`, which drives these types against live nodes.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod attack;
pub mod errors;
pub mod report;
pub mod sample;
pub mod scoring;
pub mod topology;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use attack::{AttackEvent, AttackOutcome, AttackType, AttemptRecord, Verdict};
pub use errors::{CoreError, ReportError, TopologyError};
pub use report::{
    FailedNode, MetricStats, NetworkHealth, PerformanceAnalysis, Report, ReportGenerator,
    SecurityAnalysis, StageOutcome, StageStatus,
};
pub use sample::NetworkSample;
pub use scoring::{
    overall_score, recommendations, score_category, Category, CategoryScore, Rating,
    ScoringConfig, Thresholds,
};
pub use topology::{HostPortProbe, PortClass, PortProbe, TopologyPlanner};
pub use types::{NodeDescriptor, NodeRole, NodeStatus, PortBases};

/// Result type used throughout the core crate
pub type Result<T> = std::result::Result<T, CoreError>;
