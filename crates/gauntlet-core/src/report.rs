//! Run report
//!
//! The [`Report`] is the terminal artifact of a run: stage outcomes, the full
//! attack event log, the scored security analysis and aggregate statistics
//! over the health samples. [`ReportGenerator`] builds it and persists it as
//! pretty-printed camelCase JSON.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::attack::{AttackEvent, AttackType};
use crate::errors::ReportError;
use crate::sample::NetworkSample;
use crate::scoring::{
    overall_score, recommendations, score_category, Category, CategoryScore, Rating,
    ScoringConfig,
};

// ----------------------------------------------------------------------------
// Stage Outcomes
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Success,
    Partial,
    Failed,
    Skipped,
    Interrupted,
}

impl StageStatus {
    /// Whether later stages may build on this one
    pub fn is_viable(&self) -> bool {
        matches!(self, StageStatus::Success | StageStatus::Partial)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedNode {
    pub id: String,
    pub reason: String,
}

impl FailedNode {
    pub fn new(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Result of one stage of the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageOutcome {
    pub name: String,
    pub status: StageStatus,
    pub attempted: usize,
    pub ready: usize,
    pub failed_nodes: Vec<FailedNode>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl StageOutcome {
    /// Classify a bring-up stage by the fraction of nodes that became ready
    pub fn evaluate(
        name: impl Into<String>,
        attempted: usize,
        ready: usize,
        failed_nodes: Vec<FailedNode>,
        min_viable_fraction: f64,
    ) -> Self {
        let status = if ready >= attempted {
            StageStatus::Success
        } else if ready as f64 >= attempted as f64 * min_viable_fraction {
            StageStatus::Partial
        } else {
            StageStatus::Failed
        };
        Self {
            name: name.into(),
            status,
            attempted,
            ready,
            failed_nodes,
            timestamp: Utc::now(),
            detail: None,
        }
    }

    pub fn completed(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::with_status(name, StageStatus::Success, detail)
    }

    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::with_status(name, StageStatus::Skipped, reason)
    }

    pub fn interrupted(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::with_status(name, StageStatus::Interrupted, detail)
    }

    fn with_status(name: impl Into<String>, status: StageStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            attempted: 0,
            ready: 0,
            failed_nodes: Vec::new(),
            timestamp: Utc::now(),
            detail: Some(detail.into()),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ----------------------------------------------------------------------------
// Analysis Sections
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityAnalysis {
    pub total_attacks: usize,
    pub total_attempts: u32,
    pub accepted: u32,
    pub defended: u32,
    /// Transport failures, already part of `defended`
    pub errored: u32,
    /// 5xx answers, not part of `defended`
    #[serde(default)]
    pub server_errors: u32,
    pub attacks_by_type: BTreeMap<AttackType, usize>,
    pub categories: Vec<CategoryScore>,
    /// Absent when no category had any relevant attempt
    pub overall_score: Option<f64>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

impl MetricStats {
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        (count > 0).then(|| Self {
            min,
            avg: sum / count as f64,
            max,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkHealth {
    pub average_healthy_nodes: f64,
    pub min_healthy_nodes: usize,
    pub average_neighbor_count: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceAnalysis {
    pub samples: usize,
    pub cpu: Option<MetricStats>,
    pub memory: Option<MetricStats>,
    pub network_health: Option<NetworkHealth>,
}

// ----------------------------------------------------------------------------
// Report
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub stages: Vec<StageOutcome>,
    pub attacks: Vec<AttackEvent>,
    pub security_analysis: SecurityAnalysis,
    pub performance_analysis: PerformanceAnalysis,
}

impl Report {
    pub fn file_name(&self) -> String {
        format!(
            "resilience_report_{}.json",
            self.end_time.format("%Y%m%d_%H%M%S")
        )
    }
}

/// Builds and persists reports with a fixed scoring configuration
#[derive(Debug, Clone, Default)]
pub struct ReportGenerator {
    scoring: ScoringConfig,
}

impl ReportGenerator {
    pub fn new(scoring: ScoringConfig) -> Self {
        Self { scoring }
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    pub fn security_analysis(&self, events: &[AttackEvent]) -> SecurityAnalysis {
        let mut attacks_by_type = BTreeMap::new();
        for event in events {
            *attacks_by_type.entry(event.attack_type).or_insert(0) += 1;
        }

        let categories: Vec<CategoryScore> = Category::ALL
            .iter()
            .filter_map(|c| score_category(events, *c, self.scoring.thresholds(*c)))
            .collect();
        let ratings: Vec<Rating> = categories.iter().map(|c| c.rating).collect();

        SecurityAnalysis {
            total_attacks: events.len(),
            total_attempts: events.iter().map(|e| e.result.attempted).sum(),
            accepted: events.iter().map(|e| e.result.accepted).sum(),
            defended: events.iter().map(|e| e.result.defended()).sum(),
            errored: events.iter().map(|e| e.result.errored).sum(),
            server_errors: events.iter().map(|e| e.result.server_errors).sum(),
            attacks_by_type,
            overall_score: overall_score(&ratings),
            recommendations: recommendations(&categories),
            categories,
        }
    }

    pub fn performance_analysis(&self, samples: &[NetworkSample]) -> PerformanceAnalysis {
        if samples.is_empty() {
            return PerformanceAnalysis::default();
        }
        let neighbor_avgs: Vec<f64> = samples.iter().filter_map(|s| s.average_neighbors()).collect();
        let network_health = NetworkHealth {
            average_healthy_nodes: samples.iter().map(|s| s.healthy_nodes as f64).sum::<f64>()
                / samples.len() as f64,
            min_healthy_nodes: samples.iter().map(|s| s.healthy_nodes).min().unwrap_or(0),
            average_neighbor_count: MetricStats::from_values(neighbor_avgs).map(|m| m.avg),
        };
        PerformanceAnalysis {
            samples: samples.len(),
            cpu: MetricStats::from_values(samples.iter().map(|s| s.cpu_percent)),
            memory: MetricStats::from_values(samples.iter().map(|s| s.memory_percent)),
            network_health: Some(network_health),
        }
    }

    pub fn generate(
        &self,
        start_time: DateTime<Utc>,
        stages: Vec<StageOutcome>,
        attacks: Vec<AttackEvent>,
        samples: &[NetworkSample],
    ) -> Report {
        Report {
            start_time,
            end_time: Utc::now(),
            security_analysis: self.security_analysis(&attacks),
            performance_analysis: self.performance_analysis(samples),
            stages,
            attacks,
        }
    }

    /// Write the report into `dir` and return the final path
    ///
    /// The JSON lands in a temporary sibling first and is renamed into place.
    /// An existing report with the same timestamp is never overwritten.
    pub fn write(&self, report: &Report, dir: &Path) -> Result<PathBuf, ReportError> {
        fs::create_dir_all(dir).map_err(|source| ReportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let file_name = report.file_name();
        let mut path = dir.join(&file_name);
        let mut suffix = 1;
        while path.exists() {
            let stem = file_name.trim_end_matches(".json");
            path = dir.join(format!("{}_{}.json", stem, suffix));
            suffix += 1;
        }

        let json = serde_json::to_vec_pretty(report)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| ReportError::Io {
            path: tmp.clone(),
            source,
        })?;
        if let Err(source) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(ReportError::Io { path, source });
        }

        info!(path = %path.display(), "Report written");
        Ok(path)
    }

    pub fn log_summary(&self, report: &Report) {
        let duration = report.end_time - report.start_time;
        info!("==================== Run summary ====================");
        info!("Duration: {}s", duration.num_seconds());
        for stage in &report.stages {
            match stage.status {
                StageStatus::Success | StageStatus::Skipped => info!(
                    "Stage {:<24} {:?} ({}/{} ready)",
                    stage.name, stage.status, stage.ready, stage.attempted
                ),
                _ => warn!(
                    "Stage {:<24} {:?} ({}/{} ready)",
                    stage.name, stage.status, stage.ready, stage.attempted
                ),
            }
            for failed in &stage.failed_nodes {
                warn!("  {} failed: {}", failed.id, failed.reason);
            }
        }

        let security = &report.security_analysis;
        info!(
            "Attacks: {} events, {} attempts, {} accepted, {} defended ({} transport errors), {} server errors",
            security.total_attacks,
            security.total_attempts,
            security.accepted,
            security.defended,
            security.errored,
            security.server_errors
        );
        for score in &security.categories {
            info!(
                "  {:<18} {:>5.1}% defended -> {:?}",
                score.category.as_str(),
                score.rate * 100.0,
                score.rating
            );
        }
        match security.overall_score {
            Some(score) => info!("Security score: {:.1}/100", score),
            None => info!("Security score: n/a (no scored categories)"),
        }
        for rec in &security.recommendations {
            info!("  - {}", rec);
        }

        let perf = &report.performance_analysis;
        info!("Health samples: {}", perf.samples);
        if let (Some(cpu), Some(mem)) = (perf.cpu, perf.memory) {
            info!(
                "  CPU avg {:.1}% max {:.1}%, memory avg {:.1}% max {:.1}%",
                cpu.avg, cpu.max, mem.avg, mem.max
            );
        }
        if let Some(health) = &perf.network_health {
            info!(
                "  Healthy nodes avg {:.1}, min {}",
                health.average_healthy_nodes, health.min_healthy_nodes
            );
        }
    }
}
