//! Report generation and persistence

use std::collections::BTreeMap;

use chrono::Utc;
use gauntlet_core::{
    AttackEvent, AttackOutcome, AttackType, AttemptRecord, FailedNode, NetworkSample, Rating,
    ReportGenerator, ScoringConfig, StageOutcome, StageStatus, Verdict,
};

fn event(attack_type: AttackType, verdicts: &[(u16, Verdict)]) -> AttackEvent {
    let mut outcome = AttackOutcome::new();
    for (i, (status, verdict)) in verdicts.iter().enumerate() {
        outcome.record(AttemptRecord::new(format!("attempt-{}", i), "node00", *status, *verdict));
    }
    AttackEvent::new("node03", vec!["node00".into()], attack_type, "test event", outcome, 5)
}

fn sample(healthy: usize, cpu: f64) -> NetworkSample {
    NetworkSample {
        timestamp: Utc::now(),
        total_nodes: 3,
        healthy_nodes: healthy,
        neighbor_counts: BTreeMap::from([
            ("node00".to_string(), 2),
            ("node01".to_string(), if healthy > 1 { 2 } else { -1 }),
        ]),
        cpu_percent: cpu,
        memory_percent: 40.0,
    }
}

#[test]
fn test_report_round_trips_through_disk() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let generator = ReportGenerator::new(ScoringConfig::default());
    let stages = vec![
        StageOutcome::evaluate("genesis", 1, 1, vec![], 0.8),
        StageOutcome::evaluate(
            "normal-nodes",
            2,
            1,
            vec![FailedNode::new("node02", "readiness timeout")],
            0.8,
        ),
    ];
    let attacks = vec![
        event(AttackType::Flood, &[(200, Verdict::Accepted), (429, Verdict::RateLimited)]),
        event(AttackType::Replay, &[(409, Verdict::Blocked), (409, Verdict::Blocked)]),
    ];
    let samples = vec![sample(3, 10.0), sample(1, 30.0)];

    let report = generator.generate(Utc::now(), stages, attacks, &samples);
    let path = generator.write(&report, dir.path()).expect("Failed to write report");

    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("resilience_report_"));
    assert!(name.ends_with(".json"));

    let raw = std::fs::read_to_string(&path).expect("Failed to read report");
    let json: serde_json::Value = serde_json::from_str(&raw).expect("Report is not JSON");
    assert!(json.get("startTime").is_some());
    assert_eq!(json["stages"][1]["status"], "failed");
    assert_eq!(json["attacks"].as_array().unwrap().len(), 2);
    assert_eq!(json["securityAnalysis"]["attacksByType"]["flood"], 1);
    assert_eq!(json["performanceAnalysis"]["samples"], 2);
    assert_eq!(json["performanceAnalysis"]["cpu"]["avg"], 20.0);
    assert_eq!(
        json["performanceAnalysis"]["networkHealth"]["minHealthyNodes"],
        1
    );

    let security = &report.security_analysis;
    assert_eq!(security.categories.len(), 2);
    assert!(security.categories.iter().all(|c| c.rating == Rating::Good));
    assert_eq!(security.overall_score, Some(100.0));
}

#[test]
fn test_report_without_samples_or_attacks() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let generator = ReportGenerator::default();
    let report = generator.generate(
        Utc::now(),
        vec![StageOutcome::interrupted("attacks", "operator interrupt")],
        vec![],
        &[],
    );
    let path = generator.write(&report, dir.path()).expect("Failed to write report");

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(json["securityAnalysis"]["overallScore"].is_null());
    assert_eq!(json["performanceAnalysis"]["samples"], 0);
    assert_eq!(json["stages"][0]["status"], "interrupted");
    assert_eq!(report.stages[0].status, StageStatus::Interrupted);
}

#[test]
fn test_write_never_overwrites_existing_report() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let generator = ReportGenerator::default();
    let report = generator.generate(Utc::now(), vec![], vec![], &[]);

    let first = generator.write(&report, dir.path()).expect("first write");
    let second = generator.write(&report, dir.path()).expect("second write");
    assert_ne!(first, second);
    assert!(second.to_string_lossy().ends_with("_1.json"));

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_write_creates_missing_directory() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let nested = dir.path().join("reports").join("today");
    let generator = ReportGenerator::default();
    let report = generator.generate(Utc::now(), vec![], vec![], &[]);
    let path = generator.write(&report, &nested).expect("Failed to write report");
    assert!(path.starts_with(&nested));
}
