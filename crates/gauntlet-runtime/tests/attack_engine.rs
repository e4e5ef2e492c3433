//! Scenario behaviour against a mock node API

mod common;

use common::{closed_port, descriptor, spawn_mock, MockBehavior};
use gauntlet_runtime::attacks::scenarios;
use gauntlet_core::{Category, Rating, ReportGenerator, Verdict};
use gauntlet_runtime::{
    AppendLog, AttackConfig, AttackEngine, AttackEvent, AttackType, NodeClient, NodeConfig,
    NodeRole, WorkerPool,
};

fn client() -> NodeClient {
    NodeClient::new(&NodeConfig {
        request_timeout_ms: 1000,
        ..NodeConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_flood_counts_sum_to_requests() {
    let (node, _server) = spawn_mock(3, MockBehavior {
        rate_limit_after: Some(12),
        ..MockBehavior::default()
    })
    .await;
    let client = client();
    let actor = client.target(&node);

    let outcome = scenarios::flood(&client, &WorkerPool::new(4), &actor, 20, "t1").await;
    assert_eq!(outcome.attempted, 20);
    assert_eq!(outcome.accepted, 12);
    assert_eq!(outcome.rate_limited, 8);
    assert!(outcome.is_consistent());
    assert_eq!(outcome.representative_status(), 200);
}

#[tokio::test]
async fn test_replay_counts_only_resubmissions() {
    let (node, _server) = spawn_mock(3, MockBehavior::default()).await;
    let client = client();
    let actor = client.target(&node);

    let outcome = scenarios::replay(&client, &actor, 10, "nonce-1").await;
    assert_eq!(outcome.attempted, 10);
    assert_eq!(outcome.blocked, 10);
    assert_eq!(outcome.representative_status(), 409);
}

#[tokio::test]
async fn test_unauthorized_access_is_blocked() {
    let (node, _server) = spawn_mock(1, MockBehavior::default()).await;
    let client = client();
    let victims = vec![client.target(&node)];

    let outcome = scenarios::unauthorized_access(&client, &victims, "/api/v1").await;
    assert_eq!(outcome.attempted, 16);
    assert_eq!(outcome.blocked, 16);
    assert_eq!(outcome.accepted, 0);
    assert!(outcome.details.iter().any(|d| d.status == 401));
    assert!(outcome.details.iter().any(|d| d.status == 403));
}

#[tokio::test]
async fn test_injection_battery_against_unreachable_node() {
    let client = client();
    let victim = client.target(&descriptor(1, NodeRole::Normal, closed_port(), closed_port()));

    let outcome = scenarios::malformed_injection(&client, &victim).await;
    assert_eq!(outcome.attempted, 24);
    assert_eq!(outcome.errored, 24);
    assert_eq!(outcome.representative_status(), 0);
    assert!(outcome.is_consistent());
}

#[tokio::test]
async fn test_injection_server_errors_are_not_defended() {
    let (node, _server) = spawn_mock(1, MockBehavior {
        server_errors: true,
        ..MockBehavior::default()
    })
    .await;
    let client = client();
    let victim = client.target(&node);

    let outcome = scenarios::malformed_injection(&client, &victim).await;
    assert_eq!(outcome.attempted, 24);
    assert_eq!(outcome.server_errors, 24);
    assert_eq!(outcome.errored, 0);
    assert_eq!(outcome.defended(), 0);
    assert_eq!(outcome.representative_status(), 500);
    assert!(outcome.is_consistent());

    let event = AttackEvent::new("node03", vec![victim.id.clone()], AttackType::MalformedInjection, "injection", outcome, 1);
    let analysis = ReportGenerator::default().security_analysis(&[event]);
    let score = analysis
        .categories
        .iter()
        .find(|c| c.category == Category::InputValidation)
        .unwrap();
    assert_eq!(score.rate, 0.0);
    assert_eq!(score.rating, Rating::Poor);
    assert_eq!(analysis.server_errors, 24);
}

#[tokio::test]
async fn test_false_information_broadcasts_and_messages() {
    let (actor, _a) = spawn_mock(3, MockBehavior::default()).await;
    let client = client();
    let actor = client.target(&actor);
    let recipient = client.target(&descriptor(0, NodeRole::Genesis, closed_port(), closed_port()));

    let outcome = scenarios::false_information(&client, &actor, &recipient).await;
    assert_eq!(outcome.attempted, 8);
    // the mock rejects bracketed bulletins but relays direct messages
    assert_eq!(outcome.blocked, 4);
    assert_eq!(outcome.accepted, 4);
    assert!(outcome
        .details
        .iter()
        .any(|d| d.label.starts_with("direct-") && d.verdict == Verdict::Accepted));
}

#[tokio::test]
async fn test_engine_runs_suite_for_each_actor() {
    let (first, _a) = spawn_mock(3, MockBehavior::default()).await;
    let (second, _b) = spawn_mock(4, MockBehavior::default()).await;
    let (victim, _c) = spawn_mock(0, MockBehavior::default()).await;

    let config = AttackConfig {
        scenarios: AttackType::ALL.to_vec(),
        pause_ms: 0,
        exhaustion_connections: 4,
        exhaustion_hold_ms: 50,
        ..AttackConfig::default()
    };
    let engine = AttackEngine::new(client(), config, "/api/v1");
    let log = AppendLog::new();

    let completed = engine.run(&[first, second], &[victim], &log).await;
    assert_eq!(completed, 14);

    let events = log.snapshot().await;
    assert_eq!(events.len(), 14);
    for attack_type in AttackType::ALL {
        assert_eq!(events.iter().filter(|e| e.attack_type == attack_type).count(), 2);
    }
    for event in &events {
        assert!(event.result.is_consistent(), "{} inconsistent", event.attack_type);
        assert!(event.result.attempted > 0);
    }
    let injection = events
        .iter()
        .find(|e| e.attack_type == AttackType::MalformedInjection)
        .unwrap();
    assert_eq!(injection.target_nodes, vec!["node00".to_string()]);
}
