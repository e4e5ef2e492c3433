//! Scenario implementations
//!
//! Each function issues its requests and tallies them into an
//! [`AttackOutcome`]. Classification is explicit per scenario: what counts as
//! a defence depends on what the scenario probes.

use std::time::Duration;

use gauntlet_core::{AttackOutcome, AttemptRecord, Verdict};
use reqwest::Method;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use super::payloads::{
    injection_battery, InjectionEndpoint, Payload, FALSE_ANNOUNCEMENTS, FORGED_CREDENTIALS,
    INJECTION_ENDPOINTS, PROTECTED_ADMIN_ROUTES, PROTECTED_API_ROUTES,
};
use crate::client::{CallOutcome, NodeClient, NodeTarget};
use crate::pool::WorkerPool;

// ----------------------------------------------------------------------------
// Classification
// ----------------------------------------------------------------------------

/// Flood responses: anything but success, 429 or a 5xx is an error
pub fn classify_flood(outcome: &CallOutcome) -> Verdict {
    match outcome.status_code {
        200..=299 => Verdict::Accepted,
        429 => Verdict::RateLimited,
        500..=599 => Verdict::ServerError,
        _ => Verdict::Errored,
    }
}

/// Responses where a 4xx is a deliberate rejection
pub fn classify_rejection(outcome: &CallOutcome) -> Verdict {
    match outcome.status_code {
        200..=299 => Verdict::Accepted,
        429 => Verdict::RateLimited,
        400..=499 => Verdict::Blocked,
        500..=599 => Verdict::ServerError,
        _ => Verdict::Errored,
    }
}

fn attempt(label: String, target: &str, outcome: &CallOutcome, verdict: Verdict) -> AttemptRecord {
    let record = AttemptRecord::new(label, target, outcome.status_code, verdict);
    if outcome.is_timeout() {
        record.timed_out()
    } else {
        record
    }
}

// ----------------------------------------------------------------------------
// Scenarios
// ----------------------------------------------------------------------------

/// Burst of bulletin publishes through the worker pool
pub async fn flood(
    client: &NodeClient,
    pool: &WorkerPool,
    actor: &NodeTarget,
    requests: u32,
    tag: &str,
) -> AttackOutcome {
    let jobs = (0..requests).map(|i| {
        let client = client.clone();
        let target = actor.clone();
        let content = format!("SPAM_{}_{}_{}", tag, i, "X".repeat(100));
        async move {
            let outcome = client.bulletin_publish(&target, "spam", &content).await;
            (i, outcome)
        }
    });

    let mut result = AttackOutcome::new();
    for (i, outcome) in pool.run_all(jobs).await {
        let verdict = classify_flood(&outcome);
        result.record(attempt(format!("publish-{}", i), &actor.id, &outcome, verdict));
    }
    result
}

/// Every injection payload against every probed endpoint of one node
pub async fn malformed_injection(client: &NodeClient, victim: &NodeTarget) -> AttackOutcome {
    let mut result = AttackOutcome::new();
    for (name, payload) in injection_battery() {
        for endpoint in INJECTION_ENDPOINTS {
            let (route, outcome) = match (endpoint, &payload) {
                (InjectionEndpoint::Post(route), Payload::Json(body)) => {
                    (route, client.post_json(victim, route, body).await)
                }
                (InjectionEndpoint::Post(route), Payload::Raw(raw)) => {
                    (route, client.post_raw(victim, route, raw.clone()).await)
                }
                (InjectionEndpoint::Query(route), payload) => {
                    let value = payload.as_query_value();
                    (route, client.get_query(victim, route, &[("q", value.as_str())]).await)
                }
            };
            let verdict = classify_rejection(&outcome);
            debug!(node = %victim.id, payload = name, route, status = outcome.status_code, "Injection probe");
            result.record(attempt(format!("{}@{}", name, route), &victim.id, &outcome, verdict));
        }
    }
    result
}

/// Privileged routes with no credential and with forged ones
pub async fn unauthorized_access(
    client: &NodeClient,
    victims: &[NodeTarget],
    api_prefix: &str,
) -> AttackOutcome {
    let mut result = AttackOutcome::new();
    for victim in victims {
        let urls = PROTECTED_API_ROUTES
            .iter()
            .map(|route| format!("{}{}{}", victim.http_url, api_prefix, route))
            .chain(
                PROTECTED_ADMIN_ROUTES
                    .iter()
                    .map(|route| format!("{}{}{}", victim.admin_url, api_prefix, route)),
            );
        for url in urls {
            for token in FORGED_CREDENTIALS {
                let outcome = client.privileged(Method::GET, &url, token).await;
                let verdict = classify_rejection(&outcome);
                let label = format!(
                    "{} ({})",
                    url,
                    if token.is_some() { "forged token" } else { "no token" }
                );
                result.record(attempt(label, &victim.id, &outcome, verdict));
            }
        }
    }
    result
}

/// One original bulletin, then `count` identical resubmissions
///
/// Only the resubmissions are tallied.
pub async fn replay(client: &NodeClient, actor: &NodeTarget, count: u32, nonce: &str) -> AttackOutcome {
    let body = json!({
        "topic": "replay",
        "content": format!("REPLAY_TEST_{}", nonce),
        "type": "announcement",
        "message_id": nonce,
    });
    let original = client.post_json(actor, "/bulletin/publish", &body).await;
    debug!(node = %actor.id, status = original.status_code, "Replay original sent");

    let mut result = AttackOutcome::new();
    for i in 0..count {
        let outcome = client.post_json(actor, "/bulletin/publish", &body).await;
        let verdict = classify_rejection(&outcome);
        result.record(attempt(format!("resubmission-{}", i + 1), &actor.id, &outcome, verdict));
    }
    result
}

/// Bulletins claiming fabricated sender identities
pub async fn sybil_attempt(client: &NodeClient, actor: &NodeTarget, identities: u32) -> AttackOutcome {
    let mut result = AttackOutcome::new();
    for i in 0..identities {
        let fake_id = format!("fake_node_{}", i);
        let body = json!({
            "topic": "sybil",
            "content": format!("Message from {}", fake_id),
            "type": "announcement",
            "sender_id": fake_id,
            "fake_identity": true,
        });
        let outcome = client.post_json(actor, "/bulletin/publish", &body).await;
        let verdict = classify_rejection(&outcome);
        result.record(attempt(fake_id, &actor.id, &outcome, verdict));
    }
    result
}

/// Crafted misleading announcements, broadcast and sent directly to `recipient`
///
/// Both go through the actor's own API; the direct copy is addressed to the
/// recipient's node id.
pub async fn false_information(
    client: &NodeClient,
    actor: &NodeTarget,
    recipient: &NodeTarget,
) -> AttackOutcome {
    let mut result = AttackOutcome::new();
    for (i, message) in FALSE_ANNOUNCEMENTS.iter().enumerate() {
        let outcome = client.bulletin_publish(actor, "announcement", message).await;
        let verdict = classify_rejection(&outcome);
        result.record(attempt(format!("announcement-{}", i + 1), &actor.id, &outcome, verdict));

        let outcome = client.message_send(actor, &recipient.id, message).await;
        let verdict = classify_rejection(&outcome);
        result.record(attempt(format!("direct-{}", i + 1), &recipient.id, &outcome, verdict));
    }
    result
}

/// Held connections, each stuck mid-request, spread round-robin over victims
///
/// A connection still open after `hold` counts as accepted; one the server
/// closes or answers early counts as blocked.
pub async fn resource_exhaustion(
    pool: &WorkerPool,
    host: &str,
    victims: &[NodeTarget],
    connections: u32,
    hold: Duration,
    connect_timeout: Duration,
) -> AttackOutcome {
    let mut result = AttackOutcome::new();
    if victims.is_empty() {
        return result;
    }

    let jobs = (0..connections).map(|i| {
        let victim = victims[i as usize % victims.len()].clone();
        let host = host.to_string();
        async move { hold_connection(&host, &victim, hold, connect_timeout, i).await }
    });
    for record in pool.run_all(jobs).await {
        result.record(record);
    }
    result
}

async fn hold_connection(
    host: &str,
    victim: &NodeTarget,
    hold: Duration,
    connect_timeout: Duration,
    index: u32,
) -> AttemptRecord {
    let label = format!("connection-{}", index);
    let addr = format!("{}:{}", host, victim.http_port);

    let mut stream = match tokio::time::timeout(connect_timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            debug!(node = %victim.id, error = %e, "Exhaustion connect failed");
            return AttemptRecord::new(label, &victim.id, 0, Verdict::Errored);
        }
        Err(_) => return AttemptRecord::new(label, &victim.id, 0, Verdict::Errored).timed_out(),
    };

    // Headers are never terminated so the server has to keep waiting
    let partial = format!(
        "GET /health HTTP/1.1\r\nHost: {}\r\nUser-Agent: gauntlet\r\nX-Padding: ",
        addr
    );
    if stream.write_all(partial.as_bytes()).await.is_err() {
        return AttemptRecord::new(label, &victim.id, 0, Verdict::Blocked);
    }

    let mut buf = [0u8; 256];
    match tokio::time::timeout(hold, stream.read(&mut buf)).await {
        Err(_) => AttemptRecord::new(label, &victim.id, 0, Verdict::Accepted),
        Ok(Ok(0)) | Ok(Err(_)) => AttemptRecord::new(label, &victim.id, 0, Verdict::Blocked),
        Ok(Ok(n)) => {
            let status = parse_status_line(&buf[..n]);
            AttemptRecord::new(label, &victim.id, status, Verdict::Blocked)
        }
    }
}

fn parse_status_line(bytes: &[u8]) -> u16 {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|text| text.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .unwrap_or(0)
}
