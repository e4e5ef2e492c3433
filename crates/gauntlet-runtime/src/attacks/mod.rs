//! Attack engine
//!
//! Runs the configured scenario suite for each adversarial actor. Actors run
//! concurrently, each working through its suite in order; every finished
//! scenario is appended to the event log as soon as it completes.

use std::time::Instant;

use futures::future::join_all;
use gauntlet_core::{AttackEvent, AttackOutcome, AttackType, NodeDescriptor};
use tracing::{info, warn};

use crate::client::{NodeClient, NodeTarget};
use crate::config::AttackConfig;
use crate::pool::WorkerPool;
use crate::state::AppendLog;

pub mod payloads;
pub mod scenarios;

pub struct AttackEngine {
    client: NodeClient,
    config: AttackConfig,
    pool: WorkerPool,
    api_prefix: String,
}

impl AttackEngine {
    pub fn new(client: NodeClient, config: AttackConfig, api_prefix: impl Into<String>) -> Self {
        let pool = WorkerPool::new(config.pool_size);
        Self {
            client,
            config,
            pool,
            api_prefix: api_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn suite(&self) -> &[AttackType] {
        &self.config.scenarios
    }

    /// Run one scenario from `actor` and seal the result into an event
    pub async fn run_scenario(
        &self,
        attack_type: AttackType,
        actor: &NodeTarget,
        victims: &[NodeTarget],
    ) -> AttackEvent {
        let started = Instant::now();
        let first_victim = victims.first().unwrap_or(actor);
        let (outcome, targets, description): (AttackOutcome, Vec<&NodeTarget>, String) =
            match attack_type {
                AttackType::Flood => (
                    scenarios::flood(
                        &self.client,
                        &self.pool,
                        actor,
                        self.config.flood_requests,
                        &uuid::Uuid::new_v4().simple().to_string(),
                    )
                    .await,
                    vec![actor],
                    format!(
                        "Burst of {} bulletin publishes ({} workers)",
                        self.config.flood_requests,
                        self.pool.size()
                    ),
                ),
                AttackType::MalformedInjection => (
                    scenarios::malformed_injection(&self.client, first_victim).await,
                    vec![first_victim],
                    "Oversized, malformed and injection-style inputs against message, neighbor, bulletin and info endpoints".to_string(),
                ),
                AttackType::UnauthorizedAccess => (
                    scenarios::unauthorized_access(&self.client, victims, &self.api_prefix).await,
                    victims.iter().collect(),
                    "Privileged endpoints without credentials and with forged tokens".to_string(),
                ),
                AttackType::Replay => (
                    scenarios::replay(
                        &self.client,
                        actor,
                        self.config.replay_count,
                        &uuid::Uuid::new_v4().to_string(),
                    )
                    .await,
                    vec![actor],
                    format!("One bulletin resubmitted {} times", self.config.replay_count),
                ),
                AttackType::SybilAttempt => (
                    scenarios::sybil_attempt(&self.client, actor, self.config.sybil_identities)
                        .await,
                    vec![actor],
                    format!(
                        "Bulletins under {} fabricated sender identities",
                        self.config.sybil_identities
                    ),
                ),
                AttackType::FalseInformation => {
                    let mut targets = vec![actor];
                    if first_victim.id != actor.id {
                        targets.push(first_victim);
                    }
                    (
                        scenarios::false_information(&self.client, actor, first_victim).await,
                        targets,
                        format!(
                            "Misleading system announcements, broadcast and messaged to {}",
                            first_victim.id
                        ),
                    )
                }
                AttackType::ResourceExhaustion => (
                    scenarios::resource_exhaustion(
                        &self.pool,
                        self.client.host(),
                        victims,
                        self.config.exhaustion_connections,
                        self.config.exhaustion_hold(),
                        self.client.default_timeout(),
                    )
                    .await,
                    victims.iter().collect(),
                    format!(
                        "{} half-open requests held for {}ms",
                        self.config.exhaustion_connections, self.config.exhaustion_hold_ms
                    ),
                ),
            };

        if !outcome.is_consistent() {
            warn!(attack = %attack_type, "Attack outcome counts do not add up");
        }
        info!(
            actor = %actor.id,
            attack = %attack_type,
            "{}",
            outcome.summary()
        );
        AttackEvent::new(
            actor.id.clone(),
            targets.into_iter().map(|t| t.id.clone()).collect(),
            attack_type,
            description,
            outcome,
            started.elapsed().as_millis() as u64,
        )
    }

    /// Run the whole suite for one actor, appending each event as it finishes
    pub async fn run_actor(
        &self,
        actor: &NodeTarget,
        victims: &[NodeTarget],
        log: &AppendLog<AttackEvent>,
    ) -> usize {
        info!(actor = %actor.id, scenarios = self.config.scenarios.len(), "Actor starting attacks");
        let mut completed = 0;
        for (i, attack_type) in self.config.scenarios.iter().enumerate() {
            if i > 0 && !self.config.pause().is_zero() {
                tokio::time::sleep(self.config.pause()).await;
            }
            let event = self.run_scenario(*attack_type, actor, victims).await;
            log.push(event).await;
            completed += 1;
        }
        completed
    }

    /// Run every actor concurrently against the victims
    ///
    /// Victims default to the actor itself when none are given.
    pub async fn run(
        &self,
        actors: &[NodeDescriptor],
        victims: &[NodeDescriptor],
        log: &AppendLog<AttackEvent>,
    ) -> usize {
        let victim_targets: Vec<NodeTarget> = victims.iter().map(|v| self.client.target(v)).collect();
        let runs = actors.iter().map(|actor| {
            let actor = self.client.target(actor);
            let victims = if victim_targets.is_empty() {
                vec![actor.clone()]
            } else {
                victim_targets.clone()
            };
            async move { self.run_actor(&actor, &victims, log).await }
        });
        join_all(runs).await.into_iter().sum()
    }
}
