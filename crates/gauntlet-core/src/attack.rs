//! Attack event records
//!
//! One [`AttackEvent`] is produced per scenario invocation. Its
//! [`AttackOutcome`] tallies every individual request of the scenario, keeping
//! transport failures apart from deliberate rejections by the node.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

// ----------------------------------------------------------------------------
// Attack Types
// ----------------------------------------------------------------------------

/// Adversarial scenarios known to the attack engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttackType {
    Flood,
    MalformedInjection,
    UnauthorizedAccess,
    Replay,
    SybilAttempt,
    FalseInformation,
    ResourceExhaustion,
}

impl AttackType {
    /// Every scenario in catalog order
    pub const ALL: [AttackType; 7] = [
        AttackType::Flood,
        AttackType::MalformedInjection,
        AttackType::UnauthorizedAccess,
        AttackType::Replay,
        AttackType::SybilAttempt,
        AttackType::FalseInformation,
        AttackType::ResourceExhaustion,
    ];

    /// Scenarios each adversarial actor runs unless configured otherwise
    pub const DEFAULT_SUITE: [AttackType; 6] = [
        AttackType::Flood,
        AttackType::MalformedInjection,
        AttackType::Replay,
        AttackType::SybilAttempt,
        AttackType::FalseInformation,
        AttackType::ResourceExhaustion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttackType::Flood => "flood",
            AttackType::MalformedInjection => "malformed-injection",
            AttackType::UnauthorizedAccess => "unauthorized-access",
            AttackType::Replay => "replay",
            AttackType::SybilAttempt => "sybil-attempt",
            AttackType::FalseInformation => "false-information",
            AttackType::ResourceExhaustion => "resource-exhaustion",
        }
    }

    /// Parse a comma separated scenario list; `all` selects the whole catalog
    pub fn parse_list(input: &str) -> Result<Vec<AttackType>, CoreError> {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::ALL.to_vec());
        }
        if trimmed.eq_ignore_ascii_case("default") {
            return Ok(Self::DEFAULT_SUITE.to_vec());
        }
        let mut out = Vec::new();
        for part in trimmed.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let ty: AttackType = part.parse()?;
            if !out.contains(&ty) {
                out.push(ty);
            }
        }
        Ok(out)
    }
}

impl fmt::Display for AttackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttackType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "flood" | "spam" => Ok(AttackType::Flood),
            "malformed-injection" | "injection" | "protocol-abuse" => {
                Ok(AttackType::MalformedInjection)
            }
            "unauthorized-access" | "unauthorized" => Ok(AttackType::UnauthorizedAccess),
            "replay" => Ok(AttackType::Replay),
            "sybil-attempt" | "sybil" => Ok(AttackType::SybilAttempt),
            "false-information" | "false-info" => Ok(AttackType::FalseInformation),
            "resource-exhaustion" | "exhaustion" => Ok(AttackType::ResourceExhaustion),
            other => Err(CoreError::UnknownScenario(other.to_string())),
        }
    }
}

// ----------------------------------------------------------------------------
// Per-attempt Records
// ----------------------------------------------------------------------------

/// How the target handled one adversarial request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Accepted,
    Blocked,
    RateLimited,
    /// No response arrived, or a status the scenario does not treat as a defence
    Errored,
    /// The target answered with a 5xx; never counted as a defence
    ServerError,
}

/// One request issued inside a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub label: String,
    pub target: String,
    /// HTTP status, 0 when no response arrived
    pub status: u16,
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub timed_out: bool,
}

impl AttemptRecord {
    pub fn new(label: impl Into<String>, target: impl Into<String>, status: u16, verdict: Verdict) -> Self {
        Self {
            label: label.into(),
            target: target.into(),
            status,
            verdict,
            timed_out: false,
        }
    }

    pub fn timed_out(mut self) -> Self {
        self.timed_out = true;
        self
    }
}

// ----------------------------------------------------------------------------
// Attack Outcome
// ----------------------------------------------------------------------------

/// Tally of every attempt made by one scenario invocation
///
/// `accepted + blocked + rate_limited + errored + server_errors == attempted`
/// holds after any sequence of [`AttackOutcome::record`] calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackOutcome {
    pub attempted: u32,
    pub accepted: u32,
    pub blocked: u32,
    pub rate_limited: u32,
    pub errored: u32,
    #[serde(default)]
    pub server_errors: u32,
    /// Subset of `errored` caused by request timeouts
    pub timed_out: u32,
    pub details: Vec<AttemptRecord>,
}

impl AttackOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, attempt: AttemptRecord) {
        self.attempted += 1;
        match attempt.verdict {
            Verdict::Accepted => self.accepted += 1,
            Verdict::Blocked => self.blocked += 1,
            Verdict::RateLimited => self.rate_limited += 1,
            Verdict::Errored => {
                self.errored += 1;
                if attempt.timed_out {
                    self.timed_out += 1;
                }
            }
            Verdict::ServerError => self.server_errors += 1,
        }
        self.details.push(attempt);
    }

    /// Attempts that did not get through, transport failures included
    ///
    /// Server errors are left out: a crashing handler is not a defence.
    pub fn defended(&self) -> u32 {
        self.blocked + self.rate_limited + self.errored
    }

    pub fn block_rate(&self) -> Option<f64> {
        if self.attempted == 0 {
            None
        } else {
            Some(self.defended() as f64 / self.attempted as f64)
        }
    }

    /// Most frequent non-zero status; ties go to the lower code, 0 if none
    pub fn representative_status(&self) -> u16 {
        let mut counts: BTreeMap<u16, u32> = BTreeMap::new();
        for attempt in self.details.iter().filter(|a| a.status != 0) {
            *counts.entry(attempt.status).or_default() += 1;
        }
        let mut best = (0u16, 0u32);
        for (status, count) in counts {
            if count > best.1 {
                best = (status, count);
            }
        }
        best.0
    }

    pub fn is_consistent(&self) -> bool {
        self.accepted + self.blocked + self.rate_limited + self.errored + self.server_errors
            == self.attempted
            && self.timed_out <= self.errored
    }

    pub fn summary(&self) -> String {
        format!(
            "{} attempted: {} accepted, {} blocked, {} rate-limited, {} errored ({} timed out), {} server errors",
            self.attempted,
            self.accepted,
            self.blocked,
            self.rate_limited,
            self.errored,
            self.timed_out,
            self.server_errors
        )
    }
}

// ----------------------------------------------------------------------------
// Attack Event
// ----------------------------------------------------------------------------

/// Immutable record of one scenario invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackEvent {
    pub timestamp: DateTime<Utc>,
    pub source_node: String,
    pub target_nodes: Vec<String>,
    pub attack_type: AttackType,
    pub description: String,
    pub result: AttackOutcome,
    pub response_code: u16,
    pub duration_ms: u64,
}

impl AttackEvent {
    /// Seal an outcome into an event stamped with the current time
    pub fn new(
        source_node: impl Into<String>,
        target_nodes: Vec<String>,
        attack_type: AttackType,
        description: impl Into<String>,
        result: AttackOutcome,
        duration_ms: u64,
    ) -> Self {
        let response_code = result.representative_status();
        Self {
            timestamp: Utc::now(),
            source_node: source_node.into(),
            target_nodes,
            attack_type,
            description: description.into(),
            result,
            response_code,
            duration_ms,
        }
    }
}
