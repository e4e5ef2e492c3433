//! Defence scoring
//!
//! Attack events are grouped into defence categories. Each category gets a
//! block rate over every relevant attempt and a three-tier rating from its own
//! thresholds; ratings fold into a 0-100 security score.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attack::{AttackEvent, AttackType};
use crate::errors::CoreError;

// ----------------------------------------------------------------------------
// Categories and Ratings
// ----------------------------------------------------------------------------

/// Defence category scored in the security analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    RateLimiting,
    InputValidation,
    AccessControl,
    ReplayProtection,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::RateLimiting,
        Category::InputValidation,
        Category::AccessControl,
        Category::ReplayProtection,
    ];

    /// Attack types whose attempts count toward this category
    pub fn attack_types(&self) -> &'static [AttackType] {
        match self {
            Category::RateLimiting => &[AttackType::Flood, AttackType::ResourceExhaustion],
            Category::InputValidation => &[AttackType::MalformedInjection],
            Category::AccessControl => &[AttackType::UnauthorizedAccess],
            Category::ReplayProtection => &[AttackType::Replay],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::RateLimiting => "rate-limiting",
            Category::InputValidation => "input-validation",
            Category::AccessControl => "access-control",
            Category::ReplayProtection => "replay-protection",
        }
    }

    /// Remediation suggested when the category rates poor
    pub fn remediation(&self) -> &'static str {
        match self {
            Category::RateLimiting => {
                "Add per-peer request rate limiting and connection caps to resist flooding"
            }
            Category::InputValidation => {
                "Strengthen input validation and sanitize request bodies before processing"
            }
            Category::AccessControl => {
                "Require authentication on privileged endpoints and reject forged tokens"
            }
            Category::ReplayProtection => {
                "Reject duplicate messages with nonces or message-id deduplication"
            }
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Good,
    Fair,
    Poor,
}

impl Rating {
    pub fn weight(&self) -> f64 {
        match self {
            Rating::Good => 100.0,
            Rating::Fair => 60.0,
            Rating::Poor => 20.0,
        }
    }
}

// ----------------------------------------------------------------------------
// Thresholds
// ----------------------------------------------------------------------------

/// Minimum block rates for the good and fair tiers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub good: f64,
    pub fair: f64,
}

impl Thresholds {
    pub const fn new(good: f64, fair: f64) -> Self {
        Self { good, fair }
    }

    pub fn rate(&self, rate: f64) -> Rating {
        if rate >= self.good {
            Rating::Good
        } else if rate >= self.fair {
            Rating::Fair
        } else {
            Rating::Poor
        }
    }

    fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.good)
            && (0.0..=1.0).contains(&self.fair)
            && self.fair <= self.good
    }
}

/// Per-category thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub rate_limiting: Thresholds,
    pub input_validation: Thresholds,
    pub access_control: Thresholds,
    pub replay_protection: Thresholds,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            rate_limiting: Thresholds::new(0.5, 0.2),
            input_validation: Thresholds::new(0.8, 0.5),
            access_control: Thresholds::new(0.9, 0.7),
            replay_protection: Thresholds::new(0.8, 0.5),
        }
    }
}

impl ScoringConfig {
    pub fn thresholds(&self, category: Category) -> Thresholds {
        match category {
            Category::RateLimiting => self.rate_limiting,
            Category::InputValidation => self.input_validation,
            Category::AccessControl => self.access_control,
            Category::ReplayProtection => self.replay_protection,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        for category in Category::ALL {
            let t = self.thresholds(category);
            if !t.is_valid() {
                return Err(CoreError::InvalidThresholds {
                    category: category.to_string(),
                    good: t.good,
                    fair: t.fair,
                });
            }
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Scoring
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub category: Category,
    pub events: usize,
    pub attempts: u32,
    pub defended: u32,
    pub rate: f64,
    pub rating: Rating,
}

/// Score one category; `None` when no relevant attempt was made
pub fn score_category(
    events: &[AttackEvent],
    category: Category,
    thresholds: Thresholds,
) -> Option<CategoryScore> {
    let relevant: Vec<&AttackEvent> = events
        .iter()
        .filter(|e| category.attack_types().contains(&e.attack_type))
        .collect();
    let attempts: u32 = relevant.iter().map(|e| e.result.attempted).sum();
    if attempts == 0 {
        return None;
    }
    let defended: u32 = relevant.iter().map(|e| e.result.defended()).sum();
    let rate = defended as f64 / attempts as f64;
    Some(CategoryScore {
        category,
        events: relevant.len(),
        attempts,
        defended,
        rate,
        rating: thresholds.rate(rate),
    })
}

/// Mean rating weight; `None` when nothing was scored
pub fn overall_score(ratings: &[Rating]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    Some(ratings.iter().map(Rating::weight).sum::<f64>() / ratings.len() as f64)
}

pub fn recommendations(scores: &[CategoryScore]) -> Vec<String> {
    let poor: Vec<String> = scores
        .iter()
        .filter(|s| s.rating == Rating::Poor)
        .map(|s| s.category.remediation().to_string())
        .collect();
    if poor.is_empty() {
        vec!["Network defences held up well across all scored categories".to_string()]
    } else {
        poor
    }
}
