//! Confidence classification.
//!
//! Buckets a match score into an action tier using per-entity-type
//! thresholds. Deterministic for fixed thresholds and a fixed snapshot.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::candidate::CandidateRecord;
use crate::config::ResolverConfig;
use crate::ledger::ItemId;
use crate::matcher::MatchResult;

/// Action tier of a candidate-to-canonical match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    /// Normalized names are equal.
    Exact,
    /// Score at or above the type's high threshold.
    High,
    /// Score in `[review_low, high)`; needs a human.
    Medium,
    /// Below `review_low`, or no candidates at all.
    Low,
}

impl Tier {
    /// EXACT and HIGH merge without review.
    #[must_use]
    pub const fn is_auto_merge(self) -> bool {
        matches!(self, Self::Exact | Self::High)
    }

    /// MEDIUM goes to the review ledger.
    #[must_use]
    pub const fn needs_review(self) -> bool {
        matches!(self, Self::Medium)
    }

    /// LOW seeds a new canonical entity.
    #[must_use]
    pub const fn creates_entity(self) -> bool {
        matches!(self, Self::Low)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Exact => "EXACT",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        };
        f.write_str(s)
    }
}

/// Tier boundaries for one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Auto-merge at or above.
    pub high: f64,
    /// Review at or above, below `high`.
    pub review_low: f64,
}

impl Thresholds {
    /// Tier of a raw score. Never returns EXACT.
    #[must_use]
    pub fn tier_for_score(&self, score: f64) -> Tier {
        if score >= self.high {
            Tier::High
        } else if score >= self.review_low {
            Tier::Medium
        } else {
            Tier::Low
        }
    }
}

/// Classifies a single match result.
#[must_use]
pub fn classify_with(result: &MatchResult, thresholds: &Thresholds) -> Tier {
    if result.exact {
        Tier::Exact
    } else {
        thresholds.tier_for_score(result.score)
    }
}

/// Classifier bound to a configuration table.
#[derive(Debug, Clone)]
pub struct Classifier {
    config: Arc<ResolverConfig>,
}

impl Classifier {
    /// Creates a classifier.
    #[must_use]
    pub fn new(config: Arc<ResolverConfig>) -> Self {
        Self { config }
    }

    /// Classifies a match with the thresholds of the canonical's type.
    #[must_use]
    pub fn classify(&self, result: &MatchResult) -> Tier {
        classify_with(result, &self.config.thresholds(&result.canonical.entity_type))
    }

    /// Tier of a ranked match list; LOW when empty.
    #[must_use]
    pub fn classify_ranked(&self, matches: &[MatchResult]) -> Tier {
        matches.first().map_or(Tier::Low, |top| self.classify(top))
    }
}

/// Everything known about one candidate after matching and classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// The candidate as received.
    pub candidate: CandidateRecord,

    /// Normalized candidate name.
    pub normalized: String,

    /// Stable review identifier.
    pub item_id: ItemId,

    /// Ranked matches, best first.
    pub matches: Vec<MatchResult>,

    /// Tier of the best match.
    pub tier: Tier,
}

impl Assessment {
    /// Best match, if any.
    #[must_use]
    pub fn top(&self) -> Option<&MatchResult> {
        self.matches.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityId, EntityType};
    use crate::matcher::{CanonicalRef, MetricScores};

    fn result(score: f64, exact: bool, entity_type: EntityType) -> MatchResult {
        MatchResult {
            candidate_name: "c".to_string(),
            candidate_normalized: "c".to_string(),
            canonical: CanonicalRef {
                id: EntityId::new(),
                namespace: entity_type.key(),
                entity_type,
                canonical_name: "n".to_string(),
            },
            matched_name: "n".to_string(),
            scores: MetricScores {
                ratio: score,
                partial: score,
                token_sort: score,
            },
            containment_boosted: false,
            score,
            exact,
        }
    }

    #[test]
    fn test_tier_boundaries() {
        let t = Thresholds {
            high: 95.0,
            review_low: 85.0,
        };
        assert_eq!(t.tier_for_score(95.0), Tier::High);
        assert_eq!(t.tier_for_score(94.99), Tier::Medium);
        assert_eq!(t.tier_for_score(85.0), Tier::Medium);
        assert_eq!(t.tier_for_score(84.99), Tier::Low);
    }

    #[test]
    fn test_exact_wins_over_score() {
        let t = Thresholds {
            high: 95.0,
            review_low: 85.0,
        };
        assert_eq!(classify_with(&result(100.0, true, EntityType::Provider), &t), Tier::Exact);
        assert_eq!(classify_with(&result(100.0, false, EntityType::Provider), &t), Tier::High);
    }

    #[test]
    fn test_person_thresholds_are_looser() {
        let classifier = Classifier::new(Arc::new(ResolverConfig::default()));
        assert_eq!(classifier.classify(&result(91.0, false, EntityType::Attorney)), Tier::High);
        assert_eq!(classifier.classify(&result(91.0, false, EntityType::Provider)), Tier::Medium);
        assert_eq!(classifier.classify(&result(82.0, false, EntityType::Provider)), Tier::Low);
    }

    #[test]
    fn test_empty_matches_are_low() {
        let classifier = Classifier::new(Arc::new(ResolverConfig::default()));
        assert_eq!(classifier.classify_ranked(&[]), Tier::Low);
    }

    #[test]
    fn test_tier_helpers_and_display() {
        assert!(Tier::Exact.is_auto_merge() && Tier::High.is_auto_merge());
        assert!(Tier::Medium.needs_review());
        assert!(Tier::Low.creates_entity());
        assert_eq!(Tier::Medium.to_string(), "MEDIUM");
        assert_eq!(serde_json::to_string(&Tier::High).unwrap(), "\"HIGH\"");
    }
}
