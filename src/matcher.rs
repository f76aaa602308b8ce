//! Candidate matching.
//!
//! Scores a normalized candidate against every canonical entity in its
//! snapshot partition. Each canonical name and alias is compared with three
//! metrics; the combined score is their maximum, floored by the containment
//! boost when the shorter name is embedded in the longer one. Pure: no I/O,
//! no shared mutable state.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::candidate::CandidateRecord;
use crate::config::{ResolverConfig, TypeProfile};
use crate::entity::{EntityId, EntityType};
use crate::normalize::Normalizer;
use crate::similarity::{partial_ratio, ratio, token_sort_ratio};
use crate::snapshot::{CanonicalSnapshot, SnapshotEntry};

/// Reference to the canonical entity a candidate was scored against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRef {
    /// Entity id.
    pub id: EntityId,
    /// Entity type.
    pub entity_type: EntityType,
    /// Entity namespace.
    pub namespace: String,
    /// Canonical name at scoring time.
    pub canonical_name: String,
}

/// Per-metric scores, each on 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricScores {
    /// Plain edit-distance ratio.
    pub ratio: f64,
    /// Best-substring ratio.
    pub partial: f64,
    /// Ratio over sorted tokens.
    pub token_sort: f64,
}

impl MetricScores {
    /// Computes all three metrics.
    #[must_use]
    pub fn compute(a: &str, b: &str) -> Self {
        Self {
            ratio: ratio(a, b),
            partial: partial_ratio(a, b),
            token_sort: token_sort_ratio(a, b),
        }
    }

    /// Maximum of the three metrics.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.ratio.max(self.partial).max(self.token_sort)
    }
}

/// Score of one candidate against one canonical entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Candidate name as received.
    pub candidate_name: String,
    /// Normalized candidate name.
    pub candidate_normalized: String,
    /// Entity scored against.
    pub canonical: CanonicalRef,
    /// The canonical name or alias that produced the best score.
    pub matched_name: String,
    /// Individual metric scores.
    pub scores: MetricScores,
    /// True if the containment bonus applied.
    pub containment_boosted: bool,
    /// Combined score (0-100).
    pub score: f64,
    /// Normalized forms are equal.
    pub exact: bool,
}

impl MatchResult {
    /// Ranking order: score desc, longer canonical name, then lexicographic.
    #[must_use]
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| {
                other
                    .canonical
                    .canonical_name
                    .chars()
                    .count()
                    .cmp(&self.canonical.canonical_name.chars().count())
            })
            .then_with(|| self.canonical.canonical_name.cmp(&other.canonical.canonical_name))
            .then_with(|| self.canonical.id.cmp(&other.canonical.id))
    }
}

/// Applies the containment floor to a combined score.
///
/// Returns the (possibly raised) score and whether the boost applied.
#[must_use]
pub fn containment_floor(a: &str, b: &str, score: f64, profile: &TypeProfile) -> (f64, bool) {
    let (shorter, longer) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    if shorter.chars().count() >= profile.containment_min_len
        && longer.contains(shorter)
        && score < profile.containment_boost
    {
        (profile.containment_boost, true)
    } else {
        (score, false)
    }
}

/// Scores a normalized candidate against a partition.
///
/// Returns at most `top_k` results, best first.
#[must_use]
pub fn score_partition(
    candidate_name: &str,
    candidate_normalized: &str,
    entries: &[SnapshotEntry],
    profile: &TypeProfile,
    top_k: usize,
) -> Vec<MatchResult> {
    if top_k == 0 || candidate_normalized.is_empty() {
        return Vec::new();
    }

    let mut results: Vec<MatchResult> = entries
        .iter()
        .filter_map(|entry| best_for_entry(candidate_name, candidate_normalized, entry, profile))
        .collect();

    results.sort_by(MatchResult::rank_cmp);
    results.truncate(top_k);
    results
}

fn best_for_entry(
    candidate_name: &str,
    candidate_normalized: &str,
    entry: &SnapshotEntry,
    profile: &TypeProfile,
) -> Option<MatchResult> {
    let mut best: Option<MatchResult> = None;

    for known in &entry.names {
        let exact = known.normalized == candidate_normalized;
        let scores = MetricScores::compute(candidate_normalized, &known.normalized);
        let (score, containment_boosted) = if exact {
            (100.0, false)
        } else {
            containment_floor(candidate_normalized, &known.normalized, scores.max(), profile)
        };

        let better = best.as_ref().map_or(true, |b| {
            (exact && !b.exact) || (exact == b.exact && score > b.score)
        });
        if better {
            best = Some(MatchResult {
                candidate_name: candidate_name.to_string(),
                candidate_normalized: candidate_normalized.to_string(),
                canonical: CanonicalRef {
                    id: entry.entity.id,
                    entity_type: entry.entity.entity_type.clone(),
                    namespace: entry.entity.namespace.clone(),
                    canonical_name: entry.entity.canonical_name.clone(),
                },
                matched_name: known.raw.clone(),
                scores,
                containment_boosted,
                score,
                exact,
            });
        }
    }

    best
}

/// Matches candidates against a snapshot using the configured profiles.
#[derive(Debug, Clone)]
pub struct Matcher {
    config: Arc<ResolverConfig>,
    normalizer: Arc<Normalizer>,
}

impl Matcher {
    /// Creates a matcher.
    #[must_use]
    pub fn new(config: Arc<ResolverConfig>, normalizer: Arc<Normalizer>) -> Self {
        Self { config, normalizer }
    }

    /// Returns the normalizer used for candidates.
    #[must_use]
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Scores a candidate against its `(entity_type, namespace)` partition.
    ///
    /// Cost is linear in the partition size.
    #[must_use]
    pub fn match_candidate(
        &self,
        candidate: &CandidateRecord,
        snapshot: &CanonicalSnapshot,
        top_k: usize,
    ) -> Vec<MatchResult> {
        let normalized = self.normalizer.normalize(&candidate.name, &candidate.entity_type);
        let namespace = candidate.namespace();
        let entries = snapshot.partition(&candidate.entity_type, &namespace);
        let profile = self.config.profile(&candidate.entity_type);
        score_partition(&candidate.name, &normalized, entries, profile, top_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::CanonicalEntity;
    use crate::provenance::Provenance;

    fn matcher() -> Matcher {
        let config = Arc::new(ResolverConfig::default());
        let normalizer = Arc::new(Normalizer::new(&config));
        Matcher::new(config, normalizer)
    }

    fn providers(names: &[&str]) -> CanonicalSnapshot {
        CanonicalSnapshot::build(
            names
                .iter()
                .map(|n| CanonicalEntity::new(*n, EntityType::Provider)),
            &Normalizer::default(),
        )
    }

    fn candidate(name: &str) -> CandidateRecord {
        CandidateRecord::new(name, EntityType::Provider, Provenance::new("test", name))
    }

    #[test]
    fn test_exact_match_scores_100() {
        let snap = providers(&["Norton Hospital", "Baptist Health East"]);
        let results = matcher().match_candidate(&candidate("NORTON HOSPITAL"), &snap, 5);
        assert!(results[0].exact);
        assert!((results[0].score - 100.0).abs() < f64::EPSILON);
        assert_eq!(results[0].canonical.canonical_name, "Norton Hospital");
    }

    #[test]
    fn test_more_specific_location_scores_high() {
        let snap = providers(&["Norton Hospital"]);
        let results = matcher().match_candidate(&candidate("Norton Hospital Downtown"), &snap, 5);
        assert_eq!(results.len(), 1);
        assert!(!results[0].exact);
        assert!(results[0].score >= 88.0, "score {}", results[0].score);
    }

    #[test]
    fn test_containment_floor_applies_only_to_long_names() {
        let profile = TypeProfile::organization();
        let (score, boosted) = containment_floor("baptist east", "baptist east campus", 70.0, &profile);
        assert!(boosted);
        assert!((score - profile.containment_boost).abs() < f64::EPSILON);

        let (score, boosted) = containment_floor("uofl", "uofl health", 40.0, &profile);
        assert!(!boosted);
        assert!((score - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_top_k_and_ordering() {
        let snap = providers(&["Norton Hospital", "Norton Hospitals", "Norton Clinic", "Jewish Hospital"]);
        let results = matcher().match_candidate(&candidate("Norton Hospital"), &snap, 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].canonical.canonical_name, "Norton Hospital");
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn test_ties_prefer_longer_then_lexicographic() {
        let make = |name: &str, score: f64| MatchResult {
            candidate_name: "x".to_string(),
            candidate_normalized: "x".to_string(),
            canonical: CanonicalRef {
                id: EntityId::new(),
                entity_type: EntityType::Provider,
                namespace: "provider".to_string(),
                canonical_name: name.to_string(),
            },
            matched_name: name.to_string(),
            scores: MetricScores {
                ratio: score,
                partial: score,
                token_sort: score,
            },
            containment_boosted: false,
            score,
            exact: false,
        };
        let mut results = vec![make("Beta", 90.0), make("Alpha", 90.0), make("Gamma Long", 90.0), make("Z", 95.0)];
        results.sort_by(MatchResult::rank_cmp);
        let names: Vec<_> = results.iter().map(|r| r.canonical.canonical_name.as_str()).collect();
        assert_eq!(names, vec!["Z", "Gamma Long", "Alpha", "Beta"]);
    }

    #[test]
    fn test_alias_exact_match() {
        let mut wht = CanonicalEntity::new("Whaley Harrison & Thorne, PLLC", EntityType::Provider);
        wht.add_alias("WHT Law");
        let snap = CanonicalSnapshot::build(vec![wht], &Normalizer::default());
        let results = matcher().match_candidate(&candidate("W.H.T. Law"), &snap, 3);
        assert!(results[0].exact);
        assert_eq!(results[0].matched_name, "WHT Law");
    }

    #[test]
    fn test_other_namespace_not_considered() {
        let scoped = CanonicalEntity::in_namespace("Norton Hospital", EntityType::Provider, "indiana");
        let snap = CanonicalSnapshot::build(vec![scoped], &Normalizer::default());
        assert!(matcher().match_candidate(&candidate("Norton Hospital"), &snap, 3).is_empty());
    }

    #[test]
    fn test_deterministic() {
        let snap = providers(&["Norton Hospital", "Norton Healthcare Pavilion", "Baptist Health"]);
        let m = matcher();
        let a = m.match_candidate(&candidate("Norton Pavilion"), &snap, 3);
        let b = m.match_candidate(&candidate("Norton Pavilion"), &snap, 3);
        assert_eq!(a, b);
    }
}
