//! Per-candidate assessment: normalize, match, classify.

use std::sync::Arc;

use tracing::debug;

use crate::candidate::CandidateRecord;
use crate::classify::{Assessment, Classifier};
use crate::config::ResolverConfig;
use crate::ledger::ItemId;
use crate::matcher::Matcher;
use crate::normalize::Normalizer;
use crate::snapshot::CanonicalSnapshot;

/// Pure assessment stage shared by every worker.
#[derive(Debug, Clone)]
pub struct Assessor {
    matcher: Matcher,
    classifier: Classifier,
    top_k: usize,
}

impl Assessor {
    /// Creates an assessor.
    #[must_use]
    pub fn new(config: Arc<ResolverConfig>, normalizer: Arc<Normalizer>) -> Self {
        Self {
            top_k: config.top_k,
            matcher: Matcher::new(Arc::clone(&config), normalizer),
            classifier: Classifier::new(config),
        }
    }

    /// Assesses one candidate against the batch snapshot.
    #[must_use]
    pub fn assess(&self, candidate: CandidateRecord, snapshot: &CanonicalSnapshot) -> Assessment {
        let normalized = self
            .matcher
            .normalizer()
            .normalize(&candidate.name, &candidate.entity_type);
        let matches = self.matcher.match_candidate(&candidate, snapshot, self.top_k);
        let tier = self.classifier.classify_ranked(&matches);
        let item_id = ItemId::compute(&candidate.entity_type, &normalized);

        debug!(
            candidate = %candidate.name,
            entity_type = %candidate.entity_type,
            %tier,
            score = matches.first().map_or(0.0, |m| m.score),
            best = matches.first().map_or("-", |m| m.canonical.canonical_name.as_str()),
            "candidate classified"
        );

        Assessment {
            candidate,
            normalized,
            item_id,
            matches,
            tier,
        }
    }
}
