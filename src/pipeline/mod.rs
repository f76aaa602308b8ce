//! Batch orchestration.
//!
//! Ties the stages together for one batch:
//!
//! 1. snapshot the canonical directory
//! 2. assess every candidate on the worker pool
//! 3. queue MEDIUM items for review, plan the rest
//! 4. commit the staged graph batches through the writer
//! 5. apply the staged entities back to the directory
//!
//! Nothing outside memory changes before step 4, so a batch can be abandoned
//! at any point until then.

mod assess;
mod workers;

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::candidate::CandidateRecord;
use crate::classify::{Assessment, Tier};
use crate::config::ResolverConfig;
use crate::directory::CanonicalDirectory;
use crate::error::{CanonryError, CanonryResult, GraphError, ValidationError};
use crate::graph::{CommitReport, GraphStore, GraphWriter};
use crate::ledger::{
    Decision, EnqueueOutcome, ItemId, ReviewLedger, ReviewOutcome, SettledEntry, SettledOutcome,
};
use crate::merge::{FolderMerge, HumanOverride, MergeAction, MergePlanner, Staged, StagedBatch};
use crate::normalize::Normalizer;
use crate::snapshot::CanonicalSnapshot;

pub use assess::Assessor;
pub use workers::AssessmentPool;

/// A candidate that resolved to a canonical entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedCandidate {
    /// Review item id.
    pub item_id: ItemId,
    /// Candidate name as received.
    pub candidate_name: String,
    /// Canonical name it resolved to.
    pub canonical_name: String,
    /// Tier that decided it.
    pub tier: Tier,
    /// True if the candidate seeded a new entity.
    pub created: bool,
}

/// A candidate the batch could not act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedCandidate {
    /// Review item id.
    pub item_id: ItemId,
    /// Candidate name as received.
    pub candidate_name: String,
    /// Why it was rejected.
    pub reason: String,
}

/// Result of one automated batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    /// Candidates that resolved.
    pub resolved: Vec<ResolvedCandidate>,
    /// New review items.
    pub queued: usize,
    /// MEDIUM items already waiting for a reviewer.
    pub already_pending: usize,
    /// MEDIUM items a reviewer already settled.
    pub already_settled: usize,
    /// Candidates that could not be used.
    pub rejected: Vec<RejectedCandidate>,
    /// One report per committed namespace.
    pub commits: Vec<CommitReport>,
    /// Folders that should now be consolidated.
    pub folder_merges: Vec<FolderMerge>,
}

impl BatchOutcome {
    /// Candidates merged into existing entities.
    #[must_use]
    pub fn merged(&self) -> usize {
        self.resolved.iter().filter(|r| !r.created).count()
    }

    /// Candidates that seeded new entities.
    #[must_use]
    pub fn created(&self) -> usize {
        self.resolved.iter().filter(|r| r.created).count()
    }
}

/// Result of applying an annotated review document.
#[derive(Debug, Clone, Default)]
pub struct ReviewApplied {
    /// What the document contained.
    pub review: ReviewOutcome,
    /// Items settled by this document.
    pub settled: Vec<SettledEntry>,
    /// Final decisions that could not be carried out; kept pending as unclear.
    pub rejected: Vec<RejectedCandidate>,
    /// Rerouted candidates that landed in another type's review queue.
    pub requeued: Vec<ItemId>,
    /// One report per committed namespace.
    pub commits: Vec<CommitReport>,
    /// Folders that should now be consolidated.
    pub folder_merges: Vec<FolderMerge>,
}

/// End-to-end resolver.
#[derive(Debug)]
pub struct Resolver {
    config: Arc<ResolverConfig>,
    normalizer: Arc<Normalizer>,
    assessor: Assessor,
    planner: MergePlanner,
    pool: AssessmentPool,
    writer: GraphWriter,
}

impl Resolver {
    /// Creates a resolver writing to `store` with the configured canaries.
    #[must_use]
    pub fn new(config: ResolverConfig, store: Arc<dyn GraphStore>) -> Self {
        let config = Arc::new(config);
        let normalizer = Arc::new(Normalizer::new(&config));
        Self {
            assessor: Assessor::new(Arc::clone(&config), Arc::clone(&normalizer)),
            planner: MergePlanner::new(Arc::clone(&normalizer)),
            pool: AssessmentPool::new(config.workers),
            writer: GraphWriter::new(store, config.canaries.clone()),
            normalizer,
            config,
        }
    }

    /// The graph writer (UNSAFE state, acknowledgements).
    #[must_use]
    pub fn writer(&self) -> &GraphWriter {
        &self.writer
    }

    /// The normalizer built from the configuration.
    #[must_use]
    pub fn normalizer(&self) -> &Arc<Normalizer> {
        &self.normalizer
    }

    fn ensure_safe(&self) -> CanonryResult<()> {
        let batches = self.writer.unsafe_batches()?;
        if batches.is_empty() {
            return Ok(());
        }
        warn!(unsafe_batches = batches.len(), "refusing to build a batch on unacknowledged UNSAFE state");
        Err(GraphError::UnacknowledgedUnsafe {
            batch_ids: batches.into_iter().map(|b| b.batch_id).collect(),
        }
        .into())
    }

    fn staged_batch(&self) -> StagedBatch {
        StagedBatch::new(Arc::clone(&self.normalizer), self.config.folder_attribute.clone())
    }

    /// Commits a staged batch and applies its entities to the directory.
    fn commit(
        &self,
        staged: StagedBatch,
        directory: &mut CanonicalDirectory,
    ) -> CanonryResult<(Vec<CommitReport>, Vec<FolderMerge>)> {
        let output = staged.finish();
        let mut commits = Vec::with_capacity(output.batches.len());
        for batch in output.batches {
            if batch.is_empty() {
                continue;
            }
            commits.push(self.writer.commit(batch)?);
        }
        directory.apply(output.entities)?;
        Ok((commits, output.folder_merges))
    }

    /// Runs one automated batch.
    ///
    /// MEDIUM candidates are queued in `ledger`; everything else is merged or
    /// created and committed. Pending items that now resolve automatically
    /// are settled.
    ///
    /// # Errors
    /// - `UnacknowledgedUnsafe` before anything is assessed
    /// - any commit error; the directory is then left as it was
    pub fn run_batch(
        &self,
        candidates: Vec<CandidateRecord>,
        directory: &mut CanonicalDirectory,
        ledger: &mut ReviewLedger,
    ) -> CanonryResult<BatchOutcome> {
        self.ensure_safe()?;
        let mut outcome = BatchOutcome::default();
        let mut accepted = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match self.screen(&candidate) {
                Ok(()) => accepted.push(candidate),
                Err(e) => {
                    warn!(candidate = %candidate.name, error = %e, "malformed candidate skipped");
                    outcome.rejected.push(RejectedCandidate {
                        item_id: ItemId::compute(
                            &candidate.entity_type,
                            &self.normalizer.normalize(&candidate.name, &candidate.entity_type),
                        ),
                        candidate_name: candidate.name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let snapshot = directory.snapshot(&self.normalizer);
        let assessments = self.pool.run(&self.assessor, &snapshot, accepted)?;

        let mut staged = self.staged_batch();
        let mut settle = Vec::new();

        for assessment in assessments {
            if assessment.tier.needs_review() {
                match ledger.enqueue(assessment) {
                    EnqueueOutcome::Queued => outcome.queued += 1,
                    EnqueueOutcome::AlreadyPending => outcome.already_pending += 1,
                    EnqueueOutcome::AlreadySettled => outcome.already_settled += 1,
                }
                continue;
            }

            match self.stage(&assessment, None, &snapshot, &mut staged) {
                Ok(Some(resolved)) => {
                    if ledger.queue().get(&assessment.item_id).is_some() {
                        settle.push(settled_entry(&assessment, &resolved));
                    }
                    outcome.resolved.push(resolved);
                }
                Ok(None) => {}
                Err(e) if e.is_validation() => {
                    warn!(candidate = %assessment.candidate.name, error = %e, "candidate rejected");
                    outcome.rejected.push(RejectedCandidate {
                        item_id: assessment.item_id.clone(),
                        candidate_name: assessment.candidate.name.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let (commits, folder_merges) = self.commit(staged, directory)?;
        outcome.commits = commits;
        outcome.folder_merges = folder_merges;
        for entry in settle {
            ledger.settle(entry)?;
        }

        info!(
            merged = outcome.merged(),
            created = outcome.created(),
            queued = outcome.queued,
            already_pending = outcome.already_pending,
            rejected = outcome.rejected.len(),
            commits = outcome.commits.len(),
            "batch committed"
        );
        Ok(outcome)
    }

    /// Rejects records that cannot be matched: blank names or namespaces,
    /// and names made only of punctuation and stop phrases.
    fn screen(&self, candidate: &CandidateRecord) -> Result<(), ValidationError> {
        candidate.validate()?;
        if self
            .normalizer
            .normalize(&candidate.name, &candidate.entity_type)
            .is_empty()
        {
            return Err(ValidationError::EmptyNormalizedName {
                name: candidate.name.clone(),
            });
        }
        Ok(())
    }

    /// Plans and stages one assessment; `None` when deferred or rerouted.
    fn stage(
        &self,
        assessment: &Assessment,
        human: Option<&HumanOverride>,
        snapshot: &CanonicalSnapshot,
        staged: &mut StagedBatch,
    ) -> CanonryResult<Option<ResolvedCandidate>> {
        let decision = self.planner.plan(assessment, human, snapshot)?;
        let resolved = match staged.apply(&decision, &assessment.candidate, snapshot)? {
            Staged::Merged { canonical_name, .. } => Some((canonical_name, false)),
            Staged::Created { canonical_name, .. } => Some((canonical_name, true)),
            Staged::Deferred | Staged::Rerouted { .. } => None,
        };
        Ok(resolved.map(|(canonical_name, created)| ResolvedCandidate {
            item_id: assessment.item_id.clone(),
            candidate_name: assessment.candidate.name.clone(),
            canonical_name,
            tier: assessment.tier,
            created,
        }))
    }

    /// Applies an annotated review document.
    ///
    /// Context notes and unclear annotations are recorded on the pending
    /// items. Final decisions are planned against a fresh snapshot,
    /// committed, and then settled. A decision that cannot be carried out
    /// (unknown canonical name, duplicate name) keeps its item pending with
    /// the annotation shown again.
    ///
    /// A reclassified candidate is matched once against the new type; a
    /// MEDIUM result there is queued under the new type.
    ///
    /// # Errors
    /// - `UnacknowledgedUnsafe` before the document is read
    /// - any commit error; nothing is settled
    pub fn apply_review(
        &self,
        document: &str,
        directory: &mut CanonicalDirectory,
        ledger: &mut ReviewLedger,
    ) -> CanonryResult<ReviewApplied> {
        self.ensure_safe()?;
        let mut review = ledger.apply_document(document);
        let resolutions = std::mem::take(&mut review.resolutions);
        let snapshot = directory.snapshot(&self.normalizer);

        let mut applied = ReviewApplied::default();
        let mut staged = self.staged_batch();
        let mut settle = Vec::new();

        for resolution in &resolutions {
            let assessment = &resolution.item.assessment;
            let entity_type = assessment.candidate.entity_type.clone();

            if resolution.decision == Decision::Ignore {
                settle.push(SettledEntry::new(
                    assessment.item_id.clone(),
                    entity_type,
                    assessment.candidate.name.clone(),
                    SettledOutcome::Ignored,
                ));
                continue;
            }
            let Some((human, attributes)) = HumanOverride::from_decision(&resolution.decision, &entity_type) else {
                continue;
            };
            let mut assessment = assessment.clone();
            assessment.candidate.attributes.extend(attributes);

            let result = self.review_one(&assessment, &human, &snapshot, &mut staged, ledger);
            match result {
                Ok(ReviewStep::Resolved(resolved)) => settle.push(settled_entry(&assessment, &resolved)),
                Ok(ReviewStep::Requeued(new_id)) => {
                    applied.requeued.push(new_id);
                    settle.push(SettledEntry::new(
                        assessment.item_id.clone(),
                        entity_type,
                        assessment.candidate.name.clone(),
                        SettledOutcome::Rerouted {
                            entity_type: rerouted_type(&human).unwrap_or_else(|| assessment.candidate.entity_type.clone()),
                        },
                    ));
                }
                Ok(ReviewStep::Deferred) => {}
                Err(e) if e.is_validation() => {
                    warn!(item_id = %assessment.item_id, error = %e, "review decision cannot be applied; kept pending");
                    ledger.mark_unclear(&assessment.item_id, resolution.annotation.clone());
                    applied.rejected.push(RejectedCandidate {
                        item_id: assessment.item_id.clone(),
                        candidate_name: assessment.candidate.name.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let (commits, folder_merges) = self.commit(staged, directory)?;
        applied.commits = commits;
        applied.folder_merges = folder_merges;
        for entry in settle {
            if ledger.settle(entry.clone())? {
                applied.settled.push(entry);
            }
        }
        review.resolutions = resolutions;
        applied.review = review;

        info!(
            settled = applied.settled.len(),
            rejected = applied.rejected.len(),
            requeued = applied.requeued.len(),
            commits = applied.commits.len(),
            "review applied"
        );
        Ok(applied)
    }

    fn review_one(
        &self,
        assessment: &Assessment,
        human: &HumanOverride,
        snapshot: &CanonicalSnapshot,
        staged: &mut StagedBatch,
        ledger: &mut ReviewLedger,
    ) -> CanonryResult<ReviewStep> {
        let decision = self.planner.plan(assessment, Some(human), snapshot)?;
        let MergeAction::Reroute { candidate } = decision.action else {
            return Ok(self
                .stage(assessment, Some(human), snapshot, staged)?
                .map_or(ReviewStep::Deferred, ReviewStep::Resolved));
        };

        self.screen(&candidate)?;
        let rerouted = self.assessor.assess(candidate, snapshot);
        if rerouted.tier.needs_review() {
            let new_id = rerouted.item_id.clone();
            ledger.enqueue(rerouted);
            return Ok(ReviewStep::Requeued(new_id));
        }
        let resolved = self
            .stage(&rerouted, None, snapshot, staged)?
            .ok_or_else(|| CanonryError::internal("rerouted candidate was neither merged nor created"))?;
        Ok(ReviewStep::Resolved(ResolvedCandidate {
            item_id: assessment.item_id.clone(),
            ..resolved
        }))
    }
}

enum ReviewStep {
    Resolved(ResolvedCandidate),
    Requeued(ItemId),
    Deferred,
}

fn rerouted_type(human: &HumanOverride) -> Option<crate::entity::EntityType> {
    match human {
        HumanOverride::Reclassify { entity_type } => Some(entity_type.clone()),
        HumanOverride::Approve { .. } | HumanOverride::Reject => None,
    }
}

fn settled_entry(assessment: &Assessment, resolved: &ResolvedCandidate) -> SettledEntry {
    let outcome = if resolved.created {
        SettledOutcome::Created {
            canonical_name: resolved.canonical_name.clone(),
        }
    } else {
        SettledOutcome::Merged {
            canonical_name: resolved.canonical_name.clone(),
        }
    };
    SettledEntry::new(
        assessment.item_id.clone(),
        assessment.candidate.entity_type.clone(),
        assessment.candidate.name.clone(),
        outcome,
    )
}
