//! Bounded worker pool for the assessment stage.
//!
//! Workers are scoped threads sharing the batch snapshot read-only. Jobs go
//! through a bounded channel; results come back tagged with their input
//! index and are put back in input order.

use std::thread;

use crossbeam_channel::{bounded, unbounded};
use tracing::debug;

use crate::candidate::CandidateRecord;
use crate::classify::Assessment;
use crate::error::{CanonryError, CanonryResult};
use crate::pipeline::assess::Assessor;
use crate::snapshot::CanonicalSnapshot;

/// Pool configuration.
#[derive(Debug, Clone, Copy)]
pub struct AssessmentPool {
    workers: usize,
    queue_capacity: usize,
}

impl Default for AssessmentPool {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 1024,
        }
    }
}

impl AssessmentPool {
    /// Creates a pool with `workers` threads.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            ..Self::default()
        }
    }

    /// Sets the job queue bound.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Number of worker threads.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Assesses every candidate; output order matches input order.
    pub fn run(
        &self,
        assessor: &Assessor,
        snapshot: &CanonicalSnapshot,
        candidates: Vec<CandidateRecord>,
    ) -> CanonryResult<Vec<Assessment>> {
        let total = candidates.len();
        if total == 0 {
            return Ok(Vec::new());
        }
        let workers = self.workers.min(total);
        if workers == 1 {
            return Ok(candidates
                .into_iter()
                .map(|c| assessor.assess(c, snapshot))
                .collect());
        }

        let (job_tx, job_rx) = bounded::<(usize, CandidateRecord)>(self.queue_capacity);
        let (result_tx, result_rx) = unbounded::<(usize, Assessment)>();

        thread::scope(|scope| {
            for idx in 0..workers {
                let rx = job_rx.clone();
                let tx = result_tx.clone();
                thread::Builder::new()
                    .name(format!("canonry-assess-{idx}"))
                    .spawn_scoped(scope, move || {
                        while let Ok((position, candidate)) = rx.recv() {
                            if tx.send((position, assessor.assess(candidate, snapshot))).is_err() {
                                break;
                            }
                        }
                    })
                    .map_err(|e| CanonryError::internal(format!("failed to spawn assessment worker: {e}")))?;
            }
            drop(job_rx);
            drop(result_tx);

            for job in candidates.into_iter().enumerate() {
                job_tx
                    .send(job)
                    .map_err(|_| CanonryError::internal("assessment workers disconnected"))?;
            }
            drop(job_tx);
            Ok::<(), CanonryError>(())
        })?;

        let mut slots: Vec<Option<Assessment>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);
        for (position, assessment) in result_rx.try_iter() {
            if let Some(slot) = slots.get_mut(position) {
                *slot = Some(assessment);
            }
        }
        debug!(candidates = total, workers, "batch assessed");

        slots
            .into_iter()
            .enumerate()
            .map(|(position, slot)| {
                slot.ok_or_else(|| CanonryError::internal(format!("missing assessment for candidate {position}")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::ResolverConfig;
    use crate::entity::{CanonicalEntity, EntityType};
    use crate::normalize::Normalizer;
    use crate::provenance::Provenance;

    #[test]
    fn test_parallel_matches_sequential_order() {
        let config = Arc::new(ResolverConfig::default());
        let normalizer = Arc::new(Normalizer::new(&config));
        let snapshot = CanonicalSnapshot::build(
            (0..50).map(|i| CanonicalEntity::new(format!("Clinic Number {i}"), EntityType::Provider)),
            &normalizer,
        );
        let assessor = Assessor::new(config, normalizer);
        let candidates: Vec<CandidateRecord> = (0..200)
            .map(|i| {
                CandidateRecord::new(
                    format!("Clinic Number {}", i % 70),
                    EntityType::Provider,
                    Provenance::new("t", i.to_string()),
                )
            })
            .collect();

        let sequential = AssessmentPool::new(1).run(&assessor, &snapshot, candidates.clone()).unwrap();
        let parallel = AssessmentPool::new(4)
            .with_queue_capacity(8)
            .run(&assessor, &snapshot, candidates)
            .unwrap();
        assert_eq!(sequential.len(), 200);
        assert_eq!(sequential, parallel);
        assert_eq!(parallel[3].candidate.provenance.source_id, "3");
    }

    #[test]
    fn test_empty_batch() {
        let config = Arc::new(ResolverConfig::default());
        let normalizer = Arc::new(Normalizer::new(&config));
        let assessor = Assessor::new(config, normalizer);
        let out = AssessmentPool::new(3)
            .run(&assessor, &CanonicalSnapshot::default(), Vec::new())
            .unwrap();
        assert!(out.is_empty());
    }
}
