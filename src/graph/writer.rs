//! Graph Writer.
//!
//! Commits staged batches through the upsert protocol and verifies canary
//! invariants around each commit. Commits serialize per namespace; batches
//! guarded by an unscoped canary take an exclusive gate so no concurrent
//! commit can move the global count between the before and after readings.
//!
//! A canary mismatch (or a write that fails half way) marks the batch UNSAFE.
//! While any UNSAFE batch is unacknowledged, every further commit is refused.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{CanonryError, CanonryResult, GraphError};
use crate::graph::canary::{Canary, CanaryCheck, CanaryDiff};
use crate::graph::traits::{EntityUpsert, GraphStore, RelationshipUpsert, StorageError, UpsertOutcome};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

/// Unique identifier for a commit batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(Uuid);

impl BatchId {
    /// Creates a new random batch ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BatchId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Staged graph mutations for one namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphBatch {
    /// Batch identifier.
    pub id: BatchId,
    /// Namespace every upsert belongs to.
    pub namespace: String,
    /// Node upserts, applied first.
    pub entities: Vec<EntityUpsert>,
    /// Edge upserts, applied after the nodes.
    pub relationships: Vec<RelationshipUpsert>,
}

impl GraphBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            id: BatchId::new(),
            namespace: namespace.into(),
            entities: Vec::new(),
            relationships: Vec::new(),
        }
    }

    /// Returns true if the batch writes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }
}

/// Upsert outcome tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertCounts {
    /// New nodes or edges.
    pub created: usize,
    /// Existing nodes that gained data.
    pub updated: usize,
    /// Upserts that changed nothing.
    pub unchanged: usize,
}

impl UpsertCounts {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }

    /// Returns true if nothing was created or updated.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReport {
    /// Committed batch.
    pub batch_id: BatchId,
    /// Namespace of the batch.
    pub namespace: String,
    /// Node upsert tallies.
    pub entities: UpsertCounts,
    /// Edge upsert tallies.
    pub relationships: UpsertCounts,
    /// Canaries checked around the commit.
    pub canaries: Vec<CanaryCheck>,
}

impl CommitReport {
    /// Returns true if the commit changed nothing.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.entities.is_noop() && self.relationships.is_noop()
    }
}

/// State of a batch that went UNSAFE in this writer.
///
/// Clean commits are reported through [`CommitReport`] and leave no entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    /// Blocking further commits.
    Unsafe,
    /// Cleared by an operator.
    Acknowledged,
}

/// A batch whose commit could not be verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsafeBatch {
    /// Batch that went UNSAFE.
    pub batch_id: BatchId,
    /// Namespace of the batch.
    pub namespace: String,
    /// Canaries that failed.
    pub diffs: Vec<CanaryDiff>,
    /// Write failure that interrupted the commit, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_error: Option<String>,
    /// When the batch was marked UNSAFE.
    pub detected_at: DateTime<Utc>,
}

/// Commits batches and enforces canary invariants.
pub struct GraphWriter {
    store: Arc<dyn GraphStore>,
    canaries: Vec<Canary>,
    gate: RwLock<()>,
    namespace_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    unsafe_batches: Mutex<BTreeMap<BatchId, UnsafeBatch>>,
    statuses: Mutex<HashMap<BatchId, BatchStatus>>,
}

impl fmt::Debug for GraphWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphWriter")
            .field("canaries", &self.canaries.len())
            .finish_non_exhaustive()
    }
}

impl GraphWriter {
    /// Creates a writer over a store with a set of canaries.
    #[must_use]
    pub fn new(store: Arc<dyn GraphStore>, canaries: Vec<Canary>) -> Self {
        Self {
            store,
            canaries,
            gate: RwLock::new(()),
            namespace_locks: Mutex::new(HashMap::new()),
            unsafe_batches: Mutex::new(BTreeMap::new()),
            statuses: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Configured canaries.
    #[must_use]
    pub fn canaries(&self) -> &[Canary] {
        &self.canaries
    }

    fn namespace_lock(&self, namespace: &str) -> Result<Arc<Mutex<()>>, StorageError> {
        let mut locks = self
            .namespace_locks
            .lock()
            .map_err(|_| lock_err("writer.namespace_locks"))?;
        Ok(Arc::clone(locks.entry(namespace.to_string()).or_default()))
    }

    fn refuse_if_unsafe(&self) -> CanonryResult<()> {
        let unsafe_batches = self
            .unsafe_batches
            .lock()
            .map_err(|_| lock_err("writer.unsafe_batches"))?;
        if unsafe_batches.is_empty() {
            return Ok(());
        }
        let batch_ids: Vec<BatchId> = unsafe_batches.keys().copied().collect();
        warn!(unsafe_batches = batch_ids.len(), "refusing commit on top of unacknowledged UNSAFE state");
        Err(GraphError::UnacknowledgedUnsafe { batch_ids }.into())
    }

    fn set_status(&self, batch_id: BatchId, status: BatchStatus) -> Result<(), StorageError> {
        self.statuses
            .lock()
            .map_err(|_| lock_err("writer.statuses"))?
            .insert(batch_id, status);
        Ok(())
    }

    fn mark_unsafe(&self, report: UnsafeBatch) -> Result<(), StorageError> {
        let batch_id = report.batch_id;
        self.unsafe_batches
            .lock()
            .map_err(|_| lock_err("writer.unsafe_batches"))?
            .insert(batch_id, report);
        self.set_status(batch_id, BatchStatus::Unsafe)
    }

    /// Commits a batch.
    ///
    /// # Errors
    /// - `UnacknowledgedUnsafe` if an earlier batch is still UNSAFE; nothing is written
    /// - `CanaryPrecheckFailed` if a canary with an expected value already fails; nothing is written
    /// - `CanaryViolation` if a canary mismatches after the writes; the batch is now UNSAFE
    /// - `Storage` if a write or a canary re-read fails; the batch is now UNSAFE
    pub fn commit(&self, batch: GraphBatch) -> CanonryResult<CommitReport> {
        self.refuse_if_unsafe()?;

        let canaries: Vec<&Canary> = self
            .canaries
            .iter()
            .filter(|c| c.applies_to(&batch.namespace))
            .collect();
        let exclusive = canaries.iter().any(|c| c.scope.is_none());

        let _gate = if exclusive {
            (None, Some(self.gate.write().map_err(|_| lock_err("writer.gate"))?))
        } else {
            (Some(self.gate.read().map_err(|_| lock_err("writer.gate"))?), None)
        };
        let namespace_lock = self.namespace_lock(&batch.namespace)?;
        let _namespace = namespace_lock
            .lock()
            .map_err(|_| lock_err("writer.namespace"))?;

        // Another commit may have gone UNSAFE while we waited.
        self.refuse_if_unsafe()?;

        let mut before = Vec::with_capacity(canaries.len());
        for canary in &canaries {
            let value = canary.query.evaluate(self.store.as_ref())?;
            if !canary.precheck(value) {
                warn!(canary = %canary.name, value, "canary failed before commit");
                return Err(GraphError::CanaryPrecheckFailed {
                    canary: canary.name.clone(),
                    value,
                    expected: canary.describe_expectation(),
                }
                .into());
            }
            before.push(value);
        }

        debug!(
            batch_id = %batch.id,
            namespace = %batch.namespace,
            entities = batch.entities.len(),
            relationships = batch.relationships.len(),
            exclusive,
            "committing batch"
        );

        let mut entity_counts = UpsertCounts::default();
        let mut relationship_counts = UpsertCounts::default();
        let applied = self.apply(&batch, &mut entity_counts, &mut relationship_counts);

        let mut checks = Vec::with_capacity(canaries.len());
        let mut diffs = Vec::new();
        let mut reread = Ok(());
        for (canary, before) in canaries.iter().zip(before) {
            let after = match canary.query.evaluate(self.store.as_ref()) {
                Ok(after) => after,
                Err(e) => {
                    reread = Err(e);
                    break;
                }
            };
            let diff = canary.verify(before, after);
            checks.push(CanaryCheck {
                canary: canary.name.clone(),
                before,
                after,
                passed: diff.is_none(),
            });
            diffs.extend(diff);
        }

        // The writes may have landed, so an unreadable canary is as bad as a mismatch.
        let failure = match (applied, reread) {
            (Ok(()), Ok(())) => None,
            (Err(write), Ok(())) => Some((write.to_string(), write)),
            (Ok(()), Err(read)) => Some((format!("canary re-read failed: {read}"), read)),
            (Err(write), Err(read)) => Some((format!("{write}; canary re-read failed: {read}"), write)),
        };
        if let Some((message, cause)) = failure {
            error!(batch_id = %batch.id, error = %message, "batch could not be verified; marking UNSAFE");
            self.mark_unsafe(UnsafeBatch {
                batch_id: batch.id,
                namespace: batch.namespace.clone(),
                diffs,
                write_error: Some(message),
                detected_at: Utc::now(),
            })?;
            return Err(cause.into());
        }

        if !diffs.is_empty() {
            for diff in &diffs {
                error!(batch_id = %batch.id, %diff, "canary mismatch after commit");
            }
            self.mark_unsafe(UnsafeBatch {
                batch_id: batch.id,
                namespace: batch.namespace.clone(),
                diffs: diffs.clone(),
                write_error: None,
                detected_at: Utc::now(),
            })?;
            return Err(GraphError::CanaryViolation {
                batch_id: batch.id,
                diffs,
            }
            .into());
        }

        info!(
            batch_id = %batch.id,
            namespace = %batch.namespace,
            entities_created = entity_counts.created,
            entities_updated = entity_counts.updated,
            relationships_created = relationship_counts.created,
            canaries = checks.len(),
            "batch committed"
        );

        Ok(CommitReport {
            batch_id: batch.id,
            namespace: batch.namespace,
            entities: entity_counts,
            relationships: relationship_counts,
            canaries: checks,
        })
    }

    fn apply(
        &self,
        batch: &GraphBatch,
        entities: &mut UpsertCounts,
        relationships: &mut UpsertCounts,
    ) -> Result<(), StorageError> {
        for upsert in &batch.entities {
            entities.record(self.store.upsert_entity(upsert)?);
        }
        for upsert in &batch.relationships {
            relationships.record(self.store.upsert_relationship(upsert)?);
        }
        Ok(())
    }

    /// Clears one UNSAFE batch so automated commits can resume.
    pub fn acknowledge(&self, batch_id: BatchId) -> CanonryResult<UnsafeBatch> {
        let report = self
            .unsafe_batches
            .lock()
            .map_err(|_| lock_err("writer.unsafe_batches"))?
            .remove(&batch_id)
            .ok_or(GraphError::UnknownBatch(batch_id))?;
        self.set_status(batch_id, BatchStatus::Acknowledged)?;
        info!(%batch_id, "UNSAFE batch acknowledged");
        Ok(report)
    }

    /// Unacknowledged UNSAFE batches, oldest id order.
    pub fn unsafe_batches(&self) -> CanonryResult<Vec<UnsafeBatch>> {
        let unsafe_batches = self
            .unsafe_batches
            .lock()
            .map_err(|_| lock_err("writer.unsafe_batches"))?;
        Ok(unsafe_batches.values().cloned().collect())
    }

    /// Returns true if commits are currently refused.
    pub fn is_unsafe(&self) -> CanonryResult<bool> {
        Ok(!self.unsafe_batches()?.is_empty())
    }

    /// Status of a batch that went UNSAFE; `None` for anything else.
    pub fn status(&self, batch_id: BatchId) -> CanonryResult<Option<BatchStatus>> {
        let statuses = self.statuses.lock().map_err(|_| lock_err("writer.statuses"))?;
        Ok(statuses.get(&batch_id).copied())
    }

    /// Re-installs UNSAFE reports persisted by an earlier process.
    pub fn restore_unsafe(&self, reports: Vec<UnsafeBatch>) -> CanonryResult<()> {
        for report in reports {
            self.mark_unsafe(report)?;
        }
        Ok(())
    }

    /// Writes the unacknowledged UNSAFE reports as JSON.
    pub fn save_unsafe(&self, path: impl AsRef<Path>) -> CanonryResult<()> {
        let path = path.as_ref();
        let reports = self.unsafe_batches()?;
        let json = serde_json::to_vec_pretty(&reports).map_err(CanonryError::serialization)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| CanonryError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| CanonryError::io(path, e))
    }

    /// Restores UNSAFE reports from a file written by [`GraphWriter::save_unsafe`].
    ///
    /// A missing file means nothing is UNSAFE.
    pub fn load_unsafe(&self, path: impl AsRef<Path>) -> CanonryResult<usize> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(0);
        }
        let bytes = fs::read(path).map_err(|e| CanonryError::io(path, e))?;
        let reports: Vec<UnsafeBatch> = serde_json::from_slice(&bytes).map_err(CanonryError::serialization)?;
        let count = reports.len();
        self.restore_unsafe(reports)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{AttributeMap, EntityId, EntityType};
    use crate::graph::canary::CanaryQuery;
    use crate::graph::memory::InMemoryGraph;
    use crate::graph::traits::{GraphNode, NodeKey};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn case() -> NodeKey {
        NodeKey::in_default_namespace(EntityType::Case, "Smith v. Jones")
    }

    fn case_edges() -> CanaryQuery {
        CanaryQuery::RelationshipCount {
            anchor: Some(case()),
            relationship: None,
        }
    }

    fn attorney_batch(names: &[&str], link_to_case: bool) -> GraphBatch {
        let mut batch = GraphBatch::new("attorney");
        for name in names {
            let key = NodeKey::in_default_namespace(EntityType::Attorney, *name);
            batch.entities.push(EntityUpsert {
                key: key.clone(),
                entity_id: EntityId::new(),
                attributes: AttributeMap::new(),
                aliases: Vec::new(),
                provenance: Vec::new(),
            });
            if link_to_case {
                batch.relationships.push(RelationshipUpsert {
                    source: key,
                    target: case(),
                    relationship: "represents_in".to_string(),
                });
            }
        }
        batch
    }

    #[test]
    fn test_commit_and_idempotent_rerun() {
        let writer = GraphWriter::new(Arc::new(InMemoryGraph::new()), Vec::new());
        let batch = attorney_batch(&["Jane Roe", "John Doe"], true);

        let first = writer.commit(batch.clone()).unwrap();
        assert_eq!(first.entities.created, 2);
        assert_eq!(first.relationships.created, 2);

        let second = writer.commit(batch).unwrap();
        assert!(second.is_noop());
        assert_eq!(second.entities.unchanged, 2);
    }

    #[test]
    fn test_canary_mismatch_marks_unsafe_and_blocks() {
        let store = Arc::new(InMemoryGraph::new());
        let writer = GraphWriter::new(store, vec![Canary::unchanged("case edges", case_edges())]);

        let err = writer.commit(attorney_batch(&["Jane Roe"], true)).unwrap_err();
        assert!(err.is_unsafe_state());
        let unsafe_batches = writer.unsafe_batches().unwrap();
        assert_eq!(unsafe_batches.len(), 1);
        assert_eq!(unsafe_batches[0].diffs[0].before, 0);
        assert_eq!(unsafe_batches[0].diffs[0].after, 1);
        assert_eq!(writer.status(unsafe_batches[0].batch_id).unwrap(), Some(BatchStatus::Unsafe));

        // Anything else is refused until acknowledged.
        let refused = writer.commit(attorney_batch(&["John Doe"], false)).unwrap_err();
        assert!(matches!(
            refused,
            CanonryError::Graph(GraphError::UnacknowledgedUnsafe { .. })
        ));

        writer.acknowledge(unsafe_batches[0].batch_id).unwrap();
        assert!(!writer.is_unsafe().unwrap());
        writer.commit(attorney_batch(&["John Doe"], false)).unwrap();
    }

    #[test]
    fn test_precheck_failure_writes_nothing() {
        let store = Arc::new(InMemoryGraph::new());
        let writer = GraphWriter::new(
            Arc::clone(&store) as Arc<dyn GraphStore>,
            vec![Canary::expecting("case edges", case_edges(), 93)],
        );
        let err = writer.commit(attorney_batch(&["Jane Roe"], false)).unwrap_err();
        assert!(matches!(
            err,
            CanonryError::Graph(GraphError::CanaryPrecheckFailed { value: 0, .. })
        ));
        assert_eq!(store.count_nodes(None, None).unwrap(), 0);
        assert!(!writer.is_unsafe().unwrap());
    }

    #[test]
    fn test_scoped_canary_ignores_other_namespaces() {
        let writer = GraphWriter::new(
            Arc::new(InMemoryGraph::new()),
            vec![Canary::unchanged("case edges", case_edges()).scoped("provider")],
        );
        writer.commit(attorney_batch(&["Jane Roe"], true)).unwrap();
    }

    #[test]
    fn test_acknowledge_unknown_batch() {
        let writer = GraphWriter::new(Arc::new(InMemoryGraph::new()), Vec::new());
        let err = writer.acknowledge(BatchId::new()).unwrap_err();
        assert!(matches!(err, CanonryError::Graph(GraphError::UnknownBatch(_))));
    }

    /// Store whose counts start failing after a number of successful reads.
    struct FlakyCounts {
        inner: InMemoryGraph,
        reads_left: AtomicUsize,
    }

    impl FlakyCounts {
        fn new(reads: usize) -> Self {
            Self {
                inner: InMemoryGraph::new(),
                reads_left: AtomicUsize::new(reads),
            }
        }

        fn read(&self) -> Result<(), StorageError> {
            let left = self.reads_left.load(Ordering::SeqCst);
            if left == 0 {
                return Err(StorageError::BackendError("count unavailable".to_string()));
            }
            self.reads_left.store(left - 1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl GraphStore for FlakyCounts {
        fn upsert_entity(&self, upsert: &EntityUpsert) -> Result<UpsertOutcome, StorageError> {
            self.inner.upsert_entity(upsert)
        }

        fn upsert_relationship(&self, upsert: &RelationshipUpsert) -> Result<UpsertOutcome, StorageError> {
            self.inner.upsert_relationship(upsert)
        }

        fn get_entity(&self, key: &NodeKey) -> Result<Option<GraphNode>, StorageError> {
            self.inner.get_entity(key)
        }

        fn count_nodes(
            &self,
            entity_type: Option<&EntityType>,
            namespace: Option<&str>,
        ) -> Result<u64, StorageError> {
            self.read()?;
            self.inner.count_nodes(entity_type, namespace)
        }

        fn count_relationships(
            &self,
            anchor: Option<&NodeKey>,
            relationship: Option<&str>,
        ) -> Result<u64, StorageError> {
            self.read()?;
            self.inner.count_relationships(anchor, relationship)
        }
    }

    #[test]
    fn test_failed_canary_reread_marks_unsafe() {
        // One read for the before value, then the store stops answering.
        let store = Arc::new(FlakyCounts::new(1));
        let writer = GraphWriter::new(
            Arc::clone(&store) as Arc<dyn GraphStore>,
            vec![Canary::unchanged("case edges", case_edges())],
        );

        let err = writer.commit(attorney_batch(&["Jane Roe"], true)).unwrap_err();
        assert!(matches!(err, CanonryError::Graph(GraphError::Storage(_))));

        let key = NodeKey::in_default_namespace(EntityType::Attorney, "Jane Roe");
        assert!(store.inner.get_entity(&key).unwrap().is_some());

        assert!(writer.is_unsafe().unwrap());
        let reports = writer.unsafe_batches().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0]
            .write_error
            .as_deref()
            .is_some_and(|m| m.contains("canary re-read failed")));
        assert_eq!(writer.status(reports[0].batch_id).unwrap(), Some(BatchStatus::Unsafe));

        let refused = writer.commit(attorney_batch(&["John Doe"], false)).unwrap_err();
        assert!(matches!(
            refused,
            CanonryError::Graph(GraphError::UnacknowledgedUnsafe { .. })
        ));
    }

    #[test]
    fn test_clean_commits_leave_no_status() {
        let writer = GraphWriter::new(Arc::new(InMemoryGraph::new()), Vec::new());
        for i in 0..500 {
            let report = writer
                .commit(attorney_batch(&[format!("Attorney {i}").as_str()], false))
                .unwrap();
            assert_eq!(writer.status(report.batch_id).unwrap(), None);
        }
        assert!(writer.statuses.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unsafe_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unsafe.json");
        let writer = GraphWriter::new(
            Arc::new(InMemoryGraph::new()),
            vec![Canary::unchanged("case edges", case_edges())],
        );
        assert!(writer.commit(attorney_batch(&["Jane Roe"], true)).is_err());
        writer.save_unsafe(&path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let restarted = GraphWriter::new(Arc::new(InMemoryGraph::new()), Vec::new());
        assert_eq!(restarted.load_unsafe(&path).unwrap(), 1);
        assert!(restarted.commit(attorney_batch(&["John Doe"], false)).is_err());
    }

    #[test]
    fn test_concurrent_commits_across_namespaces() {
        let writer = Arc::new(GraphWriter::new(Arc::new(InMemoryGraph::new()), Vec::new()));
        std::thread::scope(|s| {
            for ns in ["attorney", "provider", "court", "mediator"] {
                let writer = Arc::clone(&writer);
                s.spawn(move || {
                    let mut batch = GraphBatch::new(ns);
                    batch.entities.push(EntityUpsert {
                        key: NodeKey::new(EntityType::Organization, ns, "Shared Name"),
                        entity_id: EntityId::new(),
                        attributes: AttributeMap::new(),
                        aliases: Vec::new(),
                        provenance: Vec::new(),
                    });
                    writer.commit(batch).unwrap();
                });
            }
        });
        assert_eq!(writer.store().count_nodes(None, None).unwrap(), 4);
    }
}
