//! Knowledge graph commit path.
//!
//! The store trait and its in-memory backend, canary invariants, and the
//! writer that ties them together.

mod canary;
mod memory;
mod traits;
mod writer;

pub use canary::{Canary, CanaryCheck, CanaryDiff, CanaryQuery, Comparator};
pub use memory::InMemoryGraph;
pub use traits::{
    EntityUpsert, GraphNode, GraphStore, NodeKey, RelationshipUpsert, StorageError, UpsertOutcome,
};
pub use writer::{
    BatchId, BatchStatus, CommitReport, GraphBatch, GraphWriter, UnsafeBatch, UpsertCounts,
};
