//! # canonry - Entity Resolution for Canonical Directories
//!
//! canonry reconciles duplicate, inconsistently-named records harvested from
//! many sources (scrapes, PDF extracts, legacy exports) into one canonical,
//! deduplicated directory that feeds a shared knowledge graph.
//!
//! ## Core Concepts
//!
//! - **Candidate**: a raw, not-yet-resolved mention of an entity from one source
//! - **Canonical entity**: the single authoritative record for a real-world entity
//! - **Tier**: the confidence bucket of a match (EXACT, HIGH, MEDIUM, LOW)
//! - **Review ledger**: the human-in-the-loop document and settled-item store
//! - **Canary**: a named graph query checked before and after every commit
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use canonry::{
//!     CandidateRecord, CanonicalDirectory, EntityType, InMemoryGraph, Provenance, Resolver,
//!     ResolverConfig, ReviewLedger,
//! };
//!
//! let resolver = Resolver::new(ResolverConfig::default(), Arc::new(InMemoryGraph::new()));
//! let mut directory = CanonicalDirectory::new();
//! let mut ledger = ReviewLedger::in_memory();
//!
//! let batch = vec![CandidateRecord::new(
//!     "Norton Hospital",
//!     EntityType::Provider,
//!     Provenance::new("provider_scrape", "np-17"),
//! )];
//! let outcome = resolver.run_batch(batch, &mut directory, &mut ledger)?;
//! assert_eq!(outcome.created(), 1);
//! # Ok::<(), canonry::CanonryError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Data model
pub mod candidate;
pub mod config;
pub mod entity;
pub mod error;
pub mod provenance;

// Resolution stages
pub mod classify;
pub mod matcher;
pub mod merge;
pub mod normalize;
pub mod similarity;
pub mod snapshot;

// Persistence and side effects
pub mod consolidate;
pub mod directory;
pub mod graph;
pub mod ledger;

// Orchestration
pub mod pipeline;

// Re-export primary types at crate root for convenience
pub use candidate::{read_candidates, CandidateLink, CandidateRecord, IngestReport};
pub use classify::{Assessment, Classifier, Thresholds, Tier};
pub use config::{ResolverConfig, TypeProfile};
pub use consolidate::{ConsolidationReport, Consolidator, FileClass, FileConflict};
pub use directory::CanonicalDirectory;
pub use entity::{AttributeMap, CanonicalEntity, EntityId, EntityType, NameKind};
pub use error::{CanonryError, CanonryResult, ValidationError};
pub use graph::{
    BatchId, Canary, CanaryQuery, Comparator, CommitReport, GraphBatch, GraphStore, GraphWriter,
    InMemoryGraph, NodeKey,
};
pub use ledger::{Decision, ItemId, ReviewLedger};
pub use matcher::{MatchResult, Matcher};
pub use merge::{FolderMerge, HumanOverride, MergeDecision, MergePlanner};
pub use normalize::{normalize, Normalizer};
pub use pipeline::{BatchOutcome, Resolver, ReviewApplied};
pub use provenance::Provenance;
