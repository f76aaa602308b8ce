//! Abstract graph store contract.
//!
//! The store speaks an upsert protocol only: entities are keyed by
//! `(entity_type, namespace, name)` and relationships by
//! `(source key, target key, relationship)`. Every call is idempotent.
//! Backends give no multi-statement transaction guarantee; consistency is
//! checked after the fact by canaries.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::{AttributeMap, EntityId, EntityType};
use crate::provenance::Provenance;

/// Errors that can occur during graph storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Node not found.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeKey),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Connection failed.
    #[error("Connection error: {0}")]
    ConnectionError(String),
}

/// Unique key of a graph node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    /// Node type.
    pub entity_type: EntityType,
    /// Uniqueness scope within the type.
    pub namespace: String,
    /// Canonical name.
    pub name: String,
}

impl NodeKey {
    /// Creates a node key.
    #[must_use]
    pub fn new(entity_type: EntityType, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            entity_type,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key in the type's default namespace.
    #[must_use]
    pub fn in_default_namespace(entity_type: EntityType, name: impl Into<String>) -> Self {
        let namespace = entity_type.key();
        Self::new(entity_type, namespace, name)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.entity_type, self.namespace, self.name)
    }
}

/// Entity upsert request.
///
/// Creating sets everything; matching an existing node fills only empty
/// attributes and unions aliases and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityUpsert {
    /// Node to create or update.
    pub key: NodeKey,
    /// Id of the canonical entity.
    pub entity_id: EntityId,
    /// Attributes to fill.
    #[serde(default)]
    pub attributes: AttributeMap,
    /// Aliases to union in.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Provenance to union in.
    #[serde(default)]
    pub provenance: Vec<Provenance>,
}

/// Relationship upsert request. Created only if absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipUpsert {
    /// Edge origin.
    pub source: NodeKey,
    /// Edge target.
    pub target: NodeKey,
    /// Edge type.
    pub relationship: String,
}

/// A stored graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Node key.
    pub key: NodeKey,
    /// Id of the canonical entity.
    pub entity_id: EntityId,
    /// Stored attributes.
    pub attributes: AttributeMap,
    /// Known aliases.
    pub aliases: Vec<String>,
    /// Contributing sources.
    pub provenance: Vec<Provenance>,
    /// When the node was created.
    pub created_at: DateTime<Utc>,
    /// Set when a later upsert changed the node.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// A new node or edge was written.
    Created,
    /// An existing node gained data.
    Updated,
    /// Nothing changed.
    Unchanged,
}

/// Storage contract for the knowledge graph.
///
/// # Safety Considerations
/// - Implementations must handle concurrent access safely
/// - Each call must be individually atomic; batches are not
pub trait GraphStore: Send + Sync {
    /// Creates or merges a node.
    fn upsert_entity(&self, upsert: &EntityUpsert) -> Result<UpsertOutcome, StorageError>;

    /// Creates an edge unless an identical one exists.
    fn upsert_relationship(&self, upsert: &RelationshipUpsert) -> Result<UpsertOutcome, StorageError>;

    /// Gets a node by key.
    fn get_entity(&self, key: &NodeKey) -> Result<Option<GraphNode>, StorageError>;

    /// Counts nodes, optionally filtered by type and namespace.
    fn count_nodes(
        &self,
        entity_type: Option<&EntityType>,
        namespace: Option<&str>,
    ) -> Result<u64, StorageError>;

    /// Counts edges touching `anchor` (either end), optionally by type.
    fn count_relationships(
        &self,
        anchor: Option<&NodeKey>,
        relationship: Option<&str>,
    ) -> Result<u64, StorageError>;
}
