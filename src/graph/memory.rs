//! In-memory graph store.
//!
//! Thread-safe reference implementation of [`GraphStore`], used by the CLI
//! (persisted as JSON between runs) and by tests.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::RwLock;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entity::EntityType;
use crate::error::{CanonryError, CanonryResult};
use crate::graph::traits::{
    EntityUpsert, GraphNode, GraphStore, NodeKey, RelationshipUpsert, StorageError, UpsertOutcome,
};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

#[derive(Debug, Default)]
struct GraphState {
    nodes: BTreeMap<NodeKey, GraphNode>,
    edges: BTreeSet<RelationshipUpsert>,
}

/// On-disk form of the graph.
#[derive(Debug, Default, Serialize, Deserialize)]
struct GraphFile {
    nodes: Vec<GraphNode>,
    relationships: Vec<RelationshipUpsert>,
}

/// Merges an upsert into an existing node without overwriting anything.
///
/// Returns true if the node changed.
fn merge_into(node: &mut GraphNode, upsert: &EntityUpsert) -> bool {
    let mut changed = false;
    for (key, value) in &upsert.attributes {
        if value.trim().is_empty() {
            continue;
        }
        let slot = node.attributes.entry(key.clone()).or_default();
        if slot.trim().is_empty() {
            slot.clone_from(value);
            changed = true;
        }
    }
    for alias in &upsert.aliases {
        if alias != &node.key.name && !node.aliases.contains(alias) {
            node.aliases.push(alias.clone());
            changed = true;
        }
    }
    for provenance in &upsert.provenance {
        if !node.provenance.contains(provenance) {
            node.provenance.push(provenance.clone());
            changed = true;
        }
    }
    changed
}

/// In-memory implementation of [`GraphStore`].
#[derive(Debug, Default)]
pub struct InMemoryGraph {
    state: RwLock<GraphState>,
}

impl InMemoryGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a graph saved with [`InMemoryGraph::save`]; a missing file is an empty graph.
    pub fn load(path: impl AsRef<Path>) -> CanonryResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let bytes = fs::read(path).map_err(|e| CanonryError::io(path, e))?;
        let file: GraphFile = serde_json::from_slice(&bytes).map_err(CanonryError::serialization)?;
        let state = GraphState {
            nodes: file.nodes.into_iter().map(|n| (n.key.clone(), n)).collect(),
            edges: file.relationships.into_iter().collect(),
        };
        debug!(path = %path.display(), nodes = state.nodes.len(), edges = state.edges.len(), "graph loaded");
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Writes the whole graph as JSON, replacing the file atomically.
    pub fn save(&self, path: impl AsRef<Path>) -> CanonryResult<()> {
        let path = path.as_ref();
        let json = {
            let state = self.state.read().map_err(|_| lock_err("graph.save"))?;
            let file = GraphFile {
                nodes: state.nodes.values().cloned().collect(),
                relationships: state.edges.iter().cloned().collect(),
            };
            serde_json::to_vec_pretty(&file).map_err(CanonryError::serialization)?
        };
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| CanonryError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| CanonryError::io(path, e))
    }

    /// Every relationship, in key order.
    pub fn relationships(&self) -> Result<Vec<RelationshipUpsert>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("graph.relationships"))?;
        Ok(state.edges.iter().cloned().collect())
    }

    /// Every node, in key order.
    pub fn nodes(&self) -> Result<Vec<GraphNode>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("graph.nodes"))?;
        Ok(state.nodes.values().cloned().collect())
    }
}

impl GraphStore for InMemoryGraph {
    fn upsert_entity(&self, upsert: &EntityUpsert) -> Result<UpsertOutcome, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("graph.upsert_entity"))?;
        if let Some(node) = state.nodes.get_mut(&upsert.key) {
            if merge_into(node, upsert) {
                node.updated_at = Some(Utc::now());
                return Ok(UpsertOutcome::Updated);
            }
            return Ok(UpsertOutcome::Unchanged);
        }

        let node = GraphNode {
            key: upsert.key.clone(),
            entity_id: upsert.entity_id,
            attributes: upsert
                .attributes
                .iter()
                .filter(|(_, v)| !v.trim().is_empty())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            aliases: upsert
                .aliases
                .iter()
                .filter(|a| *a != &upsert.key.name)
                .cloned()
                .collect(),
            provenance: upsert.provenance.clone(),
            created_at: Utc::now(),
            updated_at: None,
        };
        state.nodes.insert(upsert.key.clone(), node);
        Ok(UpsertOutcome::Created)
    }

    fn upsert_relationship(&self, upsert: &RelationshipUpsert) -> Result<UpsertOutcome, StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("graph.upsert_relationship"))?;
        if state.edges.insert(upsert.clone()) {
            Ok(UpsertOutcome::Created)
        } else {
            Ok(UpsertOutcome::Unchanged)
        }
    }

    fn get_entity(&self, key: &NodeKey) -> Result<Option<GraphNode>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("graph.get_entity"))?;
        Ok(state.nodes.get(key).cloned())
    }

    fn count_nodes(
        &self,
        entity_type: Option<&EntityType>,
        namespace: Option<&str>,
    ) -> Result<u64, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("graph.count_nodes"))?;
        let count = state
            .nodes
            .keys()
            .filter(|k| entity_type.map_or(true, |t| &k.entity_type == t))
            .filter(|k| namespace.map_or(true, |ns| k.namespace == ns))
            .count();
        Ok(count as u64)
    }

    fn count_relationships(
        &self,
        anchor: Option<&NodeKey>,
        relationship: Option<&str>,
    ) -> Result<u64, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("graph.count_relationships"))?;
        let count = state
            .edges
            .iter()
            .filter(|e| anchor.map_or(true, |a| &e.source == a || &e.target == a))
            .filter(|e| relationship.map_or(true, |r| e.relationship == r))
            .count();
        Ok(count as u64)
    }
}
