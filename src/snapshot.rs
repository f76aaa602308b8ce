//! Immutable canonical-set snapshots.
//!
//! A snapshot is taken once per batch and shared read-only by every matching
//! worker. Normalized forms of canonical names and aliases are computed up
//! front and entities are partitioned by `(entity_type, namespace)` so a
//! candidate is only ever compared against its own partition.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entity::{CanonicalEntity, EntityId, EntityType};
use crate::normalize::{fold, Normalizer};

/// Partition key of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    /// Entity type.
    pub entity_type: EntityType,
    /// Namespace within the type.
    pub namespace: String,
}

impl PartitionKey {
    /// Creates a partition key.
    #[must_use]
    pub fn new(entity_type: EntityType, namespace: impl Into<String>) -> Self {
        Self {
            entity_type,
            namespace: namespace.into(),
        }
    }
}

/// A name an entity is known by, with its normalized form.
#[derive(Debug, Clone)]
pub struct KnownName {
    /// Name as stored.
    pub raw: String,
    /// Normalized form.
    pub normalized: String,
}

/// One canonical entity as seen by the matcher.
#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    /// Shared entity.
    pub entity: Arc<CanonicalEntity>,
    /// Canonical name first, then aliases.
    pub names: Vec<KnownName>,
}

/// Read-only view of the canonical set for one batch.
#[derive(Debug, Default)]
pub struct CanonicalSnapshot {
    partitions: HashMap<PartitionKey, Vec<SnapshotEntry>>,
    by_id: HashMap<EntityId, Arc<CanonicalEntity>>,
}

impl CanonicalSnapshot {
    /// Builds a snapshot, normalizing every canonical name and alias.
    #[must_use]
    pub fn build<I>(entities: I, normalizer: &Normalizer) -> Self
    where
        I: IntoIterator<Item = CanonicalEntity>,
    {
        let mut snapshot = Self::default();
        for entity in entities {
            let entity = Arc::new(entity);
            let names = entity
                .names()
                .map(|raw| KnownName {
                    raw: raw.to_string(),
                    normalized: normalizer.normalize(raw, &entity.entity_type),
                })
                .collect();
            let key = PartitionKey::new(entity.entity_type.clone(), entity.namespace.clone());
            snapshot.by_id.insert(entity.id, Arc::clone(&entity));
            snapshot
                .partitions
                .entry(key)
                .or_default()
                .push(SnapshotEntry { entity, names });
        }
        for entries in snapshot.partitions.values_mut() {
            entries.sort_by(|a, b| {
                a.entity
                    .canonical_name
                    .cmp(&b.entity.canonical_name)
                    .then_with(|| a.entity.id.cmp(&b.entity.id))
            });
        }
        snapshot
    }

    /// Entities of one type and namespace.
    #[must_use]
    pub fn partition(&self, entity_type: &EntityType, namespace: &str) -> &[SnapshotEntry] {
        self.partitions
            .get(&PartitionKey::new(entity_type.clone(), namespace))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Looks up an entity by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Arc<CanonicalEntity>> {
        self.by_id.get(&id)
    }

    /// Finds an entity by canonical name or alias within a partition.
    ///
    /// Tries an exact match first, then a case/punctuation-insensitive one,
    /// then the normalized form. Returns `None` when the name is ambiguous.
    #[must_use]
    pub fn find_by_name(
        &self,
        entity_type: &EntityType,
        namespace: &str,
        name: &str,
        normalizer: &Normalizer,
    ) -> Option<&Arc<CanonicalEntity>> {
        let entries = self.partition(entity_type, namespace);

        let exact: Vec<_> = entries
            .iter()
            .filter(|e| e.names.iter().any(|n| n.raw == name))
            .collect();
        if exact.len() == 1 {
            return Some(&exact[0].entity);
        }

        let folded = fold(name);
        let loose: Vec<_> = entries
            .iter()
            .filter(|e| e.names.iter().any(|n| fold(&n.raw) == folded))
            .collect();
        if loose.len() == 1 {
            return Some(&loose[0].entity);
        }

        let normalized = normalizer.normalize(name, entity_type);
        let by_norm: Vec<_> = entries
            .iter()
            .filter(|e| e.names.iter().any(|n| n.normalized == normalized))
            .collect();
        if by_norm.len() == 1 {
            Some(&by_norm[0].entity)
        } else {
            None
        }
    }

    /// Total number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns true if the snapshot has no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
