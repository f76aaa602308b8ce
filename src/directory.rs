//! Canonical directory.
//!
//! The authoritative set of canonical entities between batches. Each batch
//! matches against a [`CanonicalSnapshot`] of it; staged changes are applied
//! back only after the graph commit for the batch succeeded.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::entity::{CanonicalEntity, EntityId, EntityType};
use crate::error::{CanonryError, CanonryResult, ValidationError};
use crate::normalize::Normalizer;
use crate::snapshot::CanonicalSnapshot;

/// File name of the directory inside a state directory.
pub const DIRECTORY_FILE: &str = "directory.json";

/// All canonical entities, keyed by id.
#[derive(Debug, Default, Clone)]
pub struct CanonicalDirectory {
    entities: BTreeMap<EntityId, CanonicalEntity>,
}

impl CanonicalDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a directory saved with [`CanonicalDirectory::save`]; a missing file is empty.
    pub fn load(path: impl AsRef<Path>) -> CanonryResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let bytes = fs::read(path).map_err(|e| CanonryError::io(path, e))?;
        let entities: Vec<CanonicalEntity> = serde_json::from_slice(&bytes).map_err(CanonryError::serialization)?;
        let mut directory = Self::new();
        for entity in entities {
            directory.insert(entity)?;
        }
        debug!(path = %path.display(), entities = directory.len(), "canonical directory loaded");
        Ok(directory)
    }

    /// Writes every entity as a JSON array, replacing the file atomically.
    pub fn save(&self, path: impl AsRef<Path>) -> CanonryResult<()> {
        let path = path.as_ref();
        let entities: Vec<&CanonicalEntity> = self.entities.values().collect();
        let json = serde_json::to_vec_pretty(&entities).map_err(CanonryError::serialization)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| CanonryError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| CanonryError::io(path, e))
    }

    fn name_taken(&self, entity: &CanonicalEntity) -> bool {
        self.entities.values().any(|other| {
            other.id != entity.id
                && other.entity_type == entity.entity_type
                && other.namespace == entity.namespace
                && other.canonical_name.eq_ignore_ascii_case(&entity.canonical_name)
        })
    }

    /// Adds a new entity.
    ///
    /// # Errors
    /// `DuplicateCanonical` if the canonical name is already used in the
    /// entity's type and namespace.
    pub fn insert(&mut self, entity: CanonicalEntity) -> CanonryResult<()> {
        self.upsert(entity).map(|_| ())
    }

    /// Inserts or replaces an entity by id. Returns true if it was new.
    ///
    /// # Errors
    /// `DuplicateCanonical` if another entity already holds the canonical name.
    pub fn upsert(&mut self, entity: CanonicalEntity) -> CanonryResult<bool> {
        if self.name_taken(&entity) {
            return Err(ValidationError::DuplicateCanonical {
                entity_type: entity.entity_type.key(),
                namespace: entity.namespace.clone(),
                name: entity.canonical_name,
            }
            .into());
        }
        Ok(self.entities.insert(entity.id, entity).is_none())
    }

    /// Applies the entities produced by a committed batch.
    ///
    /// Returns `(created, updated)`. Nothing is applied if any entity would
    /// violate name uniqueness.
    pub fn apply(&mut self, entities: Vec<CanonicalEntity>) -> CanonryResult<(usize, usize)> {
        let mut staged = self.clone();
        let mut created = 0;
        let mut updated = 0;
        for entity in entities {
            if staged.upsert(entity)? {
                created += 1;
            } else {
                updated += 1;
            }
        }
        *self = staged;
        Ok((created, updated))
    }

    /// Builds the read-only snapshot matching runs against.
    #[must_use]
    pub fn snapshot(&self, normalizer: &Normalizer) -> CanonicalSnapshot {
        CanonicalSnapshot::build(self.entities.values().cloned(), normalizer)
    }

    /// Looks up an entity by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&CanonicalEntity> {
        self.entities.get(&id)
    }

    /// Finds an entity by exact canonical name.
    #[must_use]
    pub fn find(&self, entity_type: &EntityType, namespace: &str, name: &str) -> Option<&CanonicalEntity> {
        self.entities.values().find(|e| {
            &e.entity_type == entity_type && e.namespace == namespace && e.canonical_name == name
        })
    }

    /// Every entity, in id order.
    pub fn entities(&self) -> impl Iterator<Item = &CanonicalEntity> {
        self.entities.values()
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if the directory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_rejects_duplicate_name() {
        let mut dir = CanonicalDirectory::new();
        dir.insert(CanonicalEntity::new("Norton Hospital", EntityType::Provider)).unwrap();
        let err = dir
            .insert(CanonicalEntity::new("NORTON HOSPITAL", EntityType::Provider))
            .unwrap_err();
        assert!(err.is_validation());

        // Other namespaces and types are separate scopes.
        dir.insert(CanonicalEntity::in_namespace("Norton Hospital", EntityType::Provider, "indiana"))
            .unwrap();
        dir.insert(CanonicalEntity::new("Norton Hospital", EntityType::Organization)).unwrap();
        assert_eq!(dir.len(), 3);
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let mut dir = CanonicalDirectory::new();
        let mut norton = CanonicalEntity::new("Norton Hospital", EntityType::Provider);
        dir.insert(norton.clone()).unwrap();

        norton.add_alias("Norton Downtown");
        let fresh = CanonicalEntity::new("Baptist East", EntityType::Provider);
        let clash = CanonicalEntity::new("norton hospital", EntityType::Provider);
        assert!(dir.apply(vec![norton.clone(), fresh.clone(), clash]).is_err());
        assert_eq!(dir.len(), 1);
        assert!(dir.get(norton.id).unwrap().aliases.is_empty());

        assert_eq!(dir.apply(vec![norton.clone(), fresh]).unwrap(), (1, 1));
        assert_eq!(dir.get(norton.id).unwrap().aliases, vec!["Norton Downtown".to_string()]);
    }

    #[test]
    fn test_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(DIRECTORY_FILE);
        assert!(CanonicalDirectory::load(&path).unwrap().is_empty());

        let mut dir = CanonicalDirectory::new();
        dir.insert(CanonicalEntity::new("Jane Roe", EntityType::Attorney)).unwrap();
        dir.save(&path).unwrap();

        let loaded = CanonicalDirectory::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.find(&EntityType::Attorney, "attorney", "Jane Roe").is_some());
        let snapshot = loaded.snapshot(&Normalizer::default());
        assert_eq!(snapshot.partition(&EntityType::Attorney, "attorney").len(), 1);
    }
}
