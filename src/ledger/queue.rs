//! Pending review queue.
//!
//! Items waiting for a reviewer, persisted as JSON between batches with
//! everything needed to re-render them and to act on the eventual decision.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::Assessment;
use crate::entity::EntityType;
use crate::error::LedgerError;
use crate::ledger::ItemId;
use crate::provenance::Provenance;

/// A review item waiting for an annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingItem {
    /// Assessment that sent the item to review.
    pub assessment: Assessment,

    /// Provenance of later sightings of the same normalized name.
    #[serde(default)]
    pub also_seen: Vec<Provenance>,

    /// Context notes left by reviewers.
    #[serde(default)]
    pub notes: Vec<String>,

    /// Last annotation that could not be understood, shown again verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_annotation: Option<String>,

    /// When the item was first queued.
    pub queued_at: DateTime<Utc>,
}

impl PendingItem {
    /// Wraps a fresh assessment.
    #[must_use]
    pub fn new(assessment: Assessment) -> Self {
        Self {
            assessment,
            also_seen: Vec::new(),
            notes: Vec::new(),
            last_annotation: None,
            queued_at: Utc::now(),
        }
    }

    /// Stable id of the item.
    #[must_use]
    pub fn item_id(&self) -> &ItemId {
        &self.assessment.item_id
    }

    /// Entity type the candidate was matched as.
    #[must_use]
    pub fn entity_type(&self) -> &EntityType {
        &self.assessment.candidate.entity_type
    }

    /// Every provenance entry behind this item, first sighting first.
    pub fn provenance(&self) -> impl Iterator<Item = &Provenance> {
        std::iter::once(&self.assessment.candidate.provenance).chain(self.also_seen.iter())
    }

    /// Records another sighting. Returns true if it was new.
    pub fn record_sighting(&mut self, provenance: &Provenance) -> bool {
        if self.provenance().any(|p| p == provenance) {
            return false;
        }
        self.also_seen.push(provenance.clone());
        true
    }

    /// Adds a context note unless already present.
    pub fn add_note(&mut self, note: &str) -> bool {
        if self.notes.iter().any(|n| n == note) {
            return false;
        }
        self.notes.push(note.to_string());
        true
    }
}

/// Pending items keyed by id.
#[derive(Debug, Default)]
pub struct PendingQueue {
    path: Option<PathBuf>,
    items: BTreeMap<ItemId, PendingItem>,
}

impl PendingQueue {
    /// A queue that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads a queue file; a missing file is an empty queue.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let mut queue = Self {
            path: Some(path.to_path_buf()),
            items: BTreeMap::new(),
        };
        if !path.exists() {
            return Ok(queue);
        }
        let bytes = fs::read(path).map_err(|source| LedgerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let items: Vec<PendingItem> =
            serde_json::from_slice(&bytes).map_err(|e| LedgerError::CorruptQueue {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        queue.items = items
            .into_iter()
            .map(|item| (item.item_id().clone(), item))
            .collect();
        debug!(path = %path.display(), pending = queue.items.len(), "pending queue loaded");
        Ok(queue)
    }

    /// Writes the queue back to its file, if it has one.
    pub fn save(&self) -> Result<(), LedgerError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let items: Vec<&PendingItem> = self.items.values().collect();
        let json = serde_json::to_vec_pretty(&items).map_err(|e| LedgerError::Encode {
            message: e.to_string(),
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| LedgerError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| LedgerError::Io {
            path: path.clone(),
            source,
        })
    }

    /// Inserts an item, or returns the existing one untouched.
    ///
    /// Returns the stored item and whether it was newly inserted.
    pub fn insert(&mut self, assessment: Assessment) -> (&mut PendingItem, bool) {
        use std::collections::btree_map::Entry;
        match self.items.entry(assessment.item_id.clone()) {
            Entry::Occupied(existing) => (existing.into_mut(), false),
            Entry::Vacant(slot) => (slot.insert(PendingItem::new(assessment)), true),
        }
    }

    /// Looks up an item.
    #[must_use]
    pub fn get(&self, item_id: &ItemId) -> Option<&PendingItem> {
        self.items.get(item_id)
    }

    /// Looks up an item mutably.
    pub fn get_mut(&mut self, item_id: &ItemId) -> Option<&mut PendingItem> {
        self.items.get_mut(item_id)
    }

    /// Removes an item.
    pub fn remove(&mut self, item_id: &ItemId) -> Option<PendingItem> {
        self.items.remove(item_id)
    }

    /// Items of one entity type, by candidate name then id.
    #[must_use]
    pub fn for_type(&self, entity_type: &EntityType) -> Vec<&PendingItem> {
        let mut items: Vec<&PendingItem> = self
            .items
            .values()
            .filter(|item| item.entity_type() == entity_type)
            .collect();
        items.sort_by(|a, b| {
            a.assessment
                .candidate
                .name
                .cmp(&b.assessment.candidate.name)
                .then_with(|| a.item_id().cmp(b.item_id()))
        });
        items
    }

    /// Entity types with at least one pending item.
    #[must_use]
    pub fn entity_types(&self) -> Vec<EntityType> {
        let mut types: Vec<EntityType> = self.items.values().map(|i| i.entity_type().clone()).collect();
        types.sort();
        types.dedup();
        types
    }

    /// Number of pending items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
