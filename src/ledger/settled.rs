//! Append-only settled-item ledger.
//!
//! Each line is `<crc32 hex8> <json>`, where the checksum covers the JSON
//! bytes. Lines that fail the checksum or do not decode are skipped with a
//! warning on load, as are lines that are not valid UTF-8; a torn final
//! write therefore loses only that entry.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::entity::EntityType;
use crate::error::LedgerError;
use crate::ledger::ItemId;

/// How an item was settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SettledOutcome {
    /// Dropped without a graph write.
    Ignored,
    /// Merged into an existing entity.
    Merged {
        /// Entity merged into.
        canonical_name: String,
    },
    /// Seeded a new entity.
    Created {
        /// Name of the new entity.
        canonical_name: String,
    },
    /// Sent to another entity type.
    Rerouted {
        /// Type it was sent to.
        entity_type: EntityType,
    },
}

/// One settled item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettledEntry {
    /// Settled item.
    pub item_id: ItemId,
    /// Type the item was reviewed under.
    pub entity_type: EntityType,
    /// Candidate name as received.
    pub candidate_name: String,
    /// How it was settled.
    #[serde(flatten)]
    pub outcome: SettledOutcome,
    /// When it was settled.
    pub settled_at: DateTime<Utc>,
}

impl SettledEntry {
    /// Creates an entry stamped now.
    #[must_use]
    pub fn new(
        item_id: ItemId,
        entity_type: EntityType,
        candidate_name: impl Into<String>,
        outcome: SettledOutcome,
    ) -> Self {
        Self {
            item_id,
            entity_type,
            candidate_name: candidate_name.into(),
            outcome,
            settled_at: Utc::now(),
        }
    }
}

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Encodes one entry as a ledger line (without the newline).
pub fn encode_line(entry: &SettledEntry) -> Result<String, LedgerError> {
    let json = serde_json::to_string(entry).map_err(|e| LedgerError::Encode {
        message: e.to_string(),
    })?;
    Ok(format!("{:08x} {json}", checksum(json.as_bytes())))
}

/// Decodes one ledger line, verifying its checksum.
pub fn decode_line(line: &str) -> Result<SettledEntry, String> {
    let (crc, json) = line
        .split_once(' ')
        .ok_or_else(|| "missing checksum separator".to_string())?;
    let stored = u32::from_str_radix(crc, 16).map_err(|_| format!("invalid checksum '{crc}'"))?;
    let computed = checksum(json.as_bytes());
    if stored != computed {
        return Err(format!(
            "CRC mismatch: stored={stored:08x}, computed={computed:08x}"
        ));
    }
    serde_json::from_str(json).map_err(|e| format!("deserialization failed: {e}"))
}

/// Membership store of settled item ids.
#[derive(Debug, Default)]
pub struct SettledLedger {
    path: Option<PathBuf>,
    index: HashMap<ItemId, SettledEntry>,
    skipped: usize,
    // Last line on disk lacks its newline; the next append starts a fresh line.
    torn_tail: bool,
}

impl SettledLedger {
    /// A ledger that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens (or starts) a ledger file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let mut ledger = Self {
            path: Some(path.to_path_buf()),
            ..Self::default()
        };
        if !path.exists() {
            return Ok(ledger);
        }

        let bytes = fs::read(path).map_err(|source| LedgerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        ledger.torn_tail = !bytes.is_empty() && !bytes.ends_with(b"\n");
        for (index, raw) in bytes.split(|b| *b == b'\n').enumerate() {
            let decoded = std::str::from_utf8(raw)
                .map_err(|e| format!("invalid UTF-8: {e}"))
                .and_then(|line| {
                    let line = line.trim_end_matches('\r');
                    if line.trim().is_empty() {
                        Ok(None)
                    } else {
                        decode_line(line).map(Some)
                    }
                });
            match decoded {
                Ok(None) => {}
                Ok(Some(entry)) => {
                    ledger.index.entry(entry.item_id.clone()).or_insert(entry);
                }
                Err(reason) => {
                    warn!(path = %path.display(), line = index + 1, %reason, "skipping corrupt settled-ledger line");
                    ledger.skipped += 1;
                }
            }
        }
        debug!(path = %path.display(), settled = ledger.index.len(), skipped = ledger.skipped, "settled ledger loaded");
        Ok(ledger)
    }

    /// Returns true if the item has been settled.
    #[must_use]
    pub fn contains(&self, item_id: &ItemId) -> bool {
        self.index.contains_key(item_id)
    }

    /// Looks up a settled item.
    #[must_use]
    pub fn get(&self, item_id: &ItemId) -> Option<&SettledEntry> {
        self.index.get(item_id)
    }

    /// Appends an entry. Settling an already-settled id is a no-op.
    ///
    /// Returns true if the entry was new.
    pub fn settle(&mut self, entry: SettledEntry) -> Result<bool, LedgerError> {
        if self.contains(&entry.item_id) {
            return Ok(false);
        }
        if let Some(path) = &self.path {
            let line = encode_line(&entry)?;
            let io_err = |source| LedgerError::Io {
                path: path.clone(),
                source,
            };
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(io_err)?;
            if self.torn_tail {
                writeln!(file).map_err(io_err)?;
            }
            writeln!(file, "{line}").map_err(io_err)?;
            file.sync_data().map_err(io_err)?;
            self.torn_tail = false;
        }
        self.index.insert(entry.item_id.clone(), entry);
        Ok(true)
    }

    /// Number of settled items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true if nothing has been settled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Corrupt lines skipped on load.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }
}
