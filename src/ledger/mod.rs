//! Review Ledger.
//!
//! Human-in-the-loop workflow for MEDIUM matches: pending items are rendered
//! into one document per entity type, annotations are parsed back into
//! decisions, and settled items are recorded in an append-only ledger so
//! they never reappear. Unannotated items carry forward unchanged.

mod annotation;
mod document;
mod queue;
mod settled;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classify::Assessment;
use crate::entity::EntityType;
use crate::error::CanonryResult;

pub use annotation::{parse_annotation, Decision, FIRM_ATTRIBUTE};
pub use document::{parse as parse_document, render as render_document, MalformedLine, ParsedDocument, RankedName, ReviewLine};
pub use queue::{PendingItem, PendingQueue};
pub use settled::{decode_line, encode_line, SettledEntry, SettledLedger, SettledOutcome};

/// File name of the pending queue inside a ledger directory.
pub const PENDING_FILE: &str = "pending.json";

/// File name of the settled ledger inside a ledger directory.
pub const SETTLED_FILE: &str = "settled.ledger";

/// Stable identifier of a review item.
///
/// First 16 hex characters of the BLAKE3 hash of
/// `entity_type \0 normalized_name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Number of hex characters kept.
    pub const LEN: usize = 16;

    /// Computes the id of a normalized candidate.
    #[must_use]
    pub fn compute(entity_type: &EntityType, normalized: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(entity_type.key().as_bytes());
        hasher.update(&[0]);
        hasher.update(normalized.as_bytes());
        let hex = hasher.finalize().to_hex();
        Self(hex[..Self::LEN].to_string())
    }

    /// Parses a rendered id.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        (s.len() == Self::LEN && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)))
            .then(|| Self(s.to_string()))
    }

    /// The id as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What `enqueue` did with an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// New pending item.
    Queued,
    /// Already pending; the sighting was recorded, the item left as is.
    AlreadyPending,
    /// Settled in an earlier batch; not re-queued.
    AlreadySettled,
}

/// A final reviewer decision ready for the merge planner.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// The pending item being resolved.
    pub item: PendingItem,
    /// What the reviewer decided.
    pub decision: Decision,
    /// Annotation text as written.
    pub annotation: String,
}

/// Result of applying an annotated document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewOutcome {
    /// Final decisions, in document order.
    pub resolutions: Vec<Resolution>,
    /// Items whose annotation was unclear.
    pub clarifications: Vec<ItemId>,
    /// Items that gained a context note.
    pub noted: Vec<ItemId>,
    /// Items left blank.
    pub untouched: usize,
    /// Ids not pending (unknown, or settled meanwhile).
    pub unknown: Vec<ItemId>,
    /// Lines that could not be parsed.
    pub malformed: Vec<MalformedLine>,
}

/// Pending queue plus settled ledger.
#[derive(Debug, Default)]
pub struct ReviewLedger {
    queue: PendingQueue,
    settled: SettledLedger,
}

impl ReviewLedger {
    /// A ledger held only in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens the ledger files in `dir`.
    pub fn open(dir: impl AsRef<Path>) -> CanonryResult<Self> {
        let dir = dir.as_ref();
        Ok(Self {
            queue: PendingQueue::open(dir.join(PENDING_FILE))?,
            settled: SettledLedger::open(dir.join(SETTLED_FILE))?,
        })
    }

    /// Pending items.
    #[must_use]
    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    /// Settled items.
    #[must_use]
    pub fn settled(&self) -> &SettledLedger {
        &self.settled
    }

    /// Queues an assessment for review.
    pub fn enqueue(&mut self, assessment: Assessment) -> EnqueueOutcome {
        if self.settled.contains(&assessment.item_id) {
            debug!(item_id = %assessment.item_id, "item already settled, not re-queued");
            return EnqueueOutcome::AlreadySettled;
        }
        let provenance = assessment.candidate.provenance.clone();
        let (item, inserted) = self.queue.insert(assessment);
        if inserted {
            EnqueueOutcome::Queued
        } else {
            item.record_sighting(&provenance);
            EnqueueOutcome::AlreadyPending
        }
    }

    /// Renders the review document for one entity type.
    #[must_use]
    pub fn render(&self, entity_type: &EntityType) -> String {
        let lines: Vec<ReviewLine> = self
            .queue
            .for_type(entity_type)
            .into_iter()
            .map(review_line)
            .collect();
        render_document(entity_type, &lines)
    }

    /// Parses an annotated document and applies non-final decisions.
    ///
    /// Context notes and unclear annotations are recorded on the pending
    /// item right away. Final decisions are returned for the caller to plan
    /// and commit; the items stay pending until [`ReviewLedger::settle`].
    pub fn apply_document(&mut self, text: &str) -> ReviewOutcome {
        let doc = parse_document(text);
        let mut outcome = ReviewOutcome {
            malformed: doc.malformed,
            ..ReviewOutcome::default()
        };
        for malformed in &outcome.malformed {
            warn!(line = malformed.line, reason = %malformed.reason, "skipping malformed review line");
        }

        for line in doc.lines {
            let Some(item) = self.queue.get_mut(&line.item_id) else {
                if self.settled.contains(&line.item_id) {
                    debug!(item_id = %line.item_id, "review line for already settled item");
                } else {
                    warn!(item_id = %line.item_id, "review line for unknown item");
                }
                outcome.unknown.push(line.item_id);
                continue;
            };

            match parse_annotation(&line.annotation) {
                None => outcome.untouched += 1,
                Some(Decision::Context { text }) => {
                    item.add_note(&text);
                    item.last_annotation = None;
                    outcome.noted.push(line.item_id);
                }
                Some(Decision::NeedsClarification { raw }) => {
                    debug!(item_id = %line.item_id, annotation = %raw, "annotation needs clarification");
                    item.last_annotation = Some(raw);
                    outcome.clarifications.push(line.item_id);
                }
                Some(decision) => outcome.resolutions.push(Resolution {
                    item: item.clone(),
                    decision,
                    annotation: line.annotation.trim().to_string(),
                }),
            }
        }

        info!(
            resolved = outcome.resolutions.len(),
            unclear = outcome.clarifications.len(),
            noted = outcome.noted.len(),
            untouched = outcome.untouched,
            unknown = outcome.unknown.len(),
            "review document applied"
        );
        outcome
    }

    /// Keeps an item pending with an annotation that could not be acted on.
    pub fn mark_unclear(&mut self, item_id: &ItemId, annotation: impl Into<String>) -> bool {
        match self.queue.get_mut(item_id) {
            Some(item) => {
                item.last_annotation = Some(annotation.into());
                true
            }
            None => false,
        }
    }

    /// Records a final outcome and drops the item from the queue.
    ///
    /// Items not in the queue (auto-merged ones) are settled too.
    pub fn settle(&mut self, entry: SettledEntry) -> CanonryResult<bool> {
        self.queue.remove(&entry.item_id);
        Ok(self.settled.settle(entry)?)
    }

    /// Writes the pending queue. The settled ledger is written on append.
    pub fn persist(&self) -> CanonryResult<()> {
        Ok(self.queue.save()?)
    }
}

fn review_line(item: &PendingItem) -> ReviewLine {
    let assessment = &item.assessment;
    ReviewLine {
        item_id: assessment.item_id.clone(),
        candidate_name: assessment.candidate.name.clone(),
        source: item
            .provenance()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; "),
        matches: assessment
            .matches
            .iter()
            .map(|m| RankedName {
                name: m.canonical.canonical_name.clone(),
                score: m.score,
            })
            .collect(),
        annotation: item.last_annotation.clone().unwrap_or_default(),
        notes: item.notes.clone(),
    }
}
