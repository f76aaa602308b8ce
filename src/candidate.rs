//! Candidate records and ingestion.
//!
//! A candidate is a raw, not-yet-resolved mention of an entity from one
//! source. Producers (scrapers, PDF extractors, legacy exports) hand them over
//! as JSON Lines; bad lines are skipped and reported, never fatal.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::entity::{AttributeMap, EntityType};
use crate::error::{CanonryError, CanonryResult, ValidationError};
use crate::graph::NodeKey;
use crate::provenance::Provenance;

/// Relationship hint attached to a candidate.
///
/// Once the candidate resolves, an edge `canonical -[relationship]-> target`
/// is upserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateLink {
    /// Edge type, e.g. `treated_in`.
    pub relationship: String,
    /// Node at the far end of the edge.
    pub target: NodeKey,
}

/// A raw mention of an entity from a single source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// Name as it appeared in the source.
    pub name: String,

    /// Type the source claims for this entity.
    pub entity_type: EntityType,

    /// Explicit namespace; defaults to the entity type key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Extra fields carried onto the canonical entity.
    #[serde(default)]
    pub attributes: AttributeMap,

    /// Where this mention came from.
    #[serde(default)]
    pub provenance: Provenance,

    /// Edges to upsert once resolved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<CandidateLink>,
}

impl CandidateRecord {
    /// Creates a candidate with no attributes.
    #[must_use]
    pub fn new(name: impl Into<String>, entity_type: EntityType, provenance: Provenance) -> Self {
        Self {
            name: name.into(),
            entity_type,
            namespace: None,
            attributes: AttributeMap::new(),
            provenance,
            links: Vec::new(),
        }
    }

    /// Sets one attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Places the candidate in an explicit namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Adds a relationship hint.
    #[must_use]
    pub fn with_link(mut self, relationship: impl Into<String>, target: NodeKey) -> Self {
        self.links.push(CandidateLink {
            relationship: relationship.into(),
            target,
        });
        self
    }

    /// Effective namespace: explicit one, else the entity type key.
    #[must_use]
    pub fn namespace(&self) -> String {
        self.namespace.clone().unwrap_or_else(|| self.entity_type.key())
    }

    /// Checks the record is usable.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyCandidateName);
        }
        if matches!(&self.namespace, Some(ns) if ns.trim().is_empty()) {
            return Err(ValidationError::MissingField {
                field: "namespace".to_string(),
            });
        }
        Ok(())
    }
}

/// A candidate line that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    /// 1-based line number in the source.
    pub line: usize,
    /// Why the line was skipped.
    pub reason: String,
}

/// Result of reading one candidate source.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Records that parsed.
    pub candidates: Vec<CandidateRecord>,
    /// Lines that did not.
    pub skipped: Vec<SkippedRecord>,
}

impl IngestReport {
    /// Merges another report into this one.
    pub fn extend(&mut self, other: Self) {
        self.candidates.extend(other.candidates);
        self.skipped.extend(other.skipped);
    }
}

/// Reads a JSON Lines candidate file.
///
/// Lines missing a provenance get one pointing at this file and line.
///
/// # Errors
/// Only when the file itself cannot be opened; bad lines are skipped.
pub fn read_candidates(path: impl AsRef<Path>) -> CanonryResult<IngestReport> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| CanonryError::io(path, e))?;
    let origin = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    Ok(parse_candidates(BufReader::new(file), &origin))
}

/// Parses candidates from a JSON Lines reader.
pub fn parse_candidates(reader: impl BufRead, origin: &str) -> IngestReport {
    let mut report = IngestReport::default();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(origin, line = line_no, error = %e, "unreadable candidate line skipped");
                report.skipped.push(SkippedRecord {
                    line: line_no,
                    reason: format!("unreadable: {e}"),
                });
                continue;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }

        let mut value: serde_json::Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(e) => {
                warn!(origin, line = line_no, error = %e, "malformed candidate line skipped");
                report.skipped.push(SkippedRecord {
                    line: line_no,
                    reason: format!("malformed json: {e}"),
                });
                continue;
            }
        };

        if let Some(obj) = value.as_object_mut() {
            if !obj.contains_key("provenance") {
                let fallback = Provenance::new("ingest", format!("{origin}:{line_no}"))
                    .with_file(origin)
                    .recorded_now();
                if let Ok(p) = serde_json::to_value(fallback) {
                    obj.insert("provenance".to_string(), p);
                }
            }
        }

        let record: CandidateRecord = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                warn!(origin, line = line_no, error = %e, "candidate record has wrong shape; skipped");
                report.skipped.push(SkippedRecord {
                    line: line_no,
                    reason: format!("invalid record: {e}"),
                });
                continue;
            }
        };

        if let Err(e) = record.validate() {
            warn!(origin, line = line_no, error = %e, "invalid candidate skipped");
            report.skipped.push(SkippedRecord {
                line: line_no,
                reason: e.to_string(),
            });
            continue;
        }

        report.candidates.push(record);
    }

    debug!(
        origin,
        accepted = report.candidates.len(),
        skipped = report.skipped.len(),
        "candidate source read"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_effective_namespace() {
        let c = CandidateRecord::new("Jane Roe", EntityType::Attorney, Provenance::default());
        assert_eq!(c.namespace(), "attorney");
        assert_eq!(c.with_namespace("ky").namespace(), "ky");
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let c = CandidateRecord::new("   ", EntityType::Court, Provenance::default());
        assert!(matches!(c.validate(), Err(ValidationError::EmptyCandidateName)));
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let input = concat!(
            "{\"name\":\"Norton Hospital\",\"entity_type\":\"provider\"}\n",
            "{not json\n",
            "\n",
            "{\"name\":\"\",\"entity_type\":\"provider\"}\n",
            "{\"name\":\"Baptist Health\",\"entity_type\":\"provider\",",
            "\"attributes\":{\"city\":\"Louisville\"},",
            "\"provenance\":{\"system\":\"pdf\",\"source_id\":\"p7\"}}\n",
            "{\"entity_type\":\"provider\"}\n",
        );
        let report = parse_candidates(Cursor::new(input), "providers.jsonl");

        assert_eq!(report.candidates.len(), 2);
        assert_eq!(report.skipped.len(), 3);
        assert_eq!(report.skipped[0].line, 2);
        assert_eq!(report.skipped[1].line, 4);
        assert_eq!(report.skipped[2].line, 6);

        let first = &report.candidates[0];
        assert_eq!(first.provenance.system, "ingest");
        assert_eq!(first.provenance.source_id, "providers.jsonl:1");
        assert_eq!(report.candidates[1].provenance.source_id, "p7");
        assert_eq!(report.candidates[1].attributes["city"], "Louisville");
    }

    #[test]
    fn test_read_candidates_missing_file_is_error() {
        let err = read_candidates("/definitely/not/here.jsonl").unwrap_err();
        assert!(err.is_retryable());
    }
}
