//! Source and provenance types.
//!
//! Every canonical entity keeps the list of sources that contributed to it.
//! The list is append-only: merges add entries, nothing removes them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a candidate record came from.
///
/// Two provenance entries are equal when they name the same system, source
/// id and file; `recorded_at` is informational and ignored by equality so a
/// re-run of the same batch never duplicates an entry.
///
/// # Examples
///
/// ```
/// use canonry::Provenance;
///
/// let p = Provenance::new("bar_scrape", "ky-2231").with_file("page3.html");
/// assert_eq!(p.to_string(), "bar_scrape:ky-2231/page3.html");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    /// Producing system (scraper, extractor, legacy export).
    pub system: String,

    /// Identifier of the record within that system.
    pub source_id: String,

    /// File the mention was extracted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// When the source produced the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl Provenance {
    /// Creates a provenance entry for a record in a producing system.
    #[must_use]
    pub fn new(system: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            source_id: source_id.into(),
            file: None,
            recorded_at: None,
        }
    }

    /// Attaches the originating file.
    #[must_use]
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Stamps the time the entry was recorded.
    #[must_use]
    pub fn recorded_now(mut self) -> Self {
        self.recorded_at = Some(Utc::now());
        self
    }
}

impl PartialEq for Provenance {
    fn eq(&self, other: &Self) -> bool {
        self.system == other.system && self.source_id == other.source_id && self.file == other.file
    }
}

impl Eq for Provenance {}

impl Default for Provenance {
    fn default() -> Self {
        Self::new("unknown", "")
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.system, self.source_id)?;
        if let Some(file) = &self.file {
            write!(f, "/{file}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provenance_display() {
        assert_eq!(Provenance::new("legacy", "42").to_string(), "legacy:42");
        assert_eq!(
            Provenance::new("pdf", "intake").with_file("a.pdf").to_string(),
            "pdf:intake/a.pdf"
        );
    }

    #[test]
    fn test_equality_ignores_recorded_at() {
        let a = Provenance::new("scrape", "1");
        let b = Provenance::new("scrape", "1").recorded_now();
        assert_eq!(a, b);
        assert_ne!(a, Provenance::new("scrape", "2"));
    }

    #[test]
    fn test_provenance_serialization() {
        let p = Provenance::new("scrape", "1").with_file("f.html");
        let json = serde_json::to_string(&p).unwrap();
        assert!(!json.contains("recorded_at"));
        let back: Provenance = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
