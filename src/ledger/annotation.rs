//! Review annotation grammar.
//!
//! Free text written by a reviewer after `=>` is parsed into a closed set of
//! decisions:
//!
//! ```text
//! ignore | skip
//! add as <type> [; works at <firm>] [; key=value, key=value]
//! matches <canonical name> | same as <canonical name>
//! note: <text> | context: <text>
//! ```
//!
//! Anything else, anything hedged ("maybe", "?") and anything that names more
//! than one decision is `NeedsClarification`. The parser never guesses.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::entity::{AttributeMap, EntityType};

/// Attribute that "works at X" fills.
pub const FIRM_ATTRIBUTE: &str = "firm_name";

/// A parsed reviewer decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Drop the candidate.
    Ignore,
    /// Create a new entity of this type with the extracted attributes.
    AddAs {
        /// Type of the new entity.
        entity_type: EntityType,
        /// Attributes parsed from the annotation.
        attributes: AttributeMap,
    },
    /// Merge into the named canonical entity regardless of score.
    MatchesExisting {
        /// Name or alias as written by the reviewer.
        canonical_name: String,
    },
    /// Keep the item pending and remember the note.
    Context {
        /// The note.
        text: String,
    },
    /// Could not be read unambiguously; the item stays pending.
    NeedsClarification {
        /// Annotation as written.
        raw: String,
    },
}

impl Decision {
    /// Returns true if this decision resolves the item.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(
            self,
            Self::Ignore | Self::AddAs { .. } | Self::MatchesExisting { .. }
        )
    }

    fn unclear(raw: &str) -> Self {
        Self::NeedsClarification {
            raw: raw.trim().to_string(),
        }
    }
}

struct Grammar {
    ignore: Regex,
    add_as: Regex,
    works_at: Regex,
    key_value: Regex,
    matches: Regex,
    context: Regex,
    keyword: Regex,
    hedge: Regex,
}

impl Grammar {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            ignore: Regex::new(r"(?i)^(?:ignore|skip)[.!]?$")?,
            add_as: Regex::new(r"(?i)^add\s+as\s+(?:an?\s+)?([a-z][a-z0-9:_-]*)(?:[\s,;:]+(.*))?$")?,
            works_at: Regex::new(r"(?i)^(?:who\s+)?works\s+(?:at|for)\s+(.+)$")?,
            key_value: Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.+)$")?,
            matches: Regex::new(r"(?i)^(?:matches|match|same\s+as)\s*:?\s+(.+)$")?,
            context: Regex::new(r"(?is)^(?:note|context)\s*:\s*(.*)$")?,
            keyword: Regex::new(r"(?i)\b(?:ignore|skip|add\s+as|matches|same\s+as)\b")?,
            hedge: Regex::new(r"(?i)\?|\b(?:maybe|perhaps|probably|possibly|unsure|not\s+sure)\b")?,
        })
    }
}

fn grammar() -> Option<&'static Grammar> {
    static GRAMMAR: OnceLock<Option<Grammar>> = OnceLock::new();
    GRAMMAR.get_or_init(|| Grammar::compile().ok()).as_ref()
}

/// Parses one annotation.
///
/// Returns `None` for blank text (the item stays pending untouched).
///
/// # Examples
///
/// ```
/// use canonry::ledger::{parse_annotation, Decision};
///
/// assert_eq!(parse_annotation("  "), None);
/// assert_eq!(parse_annotation("ignore"), Some(Decision::Ignore));
/// assert!(matches!(
///     parse_annotation("maybe the same as Norton?"),
///     Some(Decision::NeedsClarification { .. })
/// ));
/// ```
#[must_use]
pub fn parse_annotation(text: &str) -> Option<Decision> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let Some(g) = grammar() else {
        return Some(Decision::unclear(text));
    };

    // Notes are free text; keywords inside them mean nothing.
    if let Some(caps) = g.context.captures(text) {
        let note = caps.get(1).map_or("", |m| m.as_str()).trim();
        if note.is_empty() {
            return Some(Decision::unclear(text));
        }
        return Some(Decision::Context {
            text: note.to_string(),
        });
    }

    if g.hedge.is_match(text) || g.keyword.find_iter(text).count() > 1 {
        return Some(Decision::unclear(text));
    }

    if g.ignore.is_match(text) {
        return Some(Decision::Ignore);
    }

    if let Some(caps) = g.matches.captures(text) {
        let name = caps
            .get(1)
            .map_or("", |m| m.as_str())
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .trim();
        if name.is_empty() {
            return Some(Decision::unclear(text));
        }
        return Some(Decision::MatchesExisting {
            canonical_name: name.to_string(),
        });
    }

    if let Some(caps) = g.add_as.captures(text) {
        let Some(entity_type) = caps.get(1).and_then(|m| EntityType::parse_known(m.as_str())) else {
            return Some(Decision::unclear(text));
        };
        let rest = caps.get(2).map_or("", |m| m.as_str());
        return Some(match extract_attributes(g, rest) {
            Some(attributes) => Decision::AddAs {
                entity_type,
                attributes,
            },
            None => Decision::unclear(text),
        });
    }

    Some(Decision::unclear(text))
}

/// Extracts attributes from `; `-separated clauses.
///
/// A "works at" clause keeps its commas (firm names have them); any other
/// clause is a comma-separated list of `key=value` pairs. Returns `None` if
/// any clause is not understood.
fn extract_attributes(g: &Grammar, rest: &str) -> Option<AttributeMap> {
    let mut attributes = AttributeMap::new();
    for clause in rest.split(';').map(str::trim).filter(|c| !c.is_empty()) {
        if let Some(caps) = g.works_at.captures(clause) {
            let firm = caps.get(1)?.as_str().trim().trim_end_matches('.').trim();
            if firm.is_empty() || attributes.contains_key(FIRM_ATTRIBUTE) {
                return None;
            }
            attributes.insert(FIRM_ATTRIBUTE.to_string(), firm.to_string());
            continue;
        }
        for pair in clause.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let caps = g.key_value.captures(pair)?;
            let key = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps.get(2)?.as_str().trim();
            if attributes.insert(key, value.to_string()).is_some() {
                return None;
            }
        }
    }
    Some(attributes)
}
