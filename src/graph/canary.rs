//! Canary invariants.
//!
//! A canary is a named count query plus a comparator and an optional
//! expected value. The writer evaluates every applicable canary before a
//! commit and again after it; a mismatch marks the batch UNSAFE.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::EntityType;
use crate::graph::traits::{GraphStore, NodeKey, StorageError};

/// Count query evaluated against the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CanaryQuery {
    /// Number of nodes, optionally of one type and namespace.
    NodeCount {
        /// Restrict to one type.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entity_type: Option<EntityType>,
        /// Restrict to one namespace.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        namespace: Option<String>,
    },
    /// Number of edges touching `anchor`, optionally of one relationship type.
    RelationshipCount {
        /// Node the edges must touch; `None` counts every edge.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        anchor: Option<NodeKey>,
        /// Restrict to one relationship type.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        relationship: Option<String>,
    },
}

impl CanaryQuery {
    /// Runs the query.
    pub fn evaluate(&self, store: &dyn GraphStore) -> Result<u64, StorageError> {
        match self {
            Self::NodeCount {
                entity_type,
                namespace,
            } => store.count_nodes(entity_type.as_ref(), namespace.as_deref()),
            Self::RelationshipCount {
                anchor,
                relationship,
            } => store.count_relationships(anchor.as_ref(), relationship.as_deref()),
        }
    }
}

/// How an observed value is compared with its reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    /// Values must be equal.
    #[default]
    Equal,
    /// Value must not drop below the reference.
    AtLeast,
    /// Value must not exceed the reference.
    AtMost,
}

impl Comparator {
    /// Returns true if `actual` satisfies the comparator against `reference`.
    #[must_use]
    pub const fn holds(self, actual: u64, reference: u64) -> bool {
        match self {
            Self::Equal => actual == reference,
            Self::AtLeast => actual >= reference,
            Self::AtMost => actual <= reference,
        }
    }

    const fn symbol(self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::AtLeast => ">=",
            Self::AtMost => "<=",
        }
    }
}

/// A named invariant checked around every commit.
///
/// With `expected` set, the value must satisfy the comparator against it
/// both before and after the commit. Without it, the after value is compared
/// with the before value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canary {
    /// Name shown in reports.
    pub name: String,
    /// Count to evaluate.
    pub query: CanaryQuery,
    /// Comparison against the reference value.
    #[serde(default)]
    pub comparator: Comparator,
    /// Fixed reference value; `None` compares with the before reading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<u64>,
    /// Namespace this canary guards. Unscoped canaries apply to every batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Canary {
    /// Creates an unscoped canary that asserts an exact value.
    #[must_use]
    pub fn expecting(name: impl Into<String>, query: CanaryQuery, expected: u64) -> Self {
        Self {
            name: name.into(),
            query,
            comparator: Comparator::Equal,
            expected: Some(expected),
            scope: None,
        }
    }

    /// Creates an unscoped canary asserting the value is unchanged by a commit.
    #[must_use]
    pub fn unchanged(name: impl Into<String>, query: CanaryQuery) -> Self {
        Self {
            name: name.into(),
            query,
            comparator: Comparator::Equal,
            expected: None,
            scope: None,
        }
    }

    /// Restricts the canary to one namespace.
    #[must_use]
    pub fn scoped(mut self, namespace: impl Into<String>) -> Self {
        self.scope = Some(namespace.into());
        self
    }

    /// Returns true if the canary guards batches for `namespace`.
    #[must_use]
    pub fn applies_to(&self, namespace: &str) -> bool {
        self.scope.as_deref().map_or(true, |s| s == namespace)
    }

    /// Pre-commit check. Only canaries with an `expected` value can fail it.
    #[must_use]
    pub fn precheck(&self, before: u64) -> bool {
        self.expected
            .map_or(true, |expected| self.comparator.holds(before, expected))
    }

    /// Post-commit check against `expected`, else against `before`.
    #[must_use]
    pub fn verify(&self, before: u64, after: u64) -> Option<CanaryDiff> {
        let reference = self.expected.unwrap_or(before);
        if self.comparator.holds(after, reference) {
            return None;
        }
        Some(CanaryDiff {
            canary: self.name.clone(),
            comparator: self.comparator,
            expected: self.expected,
            before,
            after,
        })
    }

    /// Human-readable form of the expectation, for error messages.
    #[must_use]
    pub fn describe_expectation(&self) -> String {
        match self.expected {
            Some(expected) => format!("{} {expected}", self.comparator.symbol()),
            None => format!("{} value before commit", self.comparator.symbol()),
        }
    }
}

/// Before/after record of one canary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanaryCheck {
    /// Canary name.
    pub canary: String,
    /// Value before the writes.
    pub before: u64,
    /// Value after the writes.
    pub after: u64,
    /// True if the canary held.
    pub passed: bool,
}

/// A failed canary with its before and after values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanaryDiff {
    /// Canary name.
    pub canary: String,
    /// Comparison that failed.
    pub comparator: Comparator,
    /// Fixed reference value, if any.
    pub expected: Option<u64>,
    /// Value before the writes.
    pub before: u64,
    /// Value after the writes.
    pub after: u64,
}

impl fmt::Display for CanaryDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: before={} after={}", self.canary, self.before, self.after)?;
        if let Some(expected) = self.expected {
            write!(f, " expected {} {expected}", self.comparator.symbol())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case_edges() -> CanaryQuery {
        CanaryQuery::RelationshipCount {
            anchor: Some(NodeKey::in_default_namespace(EntityType::Case, "Smith v. Jones")),
            relationship: None,
        }
    }

    #[test]
    fn test_expected_value_checks() {
        let canary = Canary::expecting("case edges", case_edges(), 93);
        assert!(canary.precheck(93));
        assert!(!canary.precheck(92));
        assert!(canary.verify(93, 93).is_none());

        let diff = canary.verify(93, 94).unwrap();
        assert_eq!(diff.before, 93);
        assert_eq!(diff.after, 94);
        assert!(diff.to_string().contains("expected == 93"));
    }

    #[test]
    fn test_without_expected_compares_with_before() {
        let canary = Canary::unchanged("courts", CanaryQuery::NodeCount {
            entity_type: Some(EntityType::Court),
            namespace: None,
        });
        assert!(canary.precheck(12));
        assert!(canary.verify(12, 12).is_none());
        assert!(canary.verify(12, 13).is_some());

        let growing = Canary {
            comparator: Comparator::AtLeast,
            ..canary
        };
        assert!(growing.verify(12, 13).is_none());
        assert!(growing.verify(12, 11).is_some());
    }

    #[test]
    fn test_scope() {
        let scoped = Canary::unchanged("x", case_edges()).scoped("provider");
        assert!(scoped.applies_to("provider"));
        assert!(!scoped.applies_to("attorney"));
        assert!(Canary::unchanged("y", case_edges()).applies_to("attorney"));
    }

    #[test]
    fn test_query_serde_shape() {
        let json = serde_json::to_value(case_edges()).unwrap();
        assert_eq!(json["kind"], "relationship_count");
        assert_eq!(json["anchor"]["entity_type"], "case");
    }
}
