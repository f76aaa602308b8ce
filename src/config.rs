//! Resolver configuration.
//!
//! Thresholds and normalization tokens are a per-entity-type table rather
//! than constants scattered through call sites. The table is loaded from TOML:
//!
//! ```toml
//! top_k = 5
//!
//! [types.attorney]
//! high = 92.0
//! review_low = 82.0
//!
//! [types.provider]
//! stop_phrases = ["inc", "llc", "healthcare", "health system"]
//!
//! [[canaries]]
//! name = "smith-v-jones edges"
//! query = { kind = "relationship_count", anchor = { entity_type = "case", namespace = "case", name = "Smith v. Jones" } }
//! comparator = "equal"
//! expected = 93
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::Thresholds;
use crate::entity::{EntityType, NameKind};
use crate::error::{CanonryError, CanonryResult, ValidationError};
use crate::graph::Canary;

const ORGANIZATION_STOP_PHRASES: &[&str] = &[
    "the",
    "inc",
    "incorporated",
    "llc",
    "pllc",
    "llp",
    "lp",
    "ltd",
    "limited",
    "corp",
    "corporation",
    "co",
    "company",
    "pc",
    "psc",
    "pa",
    "healthcare",
    "health care",
    "health system",
    "health systems",
];

const PERSON_STOP_PHRASES: &[&str] = &[
    "the", "dr", "doctor", "hon", "honorable", "judge", "esq", "esquire", "mr", "mrs", "ms",
    "miss", "md", "phd", "jd",
];

/// Resolved matching and normalization rules for one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeProfile {
    /// Selects the built-in stop phrases.
    pub name_kind: NameKind,

    /// Scores at or above this auto-merge.
    pub high: f64,

    /// Scores in `[review_low, high)` go to human review.
    pub review_low: f64,

    /// Floor applied when the shorter name is contained in the longer.
    pub containment_boost: f64,

    /// Minimum length of the shorter name for the containment boost.
    pub containment_min_len: usize,

    /// Tokens or token sequences removed during normalization.
    pub stop_phrases: Vec<String>,
}

impl TypeProfile {
    /// Built-in profile for organization-like types.
    #[must_use]
    pub fn organization() -> Self {
        Self {
            name_kind: NameKind::Organization,
            high: 95.0,
            review_low: 85.0,
            containment_boost: 90.0,
            containment_min_len: 8,
            stop_phrases: ORGANIZATION_STOP_PHRASES.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Built-in profile for person-like types.
    #[must_use]
    pub fn person() -> Self {
        Self {
            name_kind: NameKind::Person,
            high: 90.0,
            review_low: 80.0,
            containment_boost: 90.0,
            containment_min_len: 8,
            stop_phrases: PERSON_STOP_PHRASES.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Built-in profile for a name kind.
    #[must_use]
    pub fn for_kind(kind: NameKind) -> Self {
        match kind {
            NameKind::Organization => Self::organization(),
            NameKind::Person => Self::person(),
        }
    }

    /// Classifier thresholds of this profile.
    #[must_use]
    pub const fn thresholds(&self) -> Thresholds {
        Thresholds {
            high: self.high,
            review_low: self.review_low,
        }
    }

    fn validate(&self, entity_type: &str) -> Result<(), ValidationError> {
        for (name, value) in [
            ("high", self.high),
            ("review_low", self.review_low),
            ("containment_boost", self.containment_boost),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ValidationError::ThresholdOutOfRange {
                    entity_type: entity_type.to_string(),
                    name,
                    value,
                });
            }
        }
        if self.review_low > self.high {
            return Err(ValidationError::InvertedThresholds {
                entity_type: entity_type.to_string(),
                high: self.high,
                review_low: self.review_low,
            });
        }
        Ok(())
    }
}

/// Partial profile as written in the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileOverride {
    /// Overrides the name kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_kind: Option<NameKind>,
    /// Overrides the auto-merge threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    /// Overrides the review threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_low: Option<f64>,
    /// Overrides the containment bonus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub containment_boost: Option<f64>,
    /// Overrides the shortest name eligible for the bonus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub containment_min_len: Option<usize>,
    /// Replaces the stop phrases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_phrases: Option<Vec<String>>,
}

impl ProfileOverride {
    fn resolve(&self, entity_type: &EntityType) -> TypeProfile {
        let mut profile = TypeProfile::for_kind(self.name_kind.unwrap_or_else(|| entity_type.name_kind()));
        if let Some(v) = self.high {
            profile.high = v;
        }
        if let Some(v) = self.review_low {
            profile.review_low = v;
        }
        if let Some(v) = self.containment_boost {
            profile.containment_boost = v;
        }
        if let Some(v) = self.containment_min_len {
            profile.containment_min_len = v;
        }
        if let Some(v) = &self.stop_phrases {
            profile.stop_phrases.clone_from(v);
        }
        profile
    }
}

fn default_top_k() -> usize {
    5
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(2, std::num::NonZeroUsize::get)
}

fn default_folder_attribute() -> String {
    "folder".to_string()
}

/// Top-level resolver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Number of ranked matches kept per candidate.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Assessment worker threads.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Attribute holding an entity's on-disk folder, if any.
    #[serde(default = "default_folder_attribute")]
    pub folder_attribute: String,

    /// Per-type overrides keyed by entity type (`"attorney"`, `"custom:notary"`).
    #[serde(default)]
    pub types: BTreeMap<String, ProfileOverride>,

    /// Invariants checked around every graph commit.
    #[serde(default)]
    pub canaries: Vec<Canary>,

    #[serde(skip)]
    resolved: BTreeMap<String, TypeProfile>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            workers: default_workers(),
            folder_attribute: default_folder_attribute(),
            types: BTreeMap::new(),
            canaries: Vec::new(),
            resolved: BTreeMap::new(),
        }
    }
}

fn builtin_profile(kind: NameKind) -> &'static TypeProfile {
    static ORGANIZATION: OnceLock<TypeProfile> = OnceLock::new();
    static PERSON: OnceLock<TypeProfile> = OnceLock::new();
    match kind {
        NameKind::Organization => ORGANIZATION.get_or_init(TypeProfile::organization),
        NameKind::Person => PERSON.get_or_init(TypeProfile::person),
    }
}

impl ResolverConfig {
    /// Parses and validates a TOML configuration.
    pub fn from_toml_str(input: &str) -> CanonryResult<Self> {
        let config: Self = toml::from_str(input).map_err(|e| ValidationError::InvalidConfig {
            reason: e.to_string(),
        })?;
        config.validate()
    }

    /// Loads and validates a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> CanonryResult<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|e| CanonryError::io(path, e))?;
        let config = Self::from_toml_str(&input)?;
        debug!(path = %path.display(), types = config.types.len(), canaries = config.canaries.len(), "resolver config loaded");
        Ok(config)
    }

    /// Replaces the override for one entity type.
    pub fn with_override(mut self, entity_type: &EntityType, profile: ProfileOverride) -> CanonryResult<Self> {
        self.types.insert(entity_type.key(), profile);
        self.validate()
    }

    /// Adds a canary invariant.
    pub fn with_canary(mut self, canary: Canary) -> CanonryResult<Self> {
        self.canaries.push(canary);
        self.validate()
    }

    /// Validates the configuration and resolves the profile table.
    pub fn validate(mut self) -> CanonryResult<Self> {
        if self.top_k == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "top_k must be at least 1".to_string(),
            }
            .into());
        }
        if self.workers == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "workers must be at least 1".to_string(),
            }
            .into());
        }

        let mut resolved = BTreeMap::new();
        for (key, overrides) in &self.types {
            let entity_type: EntityType = key
                .parse()
                .map_err(|reason| ValidationError::InvalidConfig { reason })?;
            let profile = overrides.resolve(&entity_type);
            profile.validate(key)?;
            resolved.insert(entity_type.key(), profile);
        }
        self.resolved = resolved;

        let mut seen = HashSet::new();
        for canary in &self.canaries {
            if canary.name.trim().is_empty() {
                return Err(ValidationError::InvalidConfig {
                    reason: "canary name cannot be empty".to_string(),
                }
                .into());
            }
            if !seen.insert(canary.name.as_str()) {
                return Err(ValidationError::InvalidConfig {
                    reason: format!("duplicate canary name '{}'", canary.name),
                }
                .into());
            }
        }

        Ok(self)
    }

    /// Profile for an entity type: configured override or built-in default.
    #[must_use]
    pub fn profile(&self, entity_type: &EntityType) -> &TypeProfile {
        self.resolved
            .get(&entity_type.key())
            .unwrap_or_else(|| builtin_profile(entity_type.name_kind()))
    }

    /// Configured (non-default) profiles keyed by entity type.
    pub fn profiles(&self) -> impl Iterator<Item = (&str, &TypeProfile)> {
        self.resolved.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Classifier thresholds for an entity type.
    #[must_use]
    pub fn thresholds(&self, entity_type: &EntityType) -> Thresholds {
        self.profile(entity_type).thresholds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CanaryQuery, Comparator};

    #[test]
    fn test_defaults_org_stricter_than_person() {
        let config = ResolverConfig::default();
        let org = config.thresholds(&EntityType::Organization);
        let person = config.thresholds(&EntityType::Attorney);
        assert!(org.high > person.high);
        assert!(org.review_low > person.review_low);
    }

    #[test]
    fn test_partial_override_keeps_kind_defaults() {
        let config = ResolverConfig::from_toml_str(
            r#"
            top_k = 3
            [types.attorney]
            high = 92.0
            "#,
        )
        .unwrap();
        assert_eq!(config.top_k, 3);
        let profile = config.profile(&EntityType::Attorney);
        assert!((profile.high - 92.0).abs() < f64::EPSILON);
        assert!((profile.review_low - 80.0).abs() < f64::EPSILON);
        assert!(profile.stop_phrases.iter().any(|p| p == "esq"));
    }

    #[test]
    fn test_custom_type_override() {
        let config = ResolverConfig::from_toml_str(
            r#"
            [types."custom:notary"]
            name_kind = "person"
            "#,
        )
        .unwrap();
        let notary = EntityType::Custom("notary".to_string());
        assert_eq!(config.profile(&notary).name_kind, NameKind::Person);
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let err = ResolverConfig::from_toml_str(
            r#"
            [types.provider]
            high = 80.0
            review_low = 90.0
            "#,
        )
        .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("inverted"));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let err = ResolverConfig::from_toml_str("[types.court]\nhigh = 120.0\n").unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_unknown_override_field_rejected() {
        assert!(ResolverConfig::from_toml_str("[types.court]\nhihg = 90.0\n").is_err());
    }

    #[test]
    fn test_canaries_parsed_and_deduplicated() {
        let toml = r#"
            [[canaries]]
            name = "case edges"
            query = { kind = "relationship_count", anchor = { entity_type = "case", namespace = "case", name = "Smith v. Jones" } }
            comparator = "equal"
            expected = 93
        "#;
        let config = ResolverConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.canaries.len(), 1);
        assert_eq!(config.canaries[0].comparator, Comparator::Equal);
        assert_eq!(config.canaries[0].expected, Some(93));
        assert!(matches!(
            config.canaries[0].query,
            CanaryQuery::RelationshipCount { .. }
        ));

        let doubled = format!("{toml}\n{}", toml.replace("[[canaries]]", "\n[[canaries]]"));
        assert!(ResolverConfig::from_toml_str(&doubled).is_err());
    }

    #[test]
    fn test_zero_top_k_rejected() {
        assert!(ResolverConfig::from_toml_str("top_k = 0").is_err());
    }
}
