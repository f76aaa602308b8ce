//! Entity types and canonical identity.
//!
//! A [`CanonicalEntity`] is the single authoritative record for one real-world
//! provider, attorney, court, organization or person. Candidates are merged into
//! it; its canonical name is never silently replaced and its provenance only
//! ever grows.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::provenance::Provenance;

/// Attribute map carried by candidates and canonical entities.
///
/// Ordered so that rendering, hashing and graph writes are deterministic.
pub type AttributeMap = BTreeMap<String, String>;

/// Globally unique, stable entity identifier.
///
/// # Examples
///
/// ```
/// use canonry::EntityId;
///
/// let id = EntityId::new();
/// assert!(!id.is_nil());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Creates a new random entity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns true if this is a nil (all zeros) UUID.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How names of an entity type are normalized and how strict matching is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameKind {
    /// Organizational names: legal suffixes are noise, thresholds are strict.
    Organization,
    /// Personal names: honorifics are noise, nicknames and initials vary.
    Person,
}

/// Closed set of entity types the directory resolves.
///
/// Serialized as a plain string (`"attorney"`, `"custom:notary"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum EntityType {
    /// A natural person with no more specific role.
    Person,
    /// A company, firm or institution.
    Organization,
    /// A healthcare provider (hospital, clinic, practice).
    Provider,
    /// A lawyer.
    Attorney,
    /// A mediator.
    Mediator,
    /// A court.
    Court,
    /// A legal matter; anchors case-scoped relationships.
    Case,
    /// A custom entity type.
    Custom(String),
}

impl EntityType {
    /// Every built-in type, in display order.
    pub const BUILTIN: [Self; 7] = [
        Self::Person,
        Self::Organization,
        Self::Provider,
        Self::Attorney,
        Self::Mediator,
        Self::Court,
        Self::Case,
    ];

    /// Returns the name kind used to pick normalization rules and defaults.
    #[must_use]
    pub const fn name_kind(&self) -> NameKind {
        match self {
            Self::Person | Self::Attorney | Self::Mediator => NameKind::Person,
            Self::Organization | Self::Provider | Self::Court | Self::Case | Self::Custom(_) => {
                NameKind::Organization
            }
        }
    }

    /// Returns the string key used in config tables and ledger files.
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Parses a built-in type name only; unknown names yield `None`.
    ///
    /// Used where guessing a custom type would be wrong (human annotations).
    #[must_use]
    pub fn parse_known(s: &str) -> Option<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "person" | "people" => Some(Self::Person),
            "organization" | "organisation" | "org" => Some(Self::Organization),
            "provider" => Some(Self::Provider),
            "attorney" | "lawyer" => Some(Self::Attorney),
            "mediator" => Some(Self::Mediator),
            "court" => Some(Self::Court),
            "case" => Some(Self::Case),
            _ => lowered
                .strip_prefix("custom:")
                .filter(|name| !name.is_empty())
                .map(|name| Self::Custom(name.to_string())),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Person => write!(f, "person"),
            Self::Organization => write!(f, "organization"),
            Self::Provider => write!(f, "provider"),
            Self::Attorney => write!(f, "attorney"),
            Self::Mediator => write!(f, "mediator"),
            Self::Court => write!(f, "court"),
            Self::Case => write!(f, "case"),
            Self::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(known) = Self::parse_known(s) {
            return Ok(known);
        }
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("entity type cannot be empty".to_string());
        }
        Ok(Self::Custom(trimmed.to_ascii_lowercase()))
    }
}

impl From<EntityType> for String {
    fn from(value: EntityType) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for EntityType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The authoritative deduplicated record for one real-world entity.
///
/// # Examples
///
/// ```
/// use canonry::{CanonicalEntity, EntityType};
///
/// let entity = CanonicalEntity::new("Norton Hospital", EntityType::Provider);
/// assert_eq!(entity.namespace, "provider");
/// assert!(entity.aliases.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    /// Stable identifier.
    pub id: EntityId,

    /// Entity type.
    pub entity_type: EntityType,

    /// Uniqueness scope for `canonical_name` within the type.
    pub namespace: String,

    /// Authoritative display name.
    pub canonical_name: String,

    /// Free-form attributes (folder, firm, city).
    #[serde(default)]
    pub attributes: AttributeMap,

    /// Other names this entity is known by.
    #[serde(default)]
    pub aliases: Vec<String>,

    /// Append-only list of contributing sources.
    #[serde(default)]
    pub provenance: Vec<Provenance>,

    /// When the entity was first created.
    pub created_at: DateTime<Utc>,
    /// When the entity last changed.
    pub updated_at: DateTime<Utc>,

    /// Bumped on every change.
    pub version: u64,
}

impl CanonicalEntity {
    /// Creates a new entity in the type's default namespace.
    #[must_use]
    pub fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        let namespace = entity_type.key();
        Self::in_namespace(name, entity_type, namespace)
    }

    /// Creates a new entity in an explicit namespace.
    #[must_use]
    pub fn in_namespace(
        name: impl Into<String>,
        entity_type: EntityType,
        namespace: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            entity_type,
            namespace: namespace.into(),
            canonical_name: name.into(),
            attributes: AttributeMap::new(),
            aliases: Vec::new(),
            provenance: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Adds an alias. The canonical name and existing aliases are ignored.
    ///
    /// Returns true if the alias was new.
    pub fn add_alias(&mut self, alias: impl Into<String>) -> bool {
        let alias = alias.into();
        let trimmed = alias.trim();
        if trimmed.is_empty()
            || trimmed == self.canonical_name
            || self.aliases.iter().any(|a| a == trimmed)
        {
            return false;
        }
        self.aliases.push(trimmed.to_string());
        self.touch();
        true
    }

    /// Fills attributes that are currently absent or empty.
    ///
    /// Populated fields are never overwritten and empty incoming values are
    /// ignored. Returns the keys that were filled.
    pub fn fill_attributes(&mut self, incoming: &AttributeMap) -> Vec<String> {
        let mut filled = Vec::new();
        for (key, value) in incoming {
            if value.trim().is_empty() {
                continue;
            }
            let slot = self.attributes.entry(key.clone()).or_default();
            if slot.trim().is_empty() {
                slot.clone_from(value);
                filled.push(key.clone());
            }
        }
        if !filled.is_empty() {
            self.touch();
        }
        filled
    }

    /// Appends a provenance entry unless an equal one is already recorded.
    pub fn append_provenance(&mut self, provenance: Provenance) -> bool {
        if self.provenance.contains(&provenance) {
            return false;
        }
        self.provenance.push(provenance);
        self.touch();
        true
    }

    /// Returns every name this entity is known by, canonical first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.canonical_name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Updates the `updated_at` timestamp and increments the version.
    fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.version += 1;
    }
}
