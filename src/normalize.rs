//! Name normalization.
//!
//! Canonicalizes raw names for comparison: lowercase, diacritics folded,
//! punctuation dropped, whitespace collapsed, and entity-type-specific noise
//! tokens removed (legal suffixes for organizations, honorifics for people).
//!
//! Normalization is pure and idempotent:
//! `normalize(normalize(n)) == normalize(n)` for every input.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::config::ResolverConfig;
use crate::entity::{EntityType, NameKind};

/// Generic cleanup shared by every entity type.
///
/// Never returns leading, trailing or doubled spaces.
#[must_use]
pub fn fold(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.to_lowercase().nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        match c {
            '.' | '\'' | '\u{2019}' | '`' => {}
            '&' => out.push_str(" and "),
            c if c.is_alphanumeric() => out.extend(c.to_lowercase()),
            _ => out.push(' '),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Tokenized stop phrases, longest first.
#[derive(Debug, Clone, Default)]
struct StopRules {
    phrases: Vec<Vec<String>>,
}

impl StopRules {
    fn new<'a>(phrases: impl IntoIterator<Item = &'a String>) -> Self {
        let mut phrases: Vec<Vec<String>> = phrases
            .into_iter()
            .map(|p| fold(p).split(' ').map(str::to_string).collect::<Vec<_>>())
            .filter(|tokens| tokens.iter().all(|t| !t.is_empty()))
            .collect();
        phrases.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        phrases.dedup();
        Self { phrases }
    }

    /// Removes phrase occurrences until none remain.
    fn strip<'a>(&self, tokens: &[&'a str]) -> Vec<&'a str> {
        let mut current: Vec<&str> = tokens.to_vec();
        loop {
            let mut changed = false;
            for phrase in &self.phrases {
                let n = phrase.len();
                if n == 0 || n > current.len() {
                    continue;
                }
                let mut out = Vec::with_capacity(current.len());
                let mut i = 0;
                while i < current.len() {
                    if i + n <= current.len()
                        && current[i..i + n].iter().zip(phrase).all(|(a, b)| *a == b.as_str())
                    {
                        i += n;
                        changed = true;
                    } else {
                        out.push(current[i]);
                        i += 1;
                    }
                }
                current = out;
            }
            if !changed {
                return current;
            }
        }
    }
}

/// Entity-type-aware normalizer built from a [`ResolverConfig`].
#[derive(Debug, Clone)]
pub struct Normalizer {
    configured: HashMap<String, StopRules>,
    organization: StopRules,
    person: StopRules,
}

impl Normalizer {
    /// Builds the stop-phrase tables for every configured type.
    #[must_use]
    pub fn new(config: &ResolverConfig) -> Self {
        let configured = config
            .profiles()
            .map(|(key, profile)| (key.to_string(), StopRules::new(&profile.stop_phrases)))
            .collect();
        let organization = StopRules::new(&config.profile(&EntityType::Organization).stop_phrases);
        let person = StopRules::new(&config.profile(&EntityType::Person).stop_phrases);
        Self {
            configured,
            organization,
            person,
        }
    }

    fn rules(&self, entity_type: &EntityType) -> &StopRules {
        if let Some(rules) = self.configured.get(&entity_type.key()) {
            return rules;
        }
        match entity_type.name_kind() {
            NameKind::Organization => &self.organization,
            NameKind::Person => &self.person,
        }
    }

    /// Normalizes a name for comparison within an entity type.
    ///
    /// If removing noise tokens would leave nothing (a firm literally named
    /// "Company"), the generic cleanup is returned instead.
    #[must_use]
    pub fn normalize(&self, name: &str, entity_type: &EntityType) -> String {
        let folded = fold(name);
        let tokens: Vec<&str> = folded.split(' ').filter(|t| !t.is_empty()).collect();
        let kept = self.rules(entity_type).strip(&tokens);
        if kept.is_empty() {
            folded
        } else {
            kept.join(" ")
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&ResolverConfig::default())
    }
}

fn default_normalizer() -> &'static Arc<Normalizer> {
    static DEFAULT: OnceLock<Arc<Normalizer>> = OnceLock::new();
    DEFAULT.get_or_init(|| Arc::new(Normalizer::default()))
}

/// Normalizes a name with the built-in rules for its entity type.
///
/// # Examples
///
/// ```
/// use canonry::{normalize, EntityType};
///
/// assert_eq!(normalize("Norton Healthcare, Inc.", &EntityType::Provider), "norton");
/// assert_eq!(normalize("Hon. José  Álvarez", &EntityType::Mediator), "jose alvarez");
/// ```
#[must_use]
pub fn normalize(name: &str, entity_type: &EntityType) -> String {
    default_normalizer().normalize(name, entity_type)
}
