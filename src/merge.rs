//! Merge Planner.
//!
//! Turns an assessment (plus an optional human override) into a staged
//! [`MergeDecision`]. Planning is pure: nothing touches the directory or
//! the graph until a [`StagedBatch`] is committed by the Graph Writer.
//!
//! Merge rules:
//! - attributes fill only empty canonical fields (first write wins)
//! - provenance is appended, never dropped
//! - a differing candidate name becomes an alias; the canonical name is
//!   never replaced

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::candidate::{CandidateLink, CandidateRecord};
use crate::classify::{Assessment, Tier};
use crate::entity::{AttributeMap, CanonicalEntity, EntityId, EntityType};
use crate::error::{CanonryResult, ValidationError};
use crate::graph::{EntityUpsert, GraphBatch, NodeKey, RelationshipUpsert};
use crate::ledger::{Decision, ItemId};
use crate::normalize::Normalizer;
use crate::provenance::Provenance;
use crate::snapshot::CanonicalSnapshot;

/// A reviewer's override of the automatic tier outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "override", rename_all = "snake_case")]
pub enum HumanOverride {
    /// Merge into the named canonical (or the top match when `None`).
    Approve {
        /// Entity to merge into; `None` takes the best match.
        canonical_name: Option<String>,
    },
    /// Not a match; create a new entity.
    Reject,
    /// Wrong type; match again against another type's canonical set.
    Reclassify {
        /// Type to match under instead.
        entity_type: EntityType,
    },
}

impl HumanOverride {
    /// Maps a final review decision to an override plus extra attributes.
    ///
    /// `AddAs` with the candidate's own type rejects the matches; with another
    /// type it reclassifies. `Ignore` and non-final decisions map to `None`.
    #[must_use]
    pub fn from_decision(decision: &Decision, current: &EntityType) -> Option<(Self, AttributeMap)> {
        match decision {
            Decision::MatchesExisting { canonical_name } => Some((
                Self::Approve {
                    canonical_name: Some(canonical_name.clone()),
                },
                AttributeMap::new(),
            )),
            Decision::AddAs {
                entity_type,
                attributes,
            } if entity_type == current => Some((Self::Reject, attributes.clone())),
            Decision::AddAs {
                entity_type,
                attributes,
            } => Some((
                Self::Reclassify {
                    entity_type: entity_type.clone(),
                },
                attributes.clone(),
            )),
            Decision::Ignore | Decision::Context { .. } | Decision::NeedsClarification { .. } => None,
        }
    }
}

/// What a decision does to canonical data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MergeAction {
    /// Merge the candidate into an existing canonical entity.
    Attach {
        /// Target entity.
        canonical_id: EntityId,
        /// Target canonical name.
        canonical_name: String,
        /// Candidate name to record, unless it is already known.
        alias: Option<String>,
        /// Attributes to fill where the target has none.
        attributes: AttributeMap,
        /// Source to append.
        provenance: Provenance,
    },
    /// Seed a new canonical entity from the candidate.
    Create {
        /// Entity to insert.
        entity: CanonicalEntity,
    },
    /// Run the candidate through matching again as another type.
    Reroute {
        /// Candidate retyped for the next pass.
        candidate: CandidateRecord,
    },
    /// Wait for a reviewer.
    Defer,
}

/// A staged merge decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeDecision {
    /// Review item id.
    pub item_id: ItemId,
    /// Tier assigned by classification.
    pub tier: Tier,
    /// Reviewer decision, if one exists.
    pub human: Option<HumanOverride>,
    /// What to do with the candidate.
    pub action: MergeAction,
    /// Canonical name the candidate resolves to, if it resolves.
    pub canonical_name: Option<String>,
}

/// Pure decision component.
#[derive(Debug, Clone)]
pub struct MergePlanner {
    normalizer: Arc<Normalizer>,
}

impl MergePlanner {
    /// Creates a planner.
    #[must_use]
    pub fn new(normalizer: Arc<Normalizer>) -> Self {
        Self { normalizer }
    }

    /// Plans the merge of one assessed candidate.
    ///
    /// # Errors
    /// `UnknownCanonical` if an approval names (or implies) a canonical
    /// entity that is not in the candidate's partition.
    pub fn plan(
        &self,
        assessment: &Assessment,
        human: Option<&HumanOverride>,
        snapshot: &CanonicalSnapshot,
    ) -> CanonryResult<MergeDecision> {
        let candidate = &assessment.candidate;
        let action = match human {
            None => match assessment.tier {
                Tier::Exact | Tier::High => match assessment.top() {
                    Some(top) => self.attach(candidate, snapshot, top.canonical.id)?,
                    None => create(candidate),
                },
                Tier::Medium => MergeAction::Defer,
                Tier::Low => create(candidate),
            },
            Some(HumanOverride::Approve { canonical_name }) => {
                let namespace = candidate.namespace();
                let target = match canonical_name {
                    Some(name) => snapshot
                        .find_by_name(&candidate.entity_type, &namespace, name, &self.normalizer)
                        .map(|e| e.id),
                    None => assessment.top().map(|m| m.canonical.id),
                };
                let Some(id) = target else {
                    return Err(ValidationError::UnknownCanonical {
                        entity_type: candidate.entity_type.key(),
                        namespace,
                        name: canonical_name.clone().unwrap_or_else(|| candidate.name.clone()),
                    }
                    .into());
                };
                self.attach(candidate, snapshot, id)?
            }
            Some(HumanOverride::Reject) => create(candidate),
            Some(HumanOverride::Reclassify { entity_type }) => {
                let mut rerouted = candidate.clone();
                if rerouted.namespace.as_deref() == Some(candidate.entity_type.key().as_str()) {
                    rerouted.namespace = None;
                }
                rerouted.entity_type = entity_type.clone();
                MergeAction::Reroute { candidate: rerouted }
            }
        };

        let canonical_name = match &action {
            MergeAction::Attach { canonical_name, .. } => Some(canonical_name.clone()),
            MergeAction::Create { entity } => Some(entity.canonical_name.clone()),
            MergeAction::Reroute { .. } | MergeAction::Defer => None,
        };

        debug!(
            item_id = %assessment.item_id,
            tier = %assessment.tier,
            human = human.is_some(),
            canonical = canonical_name.as_deref().unwrap_or("-"),
            "merge planned"
        );

        Ok(MergeDecision {
            item_id: assessment.item_id.clone(),
            tier: assessment.tier,
            human: human.cloned(),
            action,
            canonical_name,
        })
    }

    fn attach(
        &self,
        candidate: &CandidateRecord,
        snapshot: &CanonicalSnapshot,
        id: EntityId,
    ) -> CanonryResult<MergeAction> {
        let entity = snapshot.get(id).ok_or_else(|| ValidationError::UnknownCanonical {
            entity_type: candidate.entity_type.key(),
            namespace: candidate.namespace(),
            name: id.to_string(),
        })?;
        let name = candidate.name.trim();
        let alias = (!entity.names().any(|n| n == name)).then(|| name.to_string());
        Ok(MergeAction::Attach {
            canonical_id: entity.id,
            canonical_name: entity.canonical_name.clone(),
            alias,
            attributes: candidate.attributes.clone(),
            provenance: candidate.provenance.clone(),
        })
    }
}

fn create(candidate: &CandidateRecord) -> MergeAction {
    let mut entity = CanonicalEntity::in_namespace(
        candidate.name.trim(),
        candidate.entity_type.clone(),
        candidate.namespace(),
    );
    entity.attributes = candidate
        .attributes
        .iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    entity.provenance = vec![candidate.provenance.clone()];
    MergeAction::Create { entity }
}

/// Two on-disk folders that now belong to one canonical entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderMerge {
    /// Entity both folders belong to.
    pub canonical_id: EntityId,
    /// Canonical name of that entity.
    pub canonical_name: String,
    /// Folder named by the candidate; merged into `destination`.
    pub source: PathBuf,
    /// Folder already recorded on the canonical entity.
    pub destination: PathBuf,
}

/// What staging a decision did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staged {
    /// Merged into an existing or earlier-staged entity.
    Merged {
        /// Entity merged into.
        entity_id: EntityId,
        /// Its canonical name.
        canonical_name: String,
    },
    /// A new entity was staged.
    Created {
        /// New entity.
        entity_id: EntityId,
        /// Its canonical name.
        canonical_name: String,
    },
    /// Needs another matching pass.
    Rerouted {
        /// Type of the next pass.
        entity_type: EntityType,
    },
    /// Waiting for review.
    Deferred,
}

type StagingKey = (EntityType, String, String);

/// Output of a staged batch.
#[derive(Debug, Clone, Default)]
pub struct StagedOutput {
    /// Every entity the batch created or touched, in final state.
    pub entities: Vec<CanonicalEntity>,
    /// One graph batch per namespace.
    pub batches: Vec<GraphBatch>,
    /// Folders that should be consolidated.
    pub folder_merges: Vec<FolderMerge>,
    /// Candidates that need matching under another type.
    pub reroutes: Vec<CandidateRecord>,
}

/// Folds merge decisions into the canonical changes of one batch.
///
/// Decisions are applied in candidate order against a private copy of the
/// touched entities. Two creations with the same normalized name in one
/// batch collapse into a single new entity.
#[derive(Debug)]
pub struct StagedBatch {
    normalizer: Arc<Normalizer>,
    folder_attribute: String,
    entities: BTreeMap<EntityId, CanonicalEntity>,
    new_by_name: HashMap<StagingKey, EntityId>,
    links: Vec<(EntityId, CandidateLink)>,
    folder_merges: Vec<FolderMerge>,
    reroutes: Vec<CandidateRecord>,
}

impl StagedBatch {
    /// Starts an empty batch.
    #[must_use]
    pub fn new(normalizer: Arc<Normalizer>, folder_attribute: impl Into<String>) -> Self {
        Self {
            normalizer,
            folder_attribute: folder_attribute.into(),
            entities: BTreeMap::new(),
            new_by_name: HashMap::new(),
            links: Vec::new(),
            folder_merges: Vec::new(),
            reroutes: Vec::new(),
        }
    }

    fn staging_key(&self, entity: &CanonicalEntity) -> StagingKey {
        (
            entity.entity_type.clone(),
            entity.namespace.clone(),
            self.normalizer.normalize(&entity.canonical_name, &entity.entity_type),
        )
    }

    /// Applies one decision for `candidate`.
    ///
    /// # Errors
    /// - `UnknownCanonical` if an attach targets an entity missing from the snapshot
    /// - `DuplicateCanonical` if a creation would reuse an existing canonical name
    pub fn apply(
        &mut self,
        decision: &MergeDecision,
        candidate: &CandidateRecord,
        snapshot: &CanonicalSnapshot,
    ) -> CanonryResult<Staged> {
        match &decision.action {
            MergeAction::Defer => Ok(Staged::Deferred),
            MergeAction::Reroute { candidate } => {
                self.reroutes.push(candidate.clone());
                Ok(Staged::Rerouted {
                    entity_type: candidate.entity_type.clone(),
                })
            }
            MergeAction::Attach {
                canonical_id,
                alias,
                attributes,
                provenance,
                ..
            } => {
                if !self.entities.contains_key(canonical_id) {
                    let existing = snapshot.get(*canonical_id).ok_or_else(|| ValidationError::UnknownCanonical {
                        entity_type: candidate.entity_type.key(),
                        namespace: candidate.namespace(),
                        name: canonical_id.to_string(),
                    })?;
                    self.entities.insert(*canonical_id, CanonicalEntity::clone(existing));
                }
                let entity_id = *canonical_id;
                self.merge_into(entity_id, alias.as_deref(), attributes, provenance, candidate);
                Ok(self.merged(entity_id))
            }
            MergeAction::Create { entity } => {
                let key = self.staging_key(entity);
                if let Some(&existing) = self.new_by_name.get(&key) {
                    let name = candidate.name.trim();
                    self.merge_into(existing, Some(name), &candidate.attributes, &candidate.provenance, candidate);
                    return Ok(self.merged(existing));
                }

                let clash = snapshot
                    .partition(&entity.entity_type, &entity.namespace)
                    .iter()
                    .any(|e| e.entity.canonical_name.eq_ignore_ascii_case(&entity.canonical_name));
                if clash {
                    return Err(ValidationError::DuplicateCanonical {
                        entity_type: entity.entity_type.key(),
                        namespace: entity.namespace.clone(),
                        name: entity.canonical_name.clone(),
                    }
                    .into());
                }

                let entity_id = entity.id;
                self.new_by_name.insert(key, entity_id);
                self.entities.insert(entity_id, entity.clone());
                self.links
                    .extend(candidate.links.iter().cloned().map(|l| (entity_id, l)));
                Ok(Staged::Created {
                    entity_id,
                    canonical_name: entity.canonical_name.clone(),
                })
            }
        }
    }

    fn merged(&self, entity_id: EntityId) -> Staged {
        let canonical_name = self
            .entities
            .get(&entity_id)
            .map(|e| e.canonical_name.clone())
            .unwrap_or_default();
        Staged::Merged {
            entity_id,
            canonical_name,
        }
    }

    fn merge_into(
        &mut self,
        entity_id: EntityId,
        alias: Option<&str>,
        attributes: &AttributeMap,
        provenance: &Provenance,
        candidate: &CandidateRecord,
    ) {
        let Some(entity) = self.entities.get_mut(&entity_id) else {
            return;
        };

        let folder_key = self.folder_attribute.as_str();
        let incoming_folder = attributes.get(folder_key).map(|s| s.trim()).filter(|s| !s.is_empty());
        let current_folder = entity
            .attributes
            .get(folder_key)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty());
        if let (Some(source), Some(destination)) = (incoming_folder, current_folder) {
            if source != destination {
                let hint = FolderMerge {
                    canonical_id: entity.id,
                    canonical_name: entity.canonical_name.clone(),
                    source: PathBuf::from(source),
                    destination: PathBuf::from(destination),
                };
                if !self.folder_merges.contains(&hint) {
                    self.folder_merges.push(hint);
                }
            }
        }

        if let Some(alias) = alias {
            entity.add_alias(alias);
        }
        entity.fill_attributes(attributes);
        entity.append_provenance(provenance.clone());
        self.links
            .extend(candidate.links.iter().cloned().map(|l| (entity_id, l)));
    }

    /// Number of entities created or touched so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if nothing was staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.reroutes.is_empty()
    }

    /// Finishes the batch, producing graph batches grouped by namespace.
    #[must_use]
    pub fn finish(self) -> StagedOutput {
        let mut batches: BTreeMap<String, GraphBatch> = BTreeMap::new();
        let mut keys: HashMap<EntityId, NodeKey> = HashMap::new();

        for entity in self.entities.values() {
            let key = NodeKey::new(
                entity.entity_type.clone(),
                entity.namespace.clone(),
                entity.canonical_name.clone(),
            );
            keys.insert(entity.id, key.clone());
            batches
                .entry(entity.namespace.clone())
                .or_insert_with(|| GraphBatch::new(entity.namespace.clone()))
                .entities
                .push(EntityUpsert {
                    key,
                    entity_id: entity.id,
                    attributes: entity.attributes.clone(),
                    aliases: entity.aliases.clone(),
                    provenance: entity.provenance.clone(),
                });
        }

        for (entity_id, link) in self.links {
            let Some(source) = keys.get(&entity_id) else {
                continue;
            };
            let edge = RelationshipUpsert {
                source: source.clone(),
                target: link.target,
                relationship: link.relationship,
            };
            let batch = batches
                .entry(source.namespace.clone())
                .or_insert_with(|| GraphBatch::new(source.namespace.clone()));
            if !batch.relationships.contains(&edge) {
                batch.relationships.push(edge);
            }
        }

        StagedOutput {
            entities: self.entities.into_values().collect(),
            batches: batches.into_values().collect(),
            folder_merges: self.folder_merges,
            reroutes: self.reroutes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classifier;
    use crate::config::ResolverConfig;
    use crate::matcher::Matcher;

    struct Fixture {
        snapshot: CanonicalSnapshot,
        matcher: Matcher,
        classifier: Classifier,
        planner: MergePlanner,
        normalizer: Arc<Normalizer>,
    }

    impl Fixture {
        fn new(entities: Vec<CanonicalEntity>) -> Self {
            let config = Arc::new(ResolverConfig::default());
            let normalizer = Arc::new(Normalizer::new(&config));
            Self {
                snapshot: CanonicalSnapshot::build(entities, &normalizer),
                matcher: Matcher::new(Arc::clone(&config), Arc::clone(&normalizer)),
                classifier: Classifier::new(config),
                planner: MergePlanner::new(Arc::clone(&normalizer)),
                normalizer,
            }
        }

        fn assess(&self, candidate: CandidateRecord) -> Assessment {
            let matches = self.matcher.match_candidate(&candidate, &self.snapshot, 5);
            let normalized = self.normalizer.normalize(&candidate.name, &candidate.entity_type);
            Assessment {
                item_id: ItemId::compute(&candidate.entity_type, &normalized),
                tier: self.classifier.classify_ranked(&matches),
                candidate,
                normalized,
                matches,
            }
        }

        fn staged(&self) -> StagedBatch {
            StagedBatch::new(Arc::clone(&self.normalizer), "folder")
        }
    }

    fn canonical(name: &str, entity_type: EntityType) -> CanonicalEntity {
        let mut e = CanonicalEntity::new(name, entity_type);
        e.provenance.push(Provenance::new("seed", name));
        e
    }

    fn candidate(name: &str, entity_type: EntityType) -> CandidateRecord {
        CandidateRecord::new(name, entity_type, Provenance::new("scrape", name))
    }

    #[test]
    fn test_exact_attaches_without_alias() {
        let fx = Fixture::new(vec![canonical("Norton Hospital", EntityType::Provider)]);
        let a = fx.assess(candidate("Norton Hospital", EntityType::Provider));
        assert_eq!(a.tier, Tier::Exact);
        let d = fx.planner.plan(&a, None, &fx.snapshot).unwrap();
        let MergeAction::Attach { alias, .. } = &d.action else {
            panic!("expected attach");
        };
        assert!(alias.is_none());
        assert_eq!(d.canonical_name.as_deref(), Some("Norton Hospital"));
    }

    #[test]
    fn test_attach_fills_only_empty_fields_and_adds_alias() {
        let mut norton = canonical("Norton Hospital", EntityType::Provider);
        norton.attributes.insert("phone".to_string(), "502-111-0000".to_string());
        let id = norton.id;
        let fx = Fixture::new(vec![norton]);

        let c = candidate("NORTON HOSPITAL, INC.", EntityType::Provider)
            .with_attribute("phone", "")
            .with_attribute("fax", "502-111-0001");
        let a = fx.assess(c.clone());
        let d = fx.planner.plan(&a, None, &fx.snapshot).unwrap();
        let mut staged = fx.staged();
        staged.apply(&d, &c, &fx.snapshot).unwrap();
        let out = staged.finish();

        let merged = out.entities.iter().find(|e| e.id == id).unwrap();
        assert_eq!(merged.canonical_name, "Norton Hospital");
        assert_eq!(merged.attributes["phone"], "502-111-0000");
        assert_eq!(merged.attributes["fax"], "502-111-0001");
        assert_eq!(merged.aliases, vec!["NORTON HOSPITAL, INC.".to_string()]);
        assert_eq!(merged.provenance.len(), 2);
    }

    #[test]
    fn test_medium_defers_and_low_creates() {
        let fx = Fixture::new(vec![canonical("Norton Hospital", EntityType::Provider)]);
        let low = fx.assess(candidate("Jewish Hospital", EntityType::Provider));
        assert_eq!(low.tier, Tier::Low);
        let d = fx.planner.plan(&low, None, &fx.snapshot).unwrap();
        let MergeAction::Create { entity } = &d.action else {
            panic!("expected create");
        };
        assert_eq!(entity.provenance.len(), 1);

        let mut medium = low.clone();
        medium.tier = Tier::Medium;
        let d = fx.planner.plan(&medium, None, &fx.snapshot).unwrap();
        assert_eq!(d.action, MergeAction::Defer);
        assert!(d.canonical_name.is_none());
    }

    #[test]
    fn test_approve_by_name_merges_and_keeps_both_names() {
        let wht = canonical("Whaley Harrison & Thorne, PLLC", EntityType::Organization);
        let id = wht.id;
        let fx = Fixture::new(vec![wht]);
        let c = candidate("WHT Law", EntityType::Organization);
        let a = fx.assess(c.clone());
        let human = HumanOverride::Approve {
            canonical_name: Some("Whaley Harrison & Thorne, PLLC".to_string()),
        };
        let d = fx.planner.plan(&a, Some(&human), &fx.snapshot).unwrap();

        let mut staged = fx.staged();
        assert!(matches!(
            staged.apply(&d, &c, &fx.snapshot).unwrap(),
            Staged::Merged { entity_id, .. } if entity_id == id
        ));
        let out = staged.finish();
        assert_eq!(out.entities.len(), 1);
        assert_eq!(out.entities[0].aliases, vec!["WHT Law".to_string()]);
        assert_eq!(out.entities[0].provenance.len(), 2);
    }

    #[test]
    fn test_approve_unknown_name_is_error() {
        let fx = Fixture::new(vec![canonical("Norton Hospital", EntityType::Provider)]);
        let a = fx.assess(candidate("Norton Pavilion", EntityType::Provider));
        let human = HumanOverride::Approve {
            canonical_name: Some("Nowhere Clinic".to_string()),
        };
        let err = fx.planner.plan(&a, Some(&human), &fx.snapshot).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_reclassify_reroutes() {
        let fx = Fixture::new(Vec::new());
        let a = fx.assess(candidate("Jane Roe", EntityType::Attorney));
        let human = HumanOverride::Reclassify {
            entity_type: EntityType::Mediator,
        };
        let d = fx.planner.plan(&a, Some(&human), &fx.snapshot).unwrap();
        let MergeAction::Reroute { candidate } = &d.action else {
            panic!("expected reroute");
        };
        assert_eq!(candidate.entity_type, EntityType::Mediator);
        assert_eq!(candidate.namespace(), "mediator");
    }

    #[test]
    fn test_same_new_name_twice_creates_one_entity() {
        let fx = Fixture::new(Vec::new());
        let mut staged = fx.staged();
        for (i, name) in ["Baptist Health East", "BAPTIST HEALTH EAST, INC."].iter().enumerate() {
            let c = CandidateRecord::new(*name, EntityType::Provider, Provenance::new("scrape", i.to_string()));
            let a = fx.assess(c.clone());
            let d = fx.planner.plan(&a, None, &fx.snapshot).unwrap();
            staged.apply(&d, &c, &fx.snapshot).unwrap();
        }
        let out = staged.finish();
        assert_eq!(out.entities.len(), 1);
        assert_eq!(out.entities[0].canonical_name, "Baptist Health East");
        assert_eq!(out.entities[0].provenance.len(), 2);
        assert_eq!(out.batches.len(), 1);
        assert_eq!(out.batches[0].entities.len(), 1);
    }

    #[test]
    fn test_reject_onto_existing_name_is_duplicate() {
        let fx = Fixture::new(vec![canonical("John Smith", EntityType::Attorney)]);
        let c = candidate("John Smith", EntityType::Attorney);
        let a = fx.assess(c.clone());
        let d = fx.planner.plan(&a, Some(&HumanOverride::Reject), &fx.snapshot).unwrap();
        let err = fx.staged().apply(&d, &c, &fx.snapshot).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_folder_hint_and_links() {
        let mut norton = canonical("Norton Hospital", EntityType::Provider);
        norton.attributes.insert("folder".to_string(), "/cases/providers/norton".to_string());
        let fx = Fixture::new(vec![norton]);
        let case = NodeKey::in_default_namespace(EntityType::Case, "Doe v. Roe");
        let c = candidate("Norton Hospital", EntityType::Provider)
            .with_attribute("folder", "/cases/providers/norton-hosp")
            .with_link("treated_in", case.clone());
        let a = fx.assess(c.clone());
        let d = fx.planner.plan(&a, None, &fx.snapshot).unwrap();
        let mut staged = fx.staged();
        staged.apply(&d, &c, &fx.snapshot).unwrap();
        let out = staged.finish();

        assert_eq!(out.folder_merges.len(), 1);
        assert_eq!(out.folder_merges[0].source, PathBuf::from("/cases/providers/norton-hosp"));
        assert_eq!(out.folder_merges[0].destination, PathBuf::from("/cases/providers/norton"));
        assert_eq!(out.batches[0].relationships.len(), 1);
        assert_eq!(out.batches[0].relationships[0].target, case);
    }

    #[test]
    fn test_decision_mapping() {
        let current = EntityType::Attorney;
        let same = Decision::AddAs {
            entity_type: EntityType::Attorney,
            attributes: AttributeMap::new(),
        };
        assert_eq!(HumanOverride::from_decision(&same, &current).unwrap().0, HumanOverride::Reject);
        let other = Decision::AddAs {
            entity_type: EntityType::Mediator,
            attributes: AttributeMap::new(),
        };
        assert!(matches!(
            HumanOverride::from_decision(&other, &current).unwrap().0,
            HumanOverride::Reclassify { .. }
        ));
        assert!(HumanOverride::from_decision(&Decision::Ignore, &current).is_none());
    }
}
