// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Entity resolver and aggregator
//!
//! Each accepted entity candidate becomes one read-modify-write of a single
//! entity document:
//!
//! ```text
//! absent   -> create: counters = 1, strength = confidence
//! present  -> merge:  mention_count += 1
//!                     conversation_count += 1 on its first mention from a conversation
//!                     strength = max(strength, confidence)
//!                     recent_observations.push(..)
//! ```
//!
//! The merge is joint and conditional, so it runs through the store's
//! compare-and-swap transaction. A mutation mark makes re-applying the same
//! candidate a no-op.

use crate::batch::Batch;
use crate::validator::ValidatedEntity;
use profilegraph_core::{
    AffectMoment, EngineConfig, Entity, EntityAttributes, EntityCandidate, EntityId, EntityTouch,
    GraphResult, Milestone, Occurrence, RecentObservation,
};
use profilegraph_storage::{keys, Outcome, TypedStore};
use std::sync::Arc;
use tracing::debug;

/// Result of resolving one candidate
#[derive(Debug, Clone)]
pub struct ResolvedEntity {
    pub entity: Entity,
    /// Whether this mutation created the entity
    pub created: bool,
    /// Whether the mutation had already been applied
    pub skipped: bool,
}

/// Pure create-or-merge step for one candidate
pub fn merge_entity(
    current: Option<Entity>,
    id: &EntityId,
    candidate: &EntityCandidate,
    occurrence: &Occurrence,
    mark: &str,
    config: &EngineConfig,
) -> Outcome<Entity, ResolvedEntity> {
    let mut entity = match current {
        Some(existing) if existing.has_applied(mark) => {
            let created = existing.created_by == mark;
            return Outcome::Abort(ResolvedEntity {
                entity: existing,
                created,
                skipped: true,
            });
        }
        Some(mut existing) => {
            existing.mention_count += 1;
            if existing.record_conversation(&occurrence.conversation_id) {
                existing.conversation_count += 1;
            }
            existing.strength = existing.strength.max(candidate.confidence);
            existing.last_observed_at = occurrence.observed_at;
            existing.last_conversation_id = occurrence.conversation_id.clone();
            existing.recent_observations.push(RecentObservation {
                conversation_id: occurrence.conversation_id.clone(),
                observed_at: occurrence.observed_at,
                snippet: occurrence.evidence.clone(),
            });
            existing.attributes.merge_from(&candidate.attributes);
            existing
        }
        None => {
            let mut created = Entity::new(
                id.clone(),
                candidate.name.clone(),
                candidate.attributes.clone(),
                candidate.confidence,
                occurrence,
                config,
            );
            created.created_by = mark.to_string();
            created
        }
    };

    record_domain_logs(&mut entity, candidate, occurrence);
    entity.applied_marks.push(mark.to_string());

    let created = entity.created_by == mark;
    Outcome::Commit(
        entity.clone(),
        ResolvedEntity {
            entity,
            created,
            skipped: false,
        },
    )
}

fn record_domain_logs(entity: &mut Entity, candidate: &EntityCandidate, occurrence: &Occurrence) {
    if let Some(milestone) = &candidate.milestone {
        entity.milestones.push(Milestone {
            milestone: milestone.clone(),
            conversation_id: occurrence.conversation_id.clone(),
            achieved_at: occurrence.observed_at,
            evidence: occurrence.evidence.clone(),
        });
        if let EntityAttributes::Skill {
            last_demonstrated, ..
        } = &mut entity.attributes
        {
            *last_demonstrated = Some(occurrence.observed_at);
        }
    }

    if let Some(emotion) = &candidate.emotion {
        entity.affect_moments.push(AffectMoment {
            emotion: emotion.clone(),
            intensity: candidate.emotion_intensity,
            conversation_id: occurrence.conversation_id.clone(),
            observed_at: occurrence.observed_at,
        });
    }
}

/// Applies the entity half of a batch
pub struct EntityResolver {
    store: TypedStore,
    config: Arc<EngineConfig>,
}

impl EntityResolver {
    pub fn new(store: TypedStore, config: Arc<EngineConfig>) -> Self {
        Self { store, config }
    }

    pub async fn resolve_one(
        &self,
        batch: &Batch,
        ordinal: usize,
        validated: &ValidatedEntity,
    ) -> GraphResult<ResolvedEntity> {
        let mark = batch.entity_mark(ordinal);
        let occurrence = batch.occurrence(&validated.candidate.evidence);
        let key = keys::entity(&batch.subject_id, &validated.id);

        let resolved = self
            .store
            .transact(&key, |current: Option<Entity>| {
                Ok(merge_entity(
                    current,
                    &validated.id,
                    &validated.candidate,
                    &occurrence,
                    &mark,
                    &self.config,
                ))
            })
            .await?;

        debug!(
            subject = %batch.subject_id,
            entity = %validated.id,
            created = resolved.created,
            skipped = resolved.skipped,
            mentions = resolved.entity.mention_count,
            "Resolved entity"
        );
        Ok(resolved)
    }

    /// Resolve every accepted entity of a batch, in candidate order
    pub async fn resolve(&self, batch: &Batch) -> GraphResult<(Vec<Entity>, Vec<EntityTouch>)> {
        let mut entities = Vec::with_capacity(batch.entities.len());
        let mut touches = Vec::with_capacity(batch.entities.len());

        for (ordinal, validated) in batch.entities.iter().enumerate() {
            let resolved = self.resolve_one(batch, ordinal, validated).await?;
            touches.push(EntityTouch {
                entity_id: validated.id.clone(),
                entity_type: validated.candidate.entity_type,
                name: validated.candidate.name.clone(),
                confidence: validated.candidate.confidence,
                evidence: validated.candidate.evidence.clone(),
                created: resolved.created,
            });
            entities.push(resolved.entity);
        }

        Ok((entities, touches))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use profilegraph_core::EntityType;
    use proptest::prelude::*;

    fn commit(outcome: Outcome<Entity, ResolvedEntity>) -> ResolvedEntity {
        match outcome {
            Outcome::Commit(_, resolved) => resolved,
            Outcome::Abort(_) => panic!("Expected a commit"),
        }
    }

    fn apply(
        current: Option<Entity>,
        confidence: f64,
        conversation: &str,
        mark: &str,
    ) -> ResolvedEntity {
        let candidate = EntityCandidate::new("Dinosaurs", EntityType::Topic, confidence);
        let occurrence = Occurrence::new(conversation, Utc::now(), "dinosaurs!");
        commit(merge_entity(
            current,
            &"topic_dinosaurs".to_string(),
            &candidate,
            &occurrence,
            mark,
            &EngineConfig::default(),
        ))
    }

    #[test]
    fn test_create_then_merge() {
        let first = apply(None, 0.8, "conv-1", "k1#e0");
        assert!(first.created);
        assert_eq!(first.entity.mention_count, 1);
        assert_eq!(first.entity.strength, 0.8);

        let second = apply(Some(first.entity), 0.75, "conv-1", "k2#e0");
        assert!(!second.created);
        assert_eq!(second.entity.mention_count, 2);
        assert_eq!(second.entity.conversation_count, 1);
        assert_eq!(second.entity.strength, 0.8);

        let third = apply(Some(second.entity), 0.95, "conv-2", "k3#e0");
        assert_eq!(third.entity.mention_count, 3);
        assert_eq!(third.entity.conversation_count, 2);
        assert_eq!(third.entity.strength, 0.95);
        assert_eq!(third.entity.last_conversation_id, "conv-2");
        assert_eq!(third.entity.recent_observations.len(), 3);
    }

    #[test]
    fn test_resumed_conversation_counts_once() {
        let a = apply(None, 0.8, "conv-1", "k1#e0");
        let b = apply(Some(a.entity), 0.8, "conv-2", "k2#e0");
        let c = apply(Some(b.entity), 0.8, "conv-1", "k3#e0");
        assert_eq!(c.entity.conversation_count, 2);
        assert_eq!(c.entity.mention_count, 3);
    }

    #[test]
    fn test_conversation_resumed_after_window_counts_once() {
        let mut entity = apply(None, 0.8, "conv-1", "k0#e0").entity;
        for i in 1..=5 {
            entity = apply(Some(entity), 0.8, "conv-2", &format!("k{}#e0", i)).entity;
        }
        assert!(entity
            .recent_observations
            .iter()
            .all(|o| o.conversation_id == "conv-2"));

        let resumed = apply(Some(entity), 0.8, "conv-1", "k6#e0").entity;
        assert_eq!(resumed.mention_count, 7);
        assert_eq!(resumed.conversation_count, 2);
        assert_eq!(resumed.conversation_ids.len(), 2);
    }

    #[test]
    fn test_applied_mark_is_skipped() {
        let first = apply(None, 0.8, "conv-1", "k1#e0");
        let candidate = EntityCandidate::new("Dinosaurs", EntityType::Topic, 0.9);
        let occurrence = Occurrence::new("conv-1", Utc::now(), "again");

        match merge_entity(
            Some(first.entity.clone()),
            &"topic_dinosaurs".to_string(),
            &candidate,
            &occurrence,
            "k1#e0",
            &EngineConfig::default(),
        ) {
            Outcome::Abort(resolved) => {
                assert!(resolved.skipped);
                assert!(resolved.created);
                assert_eq!(resolved.entity, first.entity);
            }
            Outcome::Commit(..) => panic!("Expected the mark to short-circuit"),
        }
    }

    #[test]
    fn test_recent_observations_evict_oldest() {
        let mut entity = apply(None, 0.8, "conv-0", "k0#e0").entity;
        for i in 1..8 {
            entity = apply(Some(entity), 0.8, &format!("conv-{}", i), &format!("k{}#e0", i)).entity;
        }
        let conversations: Vec<&str> = entity
            .recent_observations
            .iter()
            .map(|o| o.conversation_id.as_str())
            .collect();
        assert_eq!(conversations, vec!["conv-3", "conv-4", "conv-5", "conv-6", "conv-7"]);
    }

    #[test]
    fn test_milestone_and_affect_logs() {
        let mut candidate = EntityCandidate::new("Counting to 20", EntityType::Skill, 0.9);
        candidate.milestone = Some("Counts to 20".into());
        candidate.emotion = Some("pride".into());
        candidate.emotion_intensity = Some(0.8);
        let at = Utc::now() - Duration::minutes(5);
        let occurrence = Occurrence::new("conv-1", at, "one, two, ... twenty!");

        let resolved = commit(merge_entity(
            None,
            &"skill_counting_to_20".to_string(),
            &candidate,
            &occurrence,
            "k#e0",
            &EngineConfig::default(),
        ));

        assert_eq!(resolved.entity.milestones.len(), 1);
        assert_eq!(resolved.entity.affect_moments.len(), 1);
        match resolved.entity.attributes {
            EntityAttributes::Skill {
                last_demonstrated, ..
            } => assert_eq!(last_demonstrated, Some(at)),
            _ => panic!("Expected skill attributes"),
        }
    }

    proptest! {
        #[test]
        fn prop_strength_never_decreases(
            confidences in proptest::collection::vec(0.7f64..=1.0, 1..30),
            conversations in proptest::collection::vec(0usize..4, 1..30),
        ) {
            let mut entity: Option<Entity> = None;
            let mut max_seen = 0.0f64;
            let mut mentions = 0u64;
            let mut distinct = std::collections::BTreeSet::new();

            for (i, confidence) in confidences.iter().enumerate() {
                let conversation = format!("conv-{}", conversations[i % conversations.len()]);
                let previous_strength = entity.as_ref().map(|e| e.strength).unwrap_or(0.0);
                let resolved = apply(entity.take(), *confidence, &conversation, &format!("k{}#e0", i));
                max_seen = max_seen.max(*confidence);
                mentions += 1;
                distinct.insert(conversation.clone());

                prop_assert!(resolved.entity.strength >= previous_strength);
                prop_assert_eq!(resolved.entity.strength, max_seen);
                prop_assert_eq!(resolved.entity.mention_count, mentions);
                prop_assert_eq!(resolved.entity.conversation_count, distinct.len() as u64);
                entity = Some(resolved.entity);
            }
        }
    }
}
