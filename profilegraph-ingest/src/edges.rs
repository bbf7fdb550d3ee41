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

//! Edge aggregator
//!
//! Relation candidates are resolved to entity pairs that already exist,
//! either created earlier in the same batch or present in the store. Edge
//! weight is the running mean of observed confidences:
//!
//! ```text
//! create: weight = c, n = 1
//! update: weight = (weight * n + c) / (n + 1), n += 1
//! ```
//!
//! Endpoint edge counters are bumped once, when the edge is created.

use crate::batch::Batch;
use crate::validator::ValidatedRelation;
use profilegraph_core::{
    CandidateRejection, Edge, EdgeId, EdgeTouch, EndpointRef, EngineConfig, Entity, EntityId,
    EvidenceSnippet, GraphError, GraphResult, Occurrence, RelationCandidate, ValidationError,
};
use profilegraph_core::ids;
use profilegraph_storage::{keys, Outcome, TypedStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ResolvedEdge {
    pub edge: Edge,
    pub created: bool,
    pub skipped: bool,
}

/// Pure create-or-update step for one relation.
///
/// Fails when the stored edge connects a different endpoint pair.
#[allow(clippy::too_many_arguments)]
pub fn merge_edge(
    current: Option<Edge>,
    id: &EdgeId,
    source: &EndpointRef,
    target: &EndpointRef,
    candidate: &RelationCandidate,
    occurrence: &Occurrence,
    mark: &str,
    config: &EngineConfig,
) -> GraphResult<Outcome<Edge, ResolvedEdge>> {
    if let Some(existing) = &current {
        if existing.source_id != source.id || existing.target_id != target.id {
            return Err(GraphError::EdgeEndpointMismatch {
                edge_id: id.clone(),
                stored: format!("{} -> {}", existing.source_id, existing.target_id),
                incoming: format!("{} -> {}", source.id, target.id),
            });
        }
    }

    let mut edge = match current {
        Some(existing) if existing.has_applied(mark) => {
            let created = existing.created_by == mark;
            return Ok(Outcome::Abort(ResolvedEdge {
                edge: existing,
                created,
                skipped: true,
            }));
        }
        Some(mut existing) => {
            let n = existing.observation_count as f64;
            existing.weight =
                ((existing.weight * n + candidate.confidence) / (n + 1.0)).clamp(0.0, 1.0);
            existing.observation_count += 1;
            existing.last_observed_at = occurrence.observed_at;
            existing
                .conversation_ids
                .push_unique(occurrence.conversation_id.clone());
            existing.evidence_snippets.push(EvidenceSnippet {
                conversation_id: occurrence.conversation_id.clone(),
                observed_at: occurrence.observed_at,
                snippet: occurrence.evidence.clone(),
            });
            if candidate.attributes.edge_type() == existing.edge_type {
                existing.attributes = candidate.attributes.clone();
            }
            existing
        }
        None => {
            let mut created = Edge::new(
                id.clone(),
                source.clone(),
                target.clone(),
                candidate.attributes.clone(),
                candidate.confidence,
                occurrence,
                config,
            );
            created.created_by = mark.to_string();
            created
        }
    };

    edge.applied_marks.push(mark.to_string());
    let created = edge.created_by == mark;
    Ok(Outcome::Commit(
        edge.clone(),
        ResolvedEdge {
            edge,
            created,
            skipped: false,
        },
    ))
}

/// Count a newly created edge on one endpoint
fn bump_edge_stats(
    current: Option<Entity>,
    edge: &Edge,
    mark: &str,
    occurrence: &Occurrence,
) -> Outcome<Entity, Option<Entity>> {
    let mut entity = match current {
        None => return Outcome::Abort(None),
        Some(entity) if entity.has_applied(mark) => return Outcome::Abort(Some(entity)),
        Some(entity) => entity,
    };

    let stats = &mut entity.edge_stats;
    stats.total += 1;
    *stats.by_type.entry(edge.edge_type).or_insert(0) += 1;
    if edge.source_id == entity.id {
        stats.outgoing += 1;
    } else {
        stats.incoming += 1;
    }
    entity.last_graph_update_at = Some(occurrence.observed_at);
    entity.applied_marks.push(mark.to_string());

    Outcome::Commit(entity.clone(), Some(entity))
}

/// Output of the edge half of a batch
#[derive(Debug, Default)]
pub struct EdgeAggregation {
    pub edges: Vec<Edge>,
    pub touches: Vec<EdgeTouch>,
    /// Endpoints whose counters changed
    pub endpoints: Vec<Entity>,
    pub rejected: Vec<CandidateRejection>,
}

pub struct EdgeAggregator {
    store: TypedStore,
    config: Arc<EngineConfig>,
}

impl EdgeAggregator {
    pub fn new(store: TypedStore, config: Arc<EngineConfig>) -> Self {
        Self { store, config }
    }

    async fn lookup(
        &self,
        subject_id: &str,
        id: &EntityId,
        known: &mut HashMap<EntityId, Entity>,
    ) -> GraphResult<Option<EndpointRef>> {
        if let Some(entity) = known.get(id) {
            return Ok(Some(EndpointRef::from(entity)));
        }
        let stored: Option<Entity> = self.store.get(&keys::entity(subject_id, id)).await?;
        Ok(stored.map(|entity| {
            let endpoint = EndpointRef::from(&entity);
            known.insert(id.clone(), entity);
            endpoint
        }))
    }

    /// Aggregate every accepted relation of a batch.
    ///
    /// `resolved` holds the entities written earlier in the batch.
    pub async fn aggregate(&self, batch: &Batch, resolved: &[Entity]) -> GraphResult<EdgeAggregation> {
        let mut known: HashMap<EntityId, Entity> = resolved
            .iter()
            .map(|e| (e.id.clone(), e.clone()))
            .collect();
        let mut out = EdgeAggregation::default();

        for (ordinal, relation) in batch.relations.iter().enumerate() {
            let ValidatedRelation {
                index,
                source_id,
                target_id,
                candidate,
            } = relation;

            let label = format!("{} -> {}", candidate.source_name, candidate.target_name);
            let source = self.lookup(&batch.subject_id, source_id, &mut known).await?;
            let target = self.lookup(&batch.subject_id, target_id, &mut known).await?;
            let (source, target) = match (source, target) {
                (Some(s), Some(t)) => (s, t),
                (source, _) => {
                    let missing = if source.is_none() {
                        &candidate.source_name
                    } else {
                        &candidate.target_name
                    };
                    warn!(
                        subject = %batch.subject_id,
                        relation = %label,
                        endpoint = %missing,
                        "Dropping relation with unresolved endpoint"
                    );
                    out.rejected.push(CandidateRejection::relation(
                        *index,
                        Some(label),
                        ValidationError::UnresolvedEndpoint {
                            name: missing.clone(),
                        },
                    ));
                    continue;
                }
            };

            let (edge_id, stored_source, _) =
                ids::edge_id(candidate.edge_type, &source.id, &target.id);
            let (source, target) = if stored_source == source.id {
                (source, target)
            } else {
                (target, source)
            };

            let mark = batch.relation_mark(ordinal);
            let occurrence = batch.occurrence(&candidate.evidence);
            let resolved = self
                .store
                .transact(&keys::edge(&batch.subject_id, &edge_id), |current: Option<Edge>| {
                    merge_edge(
                        current,
                        &edge_id,
                        &source,
                        &target,
                        candidate,
                        &occurrence,
                        &mark,
                        &self.config,
                    )
                })
                .await?;

            debug!(
                subject = %batch.subject_id,
                edge = %edge_id,
                created = resolved.created,
                skipped = resolved.skipped,
                weight = resolved.edge.weight,
                "Aggregated edge"
            );

            if resolved.created {
                let stats_mark = format!("{}:stats", mark);
                for endpoint in [&resolved.edge.source_id, &resolved.edge.target_id] {
                    let updated = self
                        .store
                        .transact(
                            &keys::entity(&batch.subject_id, endpoint),
                            |current: Option<Entity>| {
                                Ok(bump_edge_stats(current, &resolved.edge, &stats_mark, &occurrence))
                            },
                        )
                        .await?;
                    if let Some(entity) = updated {
                        known.insert(entity.id.clone(), entity.clone());
                        out.endpoints.retain(|e| e.id != entity.id);
                        out.endpoints.push(entity);
                    }
                }
            }

            out.touches.push(EdgeTouch {
                edge_id: edge_id.clone(),
                edge_type: candidate.edge_type,
                source_id: resolved.edge.source_id.clone(),
                target_id: resolved.edge.target_id.clone(),
                confidence: candidate.confidence,
                evidence: candidate.evidence.clone(),
                created: resolved.created,
            });
            out.edges.retain(|e| e.id != edge_id);
            out.edges.push(resolved.edge);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use profilegraph_core::{EdgeAttributes, EdgeType, EntityType};
    use proptest::prelude::*;

    fn endpoint(id: &str) -> EndpointRef {
        EndpointRef {
            id: id.to_string(),
            entity_type: EntityType::Topic,
            name: id.to_string(),
        }
    }

    fn edge_id() -> EdgeId {
        ids::edge_id(EdgeType::TemporalCooccurrence, "topic_a", "topic_b").0
    }

    fn apply(current: Option<Edge>, confidence: f64, conversation: &str, mark: &str) -> ResolvedEdge {
        let candidate = RelationCandidate::new(
            ("a", EntityType::Topic),
            ("b", EntityType::Topic),
            EdgeType::TemporalCooccurrence,
            confidence,
        );
        let occurrence = Occurrence::new(conversation, Utc::now(), "together");
        match merge_edge(
            current,
            &edge_id(),
            &endpoint("topic_a"),
            &endpoint("topic_b"),
            &candidate,
            &occurrence,
            mark,
            &EngineConfig::default(),
        )
        .unwrap()
        {
            Outcome::Commit(_, resolved) | Outcome::Abort(resolved) => resolved,
        }
    }

    #[test]
    fn test_moving_average() {
        let first = apply(None, 0.8, "conv-1", "k1#r0");
        assert!(first.created);
        assert_eq!(first.edge.weight, 0.8);

        let second = apply(Some(first.edge), 1.0, "conv-1", "k2#r0");
        assert!((second.edge.weight - 0.9).abs() < 1e-12);
        assert_eq!(second.edge.observation_count, 2);
        assert_eq!(second.edge.conversation_ids.len(), 1);

        let third = apply(Some(second.edge), 0.7, "conv-2", "k3#r0");
        assert!((third.edge.weight - 2.5 / 3.0).abs() < 1e-12);
        assert_eq!(third.edge.conversation_ids.to_vec(), vec!["conv-1", "conv-2"]);
        assert_eq!(third.edge.evidence_snippets.len(), 3);
    }

    #[test]
    fn test_replayed_mark_is_noop() {
        let first = apply(None, 0.8, "conv-1", "k1#r0");
        let again = apply(Some(first.edge.clone()), 0.8, "conv-1", "k1#r0");
        assert!(again.skipped);
        assert!(again.created);
        assert_eq!(again.edge, first.edge);
    }

    #[test]
    fn test_newest_attributes_replace() {
        let first = apply(None, 0.8, "conv-1", "k1#r0");
        let mut candidate = RelationCandidate::new(
            ("a", EntityType::Topic),
            ("b", EntityType::Topic),
            EdgeType::TemporalCooccurrence,
            0.9,
        );
        candidate.attributes = EdgeAttributes::Cooccurrence {
            frequency: Some(0.5),
            time_proximity: Some(0.9),
        };
        let occurrence = Occurrence::new("conv-2", Utc::now(), "");
        let updated = match merge_edge(
            Some(first.edge),
            &edge_id(),
            &endpoint("topic_a"),
            &endpoint("topic_b"),
            &candidate,
            &occurrence,
            "k2#r0",
            &EngineConfig::default(),
        )
        .unwrap()
        {
            Outcome::Commit(edge, _) => edge,
            Outcome::Abort(_) => panic!("Expected a commit"),
        };
        assert_eq!(updated.attributes, candidate.attributes);
    }

    #[test]
    fn test_endpoint_mismatch_is_refused() {
        let stored = apply(None, 0.8, "conv-1", "k1#r0").edge;
        let candidate = RelationCandidate::new(
            ("a", EntityType::Topic),
            ("c", EntityType::Topic),
            EdgeType::TemporalCooccurrence,
            0.9,
        );
        let occurrence = Occurrence::new("conv-2", Utc::now(), "");

        let err = merge_edge(
            Some(stored),
            &edge_id(),
            &endpoint("topic_a"),
            &endpoint("topic_c"),
            &candidate,
            &occurrence,
            "k2#r0",
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, GraphError::EdgeEndpointMismatch { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_edge_stats_bumped_once() {
        let occurrence = Occurrence::new("conv-1", Utc::now(), "");
        let config = EngineConfig::default();
        let entity = Entity::new(
            "topic_a".into(),
            "a",
            profilegraph_core::EntityAttributes::default_for(EntityType::Topic),
            0.9,
            &occurrence,
            &config,
        );
        let edge = apply(None, 0.8, "conv-1", "k1#r0").edge;

        let bumped = match bump_edge_stats(Some(entity), &edge, "k1#r0:stats", &occurrence) {
            Outcome::Commit(e, _) => e,
            Outcome::Abort(_) => panic!("Expected a commit"),
        };
        assert_eq!(bumped.edge_stats.total, 1);
        assert_eq!(bumped.edge_stats.outgoing, 1);
        assert_eq!(bumped.edge_stats.by_type[&EdgeType::TemporalCooccurrence], 1);

        assert!(matches!(
            bump_edge_stats(Some(bumped), &edge, "k1#r0:stats", &occurrence),
            Outcome::Abort(Some(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_weight_stays_in_unit_interval(confidences in proptest::collection::vec(0.0f64..=1.0, 1..50)) {
            let mut edge: Option<Edge> = None;
            for (i, c) in confidences.iter().enumerate() {
                let resolved = apply(edge.take(), *c, "conv", &format!("k{}#r0", i));
                prop_assert!((0.0..=1.0).contains(&resolved.edge.weight));
                prop_assert_eq!(resolved.edge.observation_count, i as u64 + 1);
                edge = Some(resolved.edge);
            }
            let mean = confidences.iter().sum::<f64>() / confidences.len() as f64;
            let weight = edge.map(|e| e.weight).unwrap_or_default();
            prop_assert!((weight - mean).abs() < 1e-9);
        }
    }
}
