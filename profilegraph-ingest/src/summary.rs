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

//! Summary maintainer
//!
//! Two ways to derive a [`Summary`]:
//!
//! - [`naive_summary`] rescans every entity of the subject and ranks from
//!   scratch. It is the reference result.
//! - [`apply_incremental`] folds one batch into a stored summary with single
//!   remove/insert operations per changed entity.
//!
//! The incremental path is exact because rank keys only grow: strength is a
//! running maximum and mention count never decreases. An entity that leaves a
//! top-N list can only return by changing, and every changed entity is
//! re-inserted.

use crate::cache::SummaryCache;
use profilegraph_core::{
    rank_order, Connection, EngineConfig, Entity, EntityId, EntityType, GraphResult,
    ObservationId, RankedEntity, Summary,
};
use profilegraph_query::{Direction, GraphSnapshot};
use profilegraph_storage::{keys, Outcome, TypedStore};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// What one batch changed, as seen by the summary
#[derive(Debug, Clone, Default)]
pub struct SummaryDelta {
    /// Final state of every entity the batch touched, one per id
    pub changed: Vec<Entity>,
    /// Types of the entities this batch created
    pub new_entities: Vec<EntityType>,
    pub new_edges: u64,
}

impl SummaryDelta {
    /// Keep the last state per id
    pub fn dedup(mut self) -> Self {
        let mut latest: BTreeMap<EntityId, Entity> = BTreeMap::new();
        for entity in self.changed.drain(..) {
            latest.insert(entity.id.clone(), entity);
        }
        self.changed = latest.into_values().collect();
        self
    }
}

/// Rank every entity from scratch
pub fn naive_summary<'a>(
    subject_id: &str,
    entities: impl IntoIterator<Item = &'a Entity>,
    total_edges: u64,
    top_n: usize,
) -> Summary {
    let mut summary = Summary::empty(subject_id);
    summary.total_edges = total_edges;

    for entity in entities {
        summary.total_entities += 1;
        *summary.counts_by_type.entry(entity.entity_type).or_insert(0) += 1;
        summary
            .top_by_type
            .entry(entity.entity_type)
            .or_default()
            .push(RankedEntity::from(entity));
    }

    for list in summary.top_by_type.values_mut() {
        list.sort_by(rank_order);
        list.truncate(top_n);
    }

    summary
}

/// Fold one batch into an existing summary
pub fn apply_incremental(summary: &mut Summary, delta: &SummaryDelta, top_n: usize) {
    summary.total_entities += delta.new_entities.len() as u64;
    summary.total_edges += delta.new_edges;
    for entity_type in &delta.new_entities {
        *summary.counts_by_type.entry(*entity_type).or_insert(0) += 1;
    }

    for entity in &delta.changed {
        let ranked = RankedEntity::from(entity);
        let list = summary.top_by_type.entry(entity.entity_type).or_default();
        list.retain(|r| r.id != ranked.id);
        let position = list.partition_point(|r| rank_order(r, &ranked) == Ordering::Less);
        if position < top_n {
            list.insert(position, ranked);
            list.truncate(top_n);
        }
    }
}

/// Strongest connections of an entity in a snapshot
pub fn top_connections(snapshot: &GraphSnapshot, entity_id: &str, n: usize) -> Vec<Connection> {
    let mut connections: Vec<Connection> = snapshot
        .edges_of(entity_id, Direction::Both)
        .into_iter()
        .filter_map(|edge| {
            edge.other_endpoint(entity_id).map(|other| Connection {
                entity_id: other.to_string(),
                edge_id: edge.id.clone(),
                edge_type: edge.edge_type,
                weight: edge.weight,
            })
        })
        .collect();

    connections.sort_by(|a, b| {
        b.weight
            .total_cmp(&a.weight)
            .then_with(|| a.entity_id.cmp(&b.entity_id))
            .then_with(|| a.edge_id.cmp(&b.edge_id))
    });
    connections.truncate(n);
    connections
}

pub struct SummaryMaintainer {
    store: TypedStore,
    config: Arc<EngineConfig>,
}

impl SummaryMaintainer {
    pub fn new(store: TypedStore, config: Arc<EngineConfig>) -> Self {
        Self { store, config }
    }

    /// Stored summary, or an empty one for a new subject
    pub async fn get(&self, subject_id: &str) -> GraphResult<Summary> {
        Ok(self
            .store
            .get(&keys::summary(subject_id))
            .await?
            .unwrap_or_else(|| Summary::empty(subject_id)))
    }

    /// Stored summary, decoded through `cache` while its version is unchanged
    pub async fn get_cached(&self, subject_id: &str, cache: &SummaryCache) -> GraphResult<Arc<Summary>> {
        let stored = match self.store.raw().get(&keys::summary(subject_id)).await? {
            Some(stored) => stored,
            None => return Ok(Arc::new(Summary::empty(subject_id))),
        };
        if let Some(summary) = cache.get(subject_id, stored.version) {
            return Ok(summary);
        }

        let summary: Summary = serde_json::from_value(stored.doc)?;
        Ok(cache.insert(stored.version, summary))
    }

    /// Fold a batch into the stored summary, once per batch key
    pub async fn apply(
        &self,
        subject_id: &str,
        batch_key: &str,
        observation_id: &ObservationId,
        observed_at: DateTime<Utc>,
        delta: &SummaryDelta,
    ) -> GraphResult<Summary> {
        let top_n = self.config.summary_top_n;
        let summary = self
            .store
            .transact(&keys::summary(subject_id), |current: Option<Summary>| {
                let mut summary = current.unwrap_or_else(|| Summary::empty(subject_id));
                if summary.has_applied(batch_key) {
                    return Ok(Outcome::Abort(summary));
                }

                apply_incremental(&mut summary, delta, top_n);
                summary.last_observation_id = Some(observation_id.clone());
                summary.last_updated_at = Some(match summary.last_updated_at {
                    Some(previous) => previous.max(observed_at),
                    None => observed_at,
                });
                summary.applied_batches.push(batch_key.to_string());
                Ok(Outcome::Commit(summary.clone(), summary))
            })
            .await?;

        debug!(
            subject = subject_id,
            entities = summary.total_entities,
            edges = summary.total_edges,
            "Summary updated"
        );
        Ok(summary)
    }

    /// Recompute the summary from a full rescan and store it
    pub async fn rebuild(&self, subject_id: &str) -> GraphResult<Summary> {
        let entities: Vec<Entity> = self.store.scan(&keys::entities_prefix(subject_id)).await?;
        let edge_count = self
            .store
            .raw()
            .scan_prefix(&keys::edges_prefix(subject_id))
            .await?
            .len() as u64;

        let previous = self.get(subject_id).await?;
        let mut summary = naive_summary(subject_id, &entities, edge_count, self.config.summary_top_n);
        summary.last_observation_id = previous.last_observation_id;
        summary.last_updated_at = previous.last_updated_at;
        summary.applied_batches = previous.applied_batches;

        self.store.put(&keys::summary(subject_id), &summary).await?;
        debug!(subject = subject_id, entities = entities.len(), "Summary rebuilt");
        Ok(summary)
    }

    /// Refresh the cached strongest connections of the given entities.
    ///
    /// Returns the entities whose list changed.
    pub async fn refresh_connections<'a>(
        &self,
        snapshot: &GraphSnapshot,
        entity_ids: impl IntoIterator<Item = &'a EntityId>,
    ) -> GraphResult<Vec<Entity>> {
        let n = self.config.top_connections;
        let mut updated = Vec::new();

        for entity_id in entity_ids {
            let connections = top_connections(snapshot, entity_id, n);
            let unchanged = snapshot
                .entity(entity_id)
                .map(|e| e.edge_stats.top_connections == connections)
                .unwrap_or(false);
            if unchanged {
                continue;
            }

            let key = keys::entity(snapshot.subject_id(), entity_id);
            let changed = self
                .store
                .transact(&key, |current: Option<Entity>| match current {
                    Some(entity) if entity.edge_stats.top_connections == connections => {
                        Ok(Outcome::Abort(None))
                    }
                    Some(mut entity) => {
                        entity.edge_stats.top_connections = connections.clone();
                        Ok(Outcome::Commit(entity.clone(), Some(entity)))
                    }
                    None => Ok(Outcome::Abort(None)),
                })
                .await?;
            updated.extend(changed);
        }

        Ok(updated)
    }
}
