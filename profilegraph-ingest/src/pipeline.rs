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

//! Ingestion pipeline
//!
//! ```text
//! Batch ─► EntityResolver ─► EdgeAggregator ─► connections ─► ObservationLog ─► SummaryMaintainer
//! ```
//!
//! One batch of one subject at a time; the caller (the subject writer)
//! guarantees that. The observation is written after every entity and edge
//! mutation, so its presence means the graph half of the batch is complete
//! and a retry only has to finish the summary.

use crate::batch::Batch;
use crate::edges::EdgeAggregator;
use crate::observation_log::ObservationLog;
use crate::report::IngestionReport;
use crate::resolver::EntityResolver;
use crate::summary::{SummaryDelta, SummaryMaintainer};
use profilegraph_core::{
    EngineConfig, Entity, EntityId, GraphResult, Observation, Summary,
};
use profilegraph_query::GraphSnapshot;
use profilegraph_storage::{keys, TypedStore};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// What applying a batch produced
#[derive(Debug)]
pub struct Applied {
    pub report: IngestionReport,
    pub snapshot: GraphSnapshot,
    pub summary: Summary,
}

pub struct IngestionPipeline {
    store: TypedStore,
    config: Arc<EngineConfig>,
    resolver: EntityResolver,
    edges: EdgeAggregator,
    observations: ObservationLog,
    summaries: SummaryMaintainer,
}

impl IngestionPipeline {
    pub fn new(store: TypedStore, config: Arc<EngineConfig>) -> Self {
        Self {
            resolver: EntityResolver::new(store.clone(), config.clone()),
            edges: EdgeAggregator::new(store.clone(), config.clone()),
            observations: ObservationLog::new(store.clone()),
            summaries: SummaryMaintainer::new(store.clone(), config.clone()),
            store,
            config,
        }
    }

    pub fn store(&self) -> &TypedStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn observations(&self) -> &ObservationLog {
        &self.observations
    }

    pub fn summaries(&self) -> &SummaryMaintainer {
        &self.summaries
    }

    /// Apply a batch on top of `snapshot`, the subject's current graph
    pub async fn apply(&self, batch: &Batch, snapshot: &GraphSnapshot) -> GraphResult<Applied> {
        let observation_id = batch.observation_id();

        if let Some(existing) = self
            .observations
            .get(&batch.subject_id, &observation_id)
            .await?
        {
            return self.replay(batch, existing, snapshot).await;
        }

        info!(
            subject = %batch.subject_id,
            conversation = %batch.conversation_id,
            entities = batch.entities.len(),
            relations = batch.relations.len(),
            rejected = batch.rejected.len(),
            "Applying batch"
        );

        let (entities, entity_touches) = self.resolver.resolve(batch).await?;
        let aggregation = self.edges.aggregate(batch, &entities).await?;

        let mut rejected = batch.rejected.clone();
        rejected.extend(aggregation.rejected);

        let changed_entities: Vec<Entity> = entities
            .into_iter()
            .chain(aggregation.endpoints)
            .collect();
        let mut next = snapshot.patched(changed_entities.clone(), aggregation.edges.clone());

        let connected: BTreeSet<EntityId> = aggregation
            .edges
            .iter()
            .flat_map(|e| [e.source_id.clone(), e.target_id.clone()])
            .collect();
        let refreshed = self.summaries.refresh_connections(&next, &connected).await?;
        if !refreshed.is_empty() {
            next = next.patched(refreshed, Vec::new());
        }

        let observation = Observation {
            id: observation_id,
            subject_id: batch.subject_id.clone(),
            conversation_id: batch.conversation_id.clone(),
            batch_key: batch.key.clone(),
            observed_at: batch.observed_at,
            entity_touches,
            edge_touches: aggregation.touches,
            rejected_count: rejected.len(),
            extraction_version: self.config.extraction_version.clone(),
        };
        self.observations.record(&observation).await?;

        let summary = self.apply_summary(batch, &observation, &next).await?;

        let report = IngestionReport::from_observation(&observation, rejected, false);
        info!(
            subject = %batch.subject_id,
            observation = %observation.id,
            entities = report.entities_touched.len(),
            edges = report.edges_touched.len(),
            rejected = report.rejected.len(),
            "Batch applied"
        );

        Ok(Applied {
            report,
            snapshot: next,
            summary,
        })
    }

    /// The observation exists: the graph half is done, finish the summary
    async fn replay(
        &self,
        batch: &Batch,
        observation: Observation,
        snapshot: &GraphSnapshot,
    ) -> GraphResult<Applied> {
        debug!(
            subject = %batch.subject_id,
            observation = %observation.id,
            "Batch already recorded, replaying"
        );

        let summary = self.apply_summary(batch, &observation, snapshot).await?;
        let report = IngestionReport::from_observation(&observation, batch.rejected.clone(), true);

        Ok(Applied {
            report,
            snapshot: snapshot.clone(),
            summary,
        })
    }

    async fn apply_summary(
        &self,
        batch: &Batch,
        observation: &Observation,
        snapshot: &GraphSnapshot,
    ) -> GraphResult<Summary> {
        let mut changed = Vec::new();
        for id in observation.entity_ids() {
            match snapshot.entity(&id) {
                Some(entity) => changed.push(entity.clone()),
                None => {
                    if let Some(entity) = self
                        .store
                        .get::<Entity>(&keys::entity(&batch.subject_id, &id))
                        .await?
                    {
                        changed.push(entity);
                    }
                }
            }
        }

        let new_entities = changed
            .iter()
            .filter(|e| batch.owns_mark(&e.created_by))
            .map(|e| e.entity_type)
            .collect();
        let mut created_edges = BTreeSet::new();
        for touch in observation.edge_touches.iter().filter(|t| t.created) {
            created_edges.insert(touch.edge_id.clone());
        }

        let delta = SummaryDelta {
            changed,
            new_entities,
            new_edges: created_edges.len() as u64,
        }
        .dedup();

        self.summaries
            .apply(
                &batch.subject_id,
                &batch.key,
                &observation.id,
                batch.observed_at,
                &delta,
            )
            .await
    }
}
