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

//! Knowledge graph service
//!
//! The facade callers use: ingestion through the extraction oracle and every
//! graph query. Ingestion is serialized per subject by the writer registry.
//! Queries never go through a writer: each one loads the subject's graph from
//! the store when it starts, so it sees every completed write, including
//! those of other processes sharing the store.

use crate::actor::{WriterRegistry, WriterRegistryConfig, WriterStats, DEFAULT_QUEUE_CAPACITY};
use crate::batch::Batch;
use crate::cache::{SummaryCache, SummaryCacheStats};
use crate::oracle::{ExtractionOracle, SubjectContext, TranscriptContext};
use crate::parser::{parse_extraction, ExtractionOutput};
use crate::pipeline::IngestionPipeline;
use crate::report::IngestionReport;
use crate::validator::CandidateValidator;
use chrono::{DateTime, Utc};
use profilegraph_core::{
    EdgeType, EngineConfig, Entity, EntityCandidate, EntityId, GraphError, GraphResult,
    Observation, RelationCandidate, Summary,
};
use profilegraph_query::{
    ContextSubgraph, Direction, EntityQuery, GraphQueryEngine, GraphSnapshot, InterestCluster,
    Neighbor, RelatedEntity,
};
use profilegraph_storage::{keys, DocumentStore, TypedStore};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct KnowledgeGraphService {
    config: Arc<EngineConfig>,
    oracle: Arc<dyn ExtractionOracle>,
    validator: CandidateValidator,
    pipeline: Arc<IngestionPipeline>,
    writers: WriterRegistry,
    cache: Arc<SummaryCache>,
}

impl KnowledgeGraphService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        oracle: Arc<dyn ExtractionOracle>,
        config: EngineConfig,
    ) -> GraphResult<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let typed = TypedStore::new(store.clone(), config.transact_max_attempts);
        let pipeline = Arc::new(IngestionPipeline::new(typed, config.clone()));
        let cache = Arc::new(SummaryCache::default());
        let writers = WriterRegistry::new(
            pipeline.clone(),
            WriterRegistryConfig {
                queue_capacity: DEFAULT_QUEUE_CAPACITY,
                idle_timeout: config.writer_idle_timeout(),
            },
        );

        info!(
            store = store.name(),
            oracle = oracle.name(),
            threshold = config.acceptance_threshold,
            "Knowledge graph service ready"
        );

        Ok(Self {
            validator: CandidateValidator::new(&config),
            config,
            oracle,
            pipeline,
            writers,
            cache,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------------

    /// Extract, validate and apply one transcript window
    pub async fn ingest(
        &self,
        subject_id: &str,
        conversation_id: &str,
        transcript: &TranscriptContext,
    ) -> GraphResult<IngestionReport> {
        self.ingest_with(
            &SubjectContext::new(subject_id),
            conversation_id,
            transcript,
            Utc::now(),
        )
        .await
    }

    /// [`Self::ingest`] with explicit subject context and observation time
    pub async fn ingest_with(
        &self,
        subject: &SubjectContext,
        conversation_id: &str,
        transcript: &TranscriptContext,
        observed_at: DateTime<Utc>,
    ) -> GraphResult<IngestionReport> {
        let start = Instant::now();
        let deadline = self.config.extraction_timeout();

        let raw = tokio::time::timeout(deadline, self.oracle.extract(transcript, subject))
            .await
            .map_err(|_| {
                warn!(
                    subject = %subject.subject_id,
                    conversation = conversation_id,
                    timeout_ms = deadline.as_millis() as u64,
                    "Extraction timed out"
                );
                GraphError::ExtractionTimeout(deadline)
            })??;

        debug!(
            subject = %subject.subject_id,
            conversation = conversation_id,
            oracle = self.oracle.name(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Extraction finished"
        );

        self.ingest_extraction(&subject.subject_id, conversation_id, &raw, observed_at)
            .await
    }

    /// Apply raw oracle output, skipping the oracle call
    pub async fn ingest_extraction(
        &self,
        subject_id: &str,
        conversation_id: &str,
        raw: &str,
        observed_at: DateTime<Utc>,
    ) -> GraphResult<IngestionReport> {
        let output = parse_extraction(raw)?;
        self.apply_output(subject_id, conversation_id, output, observed_at)
            .await
    }

    /// Apply already typed candidates
    pub async fn ingest_candidates(
        &self,
        subject_id: &str,
        conversation_id: &str,
        entities: Vec<EntityCandidate>,
        relations: Vec<RelationCandidate>,
        observed_at: DateTime<Utc>,
    ) -> GraphResult<IngestionReport> {
        let output = ExtractionOutput::from_candidates(entities, relations);
        self.apply_output(subject_id, conversation_id, output, observed_at)
            .await
    }

    async fn apply_output(
        &self,
        subject_id: &str,
        conversation_id: &str,
        output: ExtractionOutput,
        observed_at: DateTime<Utc>,
    ) -> GraphResult<IngestionReport> {
        let validated = self.validator.validate(output);
        let batch = Batch::new(subject_id, conversation_id, observed_at, validated)?;

        self.writers.writer(subject_id).apply(batch).await
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Query engine over the subject's graph as currently stored
    pub async fn engine(&self, subject_id: &str) -> GraphResult<GraphQueryEngine> {
        let snapshot = GraphSnapshot::load(self.pipeline.store(), subject_id).await?;
        Ok(GraphQueryEngine::new(Arc::new(snapshot), &self.config))
    }

    pub async fn get_summary(&self, subject_id: &str) -> GraphResult<Arc<Summary>> {
        self.pipeline
            .summaries()
            .get_cached(subject_id, &self.cache)
            .await
    }

    pub async fn get_entity(&self, subject_id: &str, entity_id: &str) -> GraphResult<Entity> {
        self.pipeline
            .store()
            .get::<Entity>(&keys::entity(subject_id, entity_id))
            .await?
            .ok_or_else(|| GraphError::NotFound(entity_id.to_string()))
    }

    pub async fn get_entities(&self, subject_id: &str, query: &EntityQuery) -> GraphResult<Vec<Entity>> {
        Ok(self.engine(subject_id).await?.entities(query))
    }

    pub async fn get_neighbors(
        &self,
        subject_id: &str,
        entity_id: &str,
        edge_type: Option<EdgeType>,
        direction: Direction,
        limit: Option<usize>,
    ) -> GraphResult<Vec<Neighbor>> {
        Ok(self
            .engine(subject_id)
            .await?
            .neighbors(entity_id, edge_type, direction, limit))
    }

    pub async fn get_related_entities(
        &self,
        subject_id: &str,
        entity_id: &str,
        max_depth: usize,
        edge_types: Option<&[EdgeType]>,
        min_weight: f64,
    ) -> GraphResult<Vec<RelatedEntity>> {
        Ok(self
            .engine(subject_id)
            .await?
            .related_entities(entity_id, max_depth, edge_types, min_weight))
    }

    pub async fn find_interest_clusters(
        &self,
        subject_id: &str,
        min_cluster_size: usize,
        category: Option<&str>,
    ) -> GraphResult<Vec<InterestCluster>> {
        Ok(self
            .engine(subject_id)
            .await?
            .interest_clusters(min_cluster_size, category))
    }

    pub async fn get_prerequisite_chain(
        &self,
        subject_id: &str,
        skill_id: &str,
    ) -> GraphResult<Vec<EntityId>> {
        self.engine(subject_id).await?.prerequisite_chain(skill_id)
    }

    pub async fn find_learning_path(
        &self,
        subject_id: &str,
        start_id: &str,
        target_id: &str,
    ) -> GraphResult<Option<Vec<EntityId>>> {
        self.engine(subject_id)
            .await?
            .learning_path(start_id, target_id)
    }

    pub async fn extract_context_subgraph(
        &self,
        subject_id: &str,
        seeds: &[EntityId],
        max_entities: Option<usize>,
        depth: Option<usize>,
        min_weight: Option<f64>,
    ) -> GraphResult<ContextSubgraph> {
        Ok(self
            .engine(subject_id)
            .await?
            .context_subgraph(seeds, max_entities, depth, min_weight))
    }

    pub async fn get_observation(
        &self,
        subject_id: &str,
        observation_id: &str,
    ) -> GraphResult<Option<Observation>> {
        self.pipeline
            .observations()
            .get(subject_id, observation_id)
            .await
    }

    pub async fn list_observations(&self, subject_id: &str) -> GraphResult<Vec<Observation>> {
        self.pipeline.observations().list(subject_id).await
    }

    pub async fn conversation_observations(
        &self,
        subject_id: &str,
        conversation_id: &str,
    ) -> GraphResult<Vec<Observation>> {
        self.pipeline
            .observations()
            .for_conversation(subject_id, conversation_id)
            .await
    }

    pub fn writer_stats(&self) -> WriterStats {
        self.writers.stats()
    }

    pub fn summary_cache_stats(&self) -> SummaryCacheStats {
        self.cache.stats()
    }

    pub fn shutdown(&self) {
        self.writers.shutdown();
    }
}
