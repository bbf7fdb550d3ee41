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

//! Per-subject writer actors
//!
//! Every subject gets one lazily spawned writer task that drains its batches
//! in arrival order, so the joint entity merges of one subject never
//! interleave in this process.
//!
//! ```text
//! ingest() ─┬─► mpsc ─► SubjectWriter(child-1) ─► IngestionPipeline ─► store
//!           └─► mpsc ─► SubjectWriter(child-2) ...
//! ```
//!
//! A writer loads the subject's graph from the store before every batch, so
//! it builds on whatever other processes sharing the store have written.
//! Handles live in a moka cache with a time-to-idle. Once a handle is
//! evicted and its last clone dropped, the queue closes and the task exits.

use crate::batch::Batch;
use crate::pipeline::{Applied, IngestionPipeline};
use crate::report::IngestionReport;
use moka::sync::Cache;
use profilegraph_core::{GraphError, GraphResult, SubjectId};
use profilegraph_query::GraphSnapshot;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Default bound of each writer's queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct WriterRegistryConfig {
    /// Bound of each writer's queue
    pub queue_capacity: usize,
    /// Writers without batches for this long are released
    pub idle_timeout: Duration,
}

impl Default for WriterRegistryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            idle_timeout: Duration::from_secs(300),
        }
    }
}

struct ApplyMessage {
    batch: Batch,
    response: oneshot::Sender<GraphResult<IngestionReport>>,
}

#[derive(Debug, Clone, Default)]
pub struct WriterStats {
    pub active_writers: u64,
    pub batches_applied: u64,
    pub batches_replayed: u64,
    pub batches_failed: u64,
    pub avg_batch_latency_ms: f64,
}

struct WriterStatsInternal {
    applied: AtomicU64,
    replayed: AtomicU64,
    failed: AtomicU64,
    total_latency_ns: AtomicU64,
}

impl WriterStatsInternal {
    fn new() -> Self {
        Self {
            applied: AtomicU64::new(0),
            replayed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            total_latency_ns: AtomicU64::new(0),
        }
    }

    fn snapshot(&self, active_writers: u64) -> WriterStats {
        let applied = self.applied.load(Ordering::Relaxed);
        let replayed = self.replayed.load(Ordering::Relaxed);
        let batches = applied + replayed;
        let total_latency = self.total_latency_ns.load(Ordering::Relaxed);

        WriterStats {
            active_writers,
            batches_applied: applied,
            batches_replayed: replayed,
            batches_failed: self.failed.load(Ordering::Relaxed),
            avg_batch_latency_ms: if batches > 0 {
                (total_latency as f64 / batches as f64) / 1_000_000.0
            } else {
                0.0
            },
        }
    }
}

/// Handle to one subject's writer
#[derive(Clone)]
pub struct SubjectWriterHandle {
    subject_id: SubjectId,
    sender: mpsc::Sender<ApplyMessage>,
}

impl SubjectWriterHandle {
    /// Queue a batch and wait for it to be applied
    pub async fn apply(&self, batch: Batch) -> GraphResult<IngestionReport> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(ApplyMessage {
                batch,
                response: tx,
            })
            .await
            .map_err(|_| GraphError::WriterClosed(self.subject_id.clone()))?;

        rx.await
            .map_err(|_| GraphError::WriterClosed(self.subject_id.clone()))?
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

struct SubjectWriter {
    subject_id: SubjectId,
    pipeline: Arc<IngestionPipeline>,
    stats: Arc<WriterStatsInternal>,
}

impl SubjectWriter {
    async fn run(self, mut receiver: mpsc::Receiver<ApplyMessage>) {
        debug!(subject = %self.subject_id, "Subject writer started");

        while let Some(message) = receiver.recv().await {
            let result = self.apply(message.batch).await;
            // The caller may have gone away; the batch is applied regardless
            let _ = message.response.send(result);
        }

        debug!(subject = %self.subject_id, "Subject writer stopped");
    }

    async fn load_and_apply(&self, batch: &Batch) -> GraphResult<Applied> {
        let snapshot = GraphSnapshot::load(self.pipeline.store(), &self.subject_id).await?;
        self.pipeline.apply(batch, &snapshot).await
    }

    async fn apply(&self, batch: Batch) -> GraphResult<IngestionReport> {
        let start = Instant::now();

        match self.load_and_apply(&batch).await {
            Ok(applied) => {
                let counter = if applied.report.replayed {
                    &self.stats.replayed
                } else {
                    &self.stats.applied
                };
                counter.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .total_latency_ns
                    .fetch_add(start.elapsed().as_nanos() as u64, Ordering::Relaxed);

                Ok(applied.report)
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    subject = %self.subject_id,
                    conversation = %batch.conversation_id,
                    error = %e,
                    transient = e.is_transient(),
                    "Batch failed"
                );
                Err(e)
            }
        }
    }
}

/// Lazily spawned writers, one per subject
pub struct WriterRegistry {
    writers: Cache<SubjectId, SubjectWriterHandle>,
    pipeline: Arc<IngestionPipeline>,
    stats: Arc<WriterStatsInternal>,
    queue_capacity: usize,
}

impl WriterRegistry {
    pub fn new(pipeline: Arc<IngestionPipeline>, config: WriterRegistryConfig) -> Self {
        let writers = Cache::builder()
            .time_to_idle(config.idle_timeout)
            .eviction_listener(|subject: Arc<SubjectId>, _, cause| {
                debug!(subject = %subject, ?cause, "Released subject writer");
            })
            .build();

        Self {
            writers,
            pipeline,
            stats: Arc::new(WriterStatsInternal::new()),
            queue_capacity: config.queue_capacity.max(1),
        }
    }

    /// Writer for a subject, spawning it on first use
    pub fn writer(&self, subject_id: &str) -> SubjectWriterHandle {
        let handle = self
            .writers
            .get_with(subject_id.to_string(), || self.spawn(subject_id));
        if !handle.is_closed() {
            return handle;
        }

        // The task is gone; replace it
        self.writers.invalidate(subject_id);
        self.writers
            .get_with(subject_id.to_string(), || self.spawn(subject_id))
    }

    fn spawn(&self, subject_id: &str) -> SubjectWriterHandle {
        let (sender, receiver) = mpsc::channel(self.queue_capacity);

        let writer = SubjectWriter {
            subject_id: subject_id.to_string(),
            pipeline: self.pipeline.clone(),
            stats: self.stats.clone(),
        };
        tokio::spawn(writer.run(receiver));

        info!(subject = subject_id, "Spawned subject writer");

        SubjectWriterHandle {
            subject_id: subject_id.to_string(),
            sender,
        }
    }

    pub fn stats(&self) -> WriterStats {
        self.writers.run_pending_tasks();
        self.stats.snapshot(self.writers.entry_count())
    }

    /// Drop every writer; queued batches finish before the tasks exit
    pub fn shutdown(&self) {
        self.writers.invalidate_all();
        self.writers.run_pending_tasks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ExtractionOutput;
    use crate::validator::CandidateValidator;
    use chrono::Utc;
    use profilegraph_core::{EngineConfig, EntityCandidate, EntityType};
    use profilegraph_storage::{DocumentStore, InMemoryStore, TypedStore};

    fn pipeline(store: Arc<dyn DocumentStore>) -> Arc<IngestionPipeline> {
        let config = Arc::new(EngineConfig::default());
        Arc::new(IngestionPipeline::new(TypedStore::new(store, 3), config))
    }

    fn registry_on(store: Arc<dyn DocumentStore>, idle_timeout: Duration) -> WriterRegistry {
        WriterRegistry::new(
            pipeline(store),
            WriterRegistryConfig {
                queue_capacity: 16,
                idle_timeout,
            },
        )
    }

    fn registry() -> WriterRegistry {
        registry_on(Arc::new(InMemoryStore::new()), Duration::from_secs(60))
    }

    fn batch(subject: &str, conversation: &str, name: &str) -> Batch {
        let validated = CandidateValidator::new(&EngineConfig::default()).validate(
            ExtractionOutput::from_candidates(
                vec![EntityCandidate::new(name, EntityType::Topic, 0.9)],
                Vec::new(),
            ),
        );
        Batch::new(subject, conversation, Utc::now(), validated).unwrap()
    }

    #[tokio::test]
    async fn test_writer_applies_batches() {
        let registry = registry();
        let writer = registry.writer("child");

        let report = writer.apply(batch("child", "conv-1", "Dinosaurs")).await.unwrap();
        assert!(!report.replayed);
        assert_eq!(report.entities_touched, vec!["topic_dinosaurs".to_string()]);

        let again = writer.apply(batch("child", "conv-1", "Dinosaurs")).await.unwrap();
        assert!(again.replayed);

        let stats = registry.stats();
        assert_eq!(stats.batches_applied, 1);
        assert_eq!(stats.batches_replayed, 1);
    }

    #[tokio::test]
    async fn test_one_writer_per_subject() {
        let registry = registry();
        let a = registry.writer("child");
        a.apply(batch("child", "conv-1", "Dinosaurs")).await.unwrap();

        let b = registry.writer("child");
        assert!(b.sender.same_channel(&a.sender));
        registry.writer("other");

        let stats = registry.stats();
        assert_eq!(stats.active_writers, 2);
        assert_eq!(stats.batches_applied, 1);
    }

    #[tokio::test]
    async fn test_idle_writer_is_released() {
        let registry = registry_on(Arc::new(InMemoryStore::new()), Duration::from_millis(100));
        registry
            .writer("child")
            .apply(batch("child", "conv-1", "Dinosaurs"))
            .await
            .unwrap();
        assert_eq!(registry.stats().active_writers, 1);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(registry.stats().active_writers, 0);

        let report = registry
            .writer("child")
            .apply(batch("child", "conv-2", "Volcanoes"))
            .await
            .unwrap();
        assert!(!report.replayed);
        assert_eq!(registry.stats().active_writers, 1);
    }

    #[tokio::test]
    async fn test_writers_build_on_a_shared_store() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryStore::new());
        let first = registry_on(store.clone(), Duration::from_secs(60));
        let second = registry_on(store.clone(), Duration::from_secs(60));

        second
            .writer("child")
            .apply(batch("child", "conv-1", "Dinosaurs"))
            .await
            .unwrap();
        first
            .writer("child")
            .apply(batch("child", "conv-2", "Dinosaurs"))
            .await
            .unwrap();

        let typed = TypedStore::new(store, 3);
        let summary = first.pipeline.summaries().get("child").await.unwrap();
        assert_eq!(summary.total_entities, 1);
        let snapshot = GraphSnapshot::load(&typed, "child").await.unwrap();
        let dinosaurs = snapshot.entity("topic_dinosaurs").unwrap();
        assert_eq!(dinosaurs.mention_count, 2);
        assert_eq!(dinosaurs.conversation_count, 2);
    }
}
