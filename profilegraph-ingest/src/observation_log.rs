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

//! Append-only observation log

use profilegraph_core::{GraphResult, Observation};
use profilegraph_storage::{keys, TypedStore};
use tracing::debug;

pub struct ObservationLog {
    store: TypedStore,
}

impl ObservationLog {
    pub fn new(store: TypedStore) -> Self {
        Self { store }
    }

    /// Append a record. Returns `false` if the id was already recorded; the
    /// existing record is left untouched.
    pub async fn record(&self, observation: &Observation) -> GraphResult<bool> {
        let key = keys::observation(&observation.subject_id, &observation.id);
        let written = self.store.create(&key, observation).await?;
        debug!(
            subject = %observation.subject_id,
            observation = %observation.id,
            written,
            "Recorded observation"
        );
        Ok(written)
    }

    pub async fn get(&self, subject_id: &str, observation_id: &str) -> GraphResult<Option<Observation>> {
        self.store
            .get(&keys::observation(subject_id, observation_id))
            .await
    }

    /// Every observation of a subject, oldest first
    pub async fn list(&self, subject_id: &str) -> GraphResult<Vec<Observation>> {
        let mut observations: Vec<Observation> =
            self.store.scan(&keys::observations_prefix(subject_id)).await?;
        observations.sort_by(|a, b| {
            a.observed_at
                .cmp(&b.observed_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(observations)
    }

    /// Observations of one conversation, oldest first
    pub async fn for_conversation(
        &self,
        subject_id: &str,
        conversation_id: &str,
    ) -> GraphResult<Vec<Observation>> {
        let mut observations = self
            .store
            .query(&keys::observations_prefix(subject_id), |o: &Observation| {
                o.conversation_id == conversation_id
            })
            .await?;
        observations.sort_by(|a, b| a.observed_at.cmp(&b.observed_at).then_with(|| a.id.cmp(&b.id)));
        Ok(observations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use profilegraph_storage::InMemoryStore;
    use std::sync::Arc;

    fn observation(id: &str, conversation: &str, minutes_ago: i64) -> Observation {
        Observation {
            id: id.to_string(),
            subject_id: "child".into(),
            conversation_id: conversation.into(),
            batch_key: id.to_string(),
            observed_at: Utc::now() - Duration::minutes(minutes_ago),
            entity_touches: Vec::new(),
            edge_touches: Vec::new(),
            rejected_count: 0,
            extraction_version: "v1.0".into(),
        }
    }

    #[tokio::test]
    async fn test_record_is_create_only() {
        let log = ObservationLog::new(TypedStore::new(Arc::new(InMemoryStore::new()), 3));
        let first = observation("obs_1", "conv-1", 0);
        assert!(log.record(&first).await.unwrap());

        let mut changed = first.clone();
        changed.rejected_count = 7;
        assert!(!log.record(&changed).await.unwrap());

        let stored = log.get("child", "obs_1").await.unwrap().unwrap();
        assert_eq!(stored.rejected_count, 0);
    }

    #[tokio::test]
    async fn test_list_oldest_first() {
        let log = ObservationLog::new(TypedStore::new(Arc::new(InMemoryStore::new()), 3));
        log.record(&observation("obs_b", "conv-2", 1)).await.unwrap();
        log.record(&observation("obs_a", "conv-1", 10)).await.unwrap();
        log.record(&observation("obs_c", "conv-1", 0)).await.unwrap();

        let ids: Vec<String> = log.list("child").await.unwrap().into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["obs_a", "obs_b", "obs_c"]);

        let conv1 = log.for_conversation("child", "conv-1").await.unwrap();
        assert_eq!(conv1.len(), 2);
        assert!(log.get("child", "obs_missing").await.unwrap().is_none());
    }
}
