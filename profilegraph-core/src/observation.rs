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

//! Observation records
//!
//! An observation is the immutable audit record of one ingestion batch. It is
//! written once, after entity and edge aggregation, and never updated.

use crate::edge::EdgeType;
use crate::entity::EntityType;
use crate::ids::{ConversationId, EdgeId, EntityId, ObservationId, SubjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where and when a candidate was seen, with its (truncated) evidence text.
///
/// Timestamps are assigned by the caller, never by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    pub conversation_id: ConversationId,
    pub observed_at: DateTime<Utc>,
    pub evidence: String,
}

impl Occurrence {
    pub fn new(
        conversation_id: impl Into<ConversationId>,
        observed_at: DateTime<Utc>,
        evidence: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            observed_at,
            evidence: evidence.into(),
        }
    }
}

/// An entity touched by a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTouch {
    pub entity_id: EntityId,
    pub entity_type: EntityType,
    pub name: String,
    pub confidence: f64,
    pub evidence: String,
    /// Whether this batch created the entity
    pub created: bool,
}

/// An edge touched by a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeTouch {
    pub edge_id: EdgeId,
    pub edge_type: EdgeType,
    pub source_id: EntityId,
    pub target_id: EntityId,
    pub confidence: f64,
    pub evidence: String,
    pub created: bool,
}

/// Immutable record of one ingestion batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: ObservationId,
    pub subject_id: SubjectId,
    pub conversation_id: ConversationId,
    /// Deterministic digest of the validated candidate set
    pub batch_key: String,
    pub observed_at: DateTime<Utc>,
    pub entity_touches: Vec<EntityTouch>,
    pub edge_touches: Vec<EdgeTouch>,
    /// Candidates dropped by validation
    pub rejected_count: usize,
    pub extraction_version: String,
}

impl Observation {
    /// Observation id for a conversation and batch key
    pub fn id_for(conversation_id: &str, batch_key: &str) -> ObservationId {
        let prefix = &batch_key[..batch_key.len().min(16)];
        format!("obs_{}_{}", conversation_id, prefix)
    }

    pub fn entity_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entity_touches.iter().map(|t| t.entity_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn edge_ids(&self) -> Vec<EdgeId> {
        let mut ids: Vec<EdgeId> = self.edge_touches.iter().map(|t| t.edge_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_for_uses_key_prefix() {
        let id = Observation::id_for("conv-1", "0123456789abcdef0123456789abcdef");
        assert_eq!(id, "obs_conv-1_0123456789abcdef");
        assert_eq!(Observation::id_for("c", "ab"), "obs_c_ab");
    }

    #[test]
    fn test_touch_ids_are_distinct() {
        let touch = |id: &str| EntityTouch {
            entity_id: id.to_string(),
            entity_type: EntityType::Topic,
            name: id.to_string(),
            confidence: 0.9,
            evidence: String::new(),
            created: false,
        };
        let obs = Observation {
            id: "obs".into(),
            subject_id: "child".into(),
            conversation_id: "conv".into(),
            batch_key: "key".into(),
            observed_at: Utc::now(),
            entity_touches: vec![touch("topic_b"), touch("topic_a"), touch("topic_b")],
            edge_touches: Vec::new(),
            rejected_count: 0,
            extraction_version: "v1.0".into(),
        };
        assert_eq!(obs.entity_ids(), vec!["topic_a".to_string(), "topic_b".to_string()]);
    }
}
