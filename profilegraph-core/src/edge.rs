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

//! Edge types
//!
//! Edges are typed, weighted relationships between two entities of the same
//! subject. Symmetric types collapse `A↔B` and `B↔A` onto one edge.

use crate::bounded::BoundedLog;
use crate::config::EngineConfig;
use crate::entity::{Entity, EntityType};
use crate::ids::{ConversationId, EdgeId, EntityId};
use crate::observation::Occurrence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Relationship types between entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// Entities discussed together (undirected)
    TemporalCooccurrence,
    /// Source enables or leads to target (directed)
    LearningPathway,
    /// Emotion connected to a topic or interest (directed)
    EmotionalAssociation,
}

impl EdgeType {
    pub const ALL: [EdgeType; 3] = [
        EdgeType::TemporalCooccurrence,
        EdgeType::LearningPathway,
        EdgeType::EmotionalAssociation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::TemporalCooccurrence => "temporal_cooccurrence",
            EdgeType::LearningPathway => "learning_pathway",
            EdgeType::EmotionalAssociation => "emotional_association",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "temporal_cooccurrence" | "temporal_co_occurrence" | "cooccurrence"
            | "co_occurrence" => Some(EdgeType::TemporalCooccurrence),
            "learning_pathway" | "pathway" | "learning_path" => Some(EdgeType::LearningPathway),
            "emotional_association" | "emotion" | "emotional" => {
                Some(EdgeType::EmotionalAssociation)
            }
            _ => None,
        }
    }

    /// Symmetric types normalize endpoint order before deriving the edge id
    pub fn is_symmetric(&self) -> bool {
        matches!(self, EdgeType::TemporalCooccurrence)
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Valence {
    Positive,
    Negative,
    Neutral,
}

/// Type-specific edge payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EdgeAttributes {
    Cooccurrence {
        frequency: Option<f64>,
        time_proximity: Option<f64>,
    },
    LearningPathway {
        /// Source must be mastered before target
        prerequisite: bool,
        difficulty: Option<Difficulty>,
        mastery_required: Option<f64>,
    },
    EmotionalAssociation {
        emotion: Option<String>,
        intensity: Option<f64>,
        valence: Option<Valence>,
    },
}

impl EdgeAttributes {
    pub fn default_for(edge_type: EdgeType) -> Self {
        match edge_type {
            EdgeType::TemporalCooccurrence => EdgeAttributes::Cooccurrence {
                frequency: None,
                time_proximity: None,
            },
            EdgeType::LearningPathway => EdgeAttributes::LearningPathway {
                prerequisite: false,
                difficulty: None,
                mastery_required: None,
            },
            EdgeType::EmotionalAssociation => EdgeAttributes::EmotionalAssociation {
                emotion: None,
                intensity: None,
                valence: None,
            },
        }
    }

    pub fn edge_type(&self) -> EdgeType {
        match self {
            EdgeAttributes::Cooccurrence { .. } => EdgeType::TemporalCooccurrence,
            EdgeAttributes::LearningPathway { .. } => EdgeType::LearningPathway,
            EdgeAttributes::EmotionalAssociation { .. } => EdgeType::EmotionalAssociation,
        }
    }

    pub fn is_prerequisite(&self) -> bool {
        matches!(
            self,
            EdgeAttributes::LearningPathway {
                prerequisite: true,
                ..
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStatus {
    #[default]
    Active,
    /// Excluded from traversal, retained for audit
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSnippet {
    pub conversation_id: ConversationId,
    pub observed_at: DateTime<Utc>,
    pub snippet: String,
}

/// Identity of one edge endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRef {
    pub id: EntityId,
    pub entity_type: EntityType,
    pub name: String,
}

impl From<&Entity> for EndpointRef {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id.clone(),
            entity_type: entity.entity_type,
            name: entity.name.clone(),
        }
    }
}

/// A weighted relationship between two entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Deterministic id, see [`crate::ids::edge_id`]
    pub id: EdgeId,
    pub edge_type: EdgeType,
    pub source_id: EntityId,
    pub source_type: EntityType,
    pub source_name: String,
    pub target_id: EntityId,
    pub target_type: EntityType,
    pub target_name: String,
    /// Moving average of observed confidences, always within [0, 1]
    pub weight: f64,
    pub observation_count: u64,
    pub first_observed_at: DateTime<Utc>,
    pub last_observed_at: DateTime<Utc>,
    pub conversation_ids: BoundedLog<ConversationId>,
    pub evidence_snippets: BoundedLog<EvidenceSnippet>,
    pub attributes: EdgeAttributes,
    #[serde(default)]
    pub status: EdgeStatus,
    /// Mark of the mutation that created this edge
    pub created_by: String,
    pub applied_marks: BoundedLog<String>,
}

impl Edge {
    /// First observation of an edge: `weight = confidence`, one observation.
    ///
    /// `created_by` is left empty for the caller to stamp.
    pub fn new(
        id: EdgeId,
        source: EndpointRef,
        target: EndpointRef,
        attributes: EdgeAttributes,
        confidence: f64,
        occurrence: &Occurrence,
        config: &EngineConfig,
    ) -> Self {
        Self {
            id,
            edge_type: attributes.edge_type(),
            source_id: source.id,
            source_type: source.entity_type,
            source_name: source.name,
            target_id: target.id,
            target_type: target.entity_type,
            target_name: target.name,
            weight: confidence.clamp(0.0, 1.0),
            observation_count: 1,
            first_observed_at: occurrence.observed_at,
            last_observed_at: occurrence.observed_at,
            conversation_ids: BoundedLog::with_item(
                config.conversation_history_capacity,
                occurrence.conversation_id.clone(),
            ),
            evidence_snippets: BoundedLog::with_item(
                config.evidence_capacity,
                EvidenceSnippet {
                    conversation_id: occurrence.conversation_id.clone(),
                    observed_at: occurrence.observed_at,
                    snippet: occurrence.evidence.clone(),
                },
            ),
            attributes,
            status: EdgeStatus::Active,
            created_by: String::new(),
            applied_marks: BoundedLog::new(config.idempotency_window),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == EdgeStatus::Active
    }

    /// Active learning-pathway edge flagged as a prerequisite
    pub fn is_prerequisite(&self) -> bool {
        self.is_active()
            && self.edge_type == EdgeType::LearningPathway
            && self.attributes.is_prerequisite()
    }

    pub fn touches(&self, entity_id: &str) -> bool {
        self.source_id == entity_id || self.target_id == entity_id
    }

    /// The endpoint opposite to `entity_id`, if the edge touches it
    pub fn other_endpoint(&self, entity_id: &str) -> Option<&str> {
        if self.source_id == entity_id {
            Some(&self.target_id)
        } else if self.target_id == entity_id {
            Some(&self.source_id)
        } else {
            None
        }
    }

    pub fn has_applied(&self, mark: &str) -> bool {
        self.applied_marks.iter().any(|m| m == mark)
    }
}
