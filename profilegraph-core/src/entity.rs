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

//! Entity types
//!
//! An entity is a typed, named node carrying aggregated statistics. Its
//! attribute payload is a tagged union with one variant per entity type.

use crate::bounded::BoundedLog;
use crate::config::EngineConfig;
use crate::edge::EdgeType;
use crate::ids::{ConversationId, EdgeId, EntityId};
use crate::observation::Occurrence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Closed set of entity categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A subject discussed (e.g., "Dinosaurs")
    Topic,
    /// A demonstrated ability or milestone (e.g., "Counting to 20")
    Skill,
    /// An enthusiasm or engagement pattern
    Interest,
    /// Abstract understanding (e.g., "Extinction")
    Concept,
    /// Character attribute or emotional-intelligence marker
    PersonalityTrait,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::Topic,
        EntityType::Skill,
        EntityType::Interest,
        EntityType::Concept,
        EntityType::PersonalityTrait,
    ];

    /// Singular label, also used as the entity id prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Topic => "topic",
            EntityType::Skill => "skill",
            EntityType::Interest => "interest",
            EntityType::Concept => "concept",
            EntityType::PersonalityTrait => "personality_trait",
        }
    }

    /// Parse a label as emitted by the extraction oracle.
    ///
    /// Accepts singular and plural forms and the short `trait` alias.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "topic" | "topics" => Some(EntityType::Topic),
            "skill" | "skills" => Some(EntityType::Skill),
            "interest" | "interests" => Some(EntityType::Interest),
            "concept" | "concepts" => Some(EntityType::Concept),
            "personality_trait" | "personality_traits" | "trait" | "traits" => {
                Some(EntityType::PersonalityTrait)
            }
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific attribute payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityAttributes {
    Topic {
        category: String,
        subcategory: String,
        knowledge_level: String,
        #[serde(default)]
        question_types: Vec<String>,
        #[serde(default)]
        vocabulary_growth: Vec<String>,
    },
    Skill {
        category: String,
        subcategory: String,
        developmental_stage: String,
        mastery_level: String,
        progression_rate: String,
        last_demonstrated: Option<DateTime<Utc>>,
    },
    Interest {
        category: String,
        subcategory: String,
        engagement_level: f64,
        initiation_frequency: f64,
        persistence_level: f64,
        emotional_connection: String,
    },
    Concept {
        category: String,
        subcategory: String,
        abstraction_level: String,
        understanding_level: f64,
        #[serde(default)]
        cognitive_markers: BTreeMap<String, String>,
    },
    Trait {
        category: String,
        subcategory: String,
        intensity: f64,
        consistency: f64,
        development_trend: String,
    },
}

impl EntityAttributes {
    /// Attributes with the taxonomy defaults for a type
    pub fn default_for(entity_type: EntityType) -> Self {
        match entity_type {
            EntityType::Topic => EntityAttributes::Topic {
                category: String::new(),
                subcategory: String::new(),
                knowledge_level: "beginner".to_string(),
                question_types: Vec::new(),
                vocabulary_growth: Vec::new(),
            },
            EntityType::Skill => EntityAttributes::Skill {
                category: String::new(),
                subcategory: String::new(),
                developmental_stage: String::new(),
                mastery_level: "emerging".to_string(),
                progression_rate: "steady".to_string(),
                last_demonstrated: None,
            },
            EntityType::Interest => EntityAttributes::Interest {
                category: String::new(),
                subcategory: String::new(),
                engagement_level: 0.5,
                initiation_frequency: 0.5,
                persistence_level: 0.5,
                emotional_connection: "positive".to_string(),
            },
            EntityType::Concept => EntityAttributes::Concept {
                category: String::new(),
                subcategory: String::new(),
                abstraction_level: "concrete".to_string(),
                understanding_level: 0.5,
                cognitive_markers: BTreeMap::new(),
            },
            EntityType::PersonalityTrait => EntityAttributes::Trait {
                category: String::new(),
                subcategory: String::new(),
                intensity: 0.5,
                consistency: 0.5,
                development_trend: "stable".to_string(),
            },
        }
    }

    pub fn entity_type(&self) -> EntityType {
        match self {
            EntityAttributes::Topic { .. } => EntityType::Topic,
            EntityAttributes::Skill { .. } => EntityType::Skill,
            EntityAttributes::Interest { .. } => EntityType::Interest,
            EntityAttributes::Concept { .. } => EntityType::Concept,
            EntityAttributes::Trait { .. } => EntityType::PersonalityTrait,
        }
    }

    pub fn category(&self) -> &str {
        match self {
            EntityAttributes::Topic { category, .. }
            | EntityAttributes::Skill { category, .. }
            | EntityAttributes::Interest { category, .. }
            | EntityAttributes::Concept { category, .. }
            | EntityAttributes::Trait { category, .. } => category,
        }
    }

    pub fn subcategory(&self) -> &str {
        match self {
            EntityAttributes::Topic { subcategory, .. }
            | EntityAttributes::Skill { subcategory, .. }
            | EntityAttributes::Interest { subcategory, .. }
            | EntityAttributes::Concept { subcategory, .. }
            | EntityAttributes::Trait { subcategory, .. } => subcategory,
        }
    }

    fn taxonomy_mut(&mut self) -> (&mut String, &mut String) {
        match self {
            EntityAttributes::Topic {
                category,
                subcategory,
                ..
            }
            | EntityAttributes::Skill {
                category,
                subcategory,
                ..
            }
            | EntityAttributes::Interest {
                category,
                subcategory,
                ..
            }
            | EntityAttributes::Concept {
                category,
                subcategory,
                ..
            }
            | EntityAttributes::Trait {
                category,
                subcategory,
                ..
            } => (category, subcategory),
        }
    }

    /// Fold a newer observation's attributes into this payload.
    ///
    /// Category and subcategory stay pinned to the first non-empty value so
    /// cluster labels do not drift; every other field takes the newer value.
    /// Payloads of a different variant are ignored.
    pub fn merge_from(&mut self, newer: &EntityAttributes) {
        if self.entity_type() != newer.entity_type() {
            return;
        }

        let (category, subcategory) = (self.category().to_string(), self.subcategory().to_string());
        *self = newer.clone();

        let (new_category, new_subcategory) = self.taxonomy_mut();
        if !category.is_empty() {
            *new_category = category;
        }
        if !subcategory.is_empty() {
            *new_subcategory = subcategory;
        }
    }
}

/// One entry of an entity's recent-observation ring buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentObservation {
    pub conversation_id: ConversationId,
    pub observed_at: DateTime<Utc>,
    pub snippet: String,
}

/// Developmental milestone demonstrated by a skill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub milestone: String,
    pub conversation_id: ConversationId,
    pub achieved_at: DateTime<Utc>,
    pub evidence: String,
}

/// Notable emotional moment tied to an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectMoment {
    pub emotion: String,
    pub intensity: Option<f64>,
    pub conversation_id: ConversationId,
    pub observed_at: DateTime<Utc>,
}

/// A strong connection cached on an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub entity_id: EntityId,
    pub edge_id: EdgeId,
    pub edge_type: EdgeType,
    pub weight: f64,
}

/// Cached edge counters for an entity
///
/// Counters are updated incrementally when an edge is created; the
/// `top_connections` list is refreshed by the summary maintainer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeStats {
    pub total: u64,
    pub incoming: u64,
    pub outgoing: u64,
    #[serde(default)]
    pub by_type: BTreeMap<EdgeType, u64>,
    #[serde(default)]
    pub top_connections: Vec<Connection>,
}

/// A knowledge graph entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Deterministic id, see [`crate::ids::entity_id`]
    pub id: EntityId,
    pub entity_type: EntityType,
    /// Display name as first observed
    pub name: String,
    pub first_observed_at: DateTime<Utc>,
    pub last_observed_at: DateTime<Utc>,
    pub first_conversation_id: ConversationId,
    pub last_conversation_id: ConversationId,
    /// Every validated observation
    pub mention_count: u64,
    /// Distinct conversations only
    pub conversation_count: u64,
    /// Every conversation that has mentioned this entity
    pub conversation_ids: BTreeSet<ConversationId>,
    /// Running maximum of observed confidence
    pub strength: f64,
    pub attributes: EntityAttributes,
    pub recent_observations: BoundedLog<RecentObservation>,
    #[serde(default)]
    pub edge_stats: EdgeStats,
    pub milestones: BoundedLog<Milestone>,
    pub affect_moments: BoundedLog<AffectMoment>,
    /// Mutation marks already applied, used to make batch retries exact
    pub applied_marks: BoundedLog<String>,
    /// Mark of the mutation that created this entity
    #[serde(default)]
    pub created_by: String,
    pub last_graph_update_at: Option<DateTime<Utc>>,
}

impl Entity {
    /// First observation of an entity: every counter starts at 1.
    pub fn new(
        id: EntityId,
        name: impl Into<String>,
        attributes: EntityAttributes,
        confidence: f64,
        occurrence: &Occurrence,
        config: &EngineConfig,
    ) -> Self {
        Self {
            id,
            entity_type: attributes.entity_type(),
            name: name.into(),
            first_observed_at: occurrence.observed_at,
            last_observed_at: occurrence.observed_at,
            first_conversation_id: occurrence.conversation_id.clone(),
            last_conversation_id: occurrence.conversation_id.clone(),
            mention_count: 1,
            conversation_count: 1,
            conversation_ids: BTreeSet::from([occurrence.conversation_id.clone()]),
            strength: confidence,
            attributes,
            recent_observations: BoundedLog::with_item(
                config.recent_observations_capacity,
                RecentObservation {
                    conversation_id: occurrence.conversation_id.clone(),
                    observed_at: occurrence.observed_at,
                    snippet: occurrence.evidence.clone(),
                },
            ),
            edge_stats: EdgeStats::default(),
            milestones: BoundedLog::new(config.domain_log_capacity),
            affect_moments: BoundedLog::new(config.domain_log_capacity),
            applied_marks: BoundedLog::new(config.idempotency_window),
            created_by: String::new(),
            last_graph_update_at: None,
        }
    }

    pub fn category(&self) -> &str {
        self.attributes.category()
    }

    /// Record a mention from `conversation_id`.
    ///
    /// Returns `true` the first time the conversation is seen, however many
    /// other conversations came in between.
    pub fn record_conversation(&mut self, conversation_id: &str) -> bool {
        self.conversation_ids.insert(conversation_id.to_string())
    }

    /// Whether this entity has absorbed the given mutation mark
    pub fn has_applied(&self, mark: &str) -> bool {
        self.applied_marks.iter().any(|m| m == mark)
    }
}
