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

//! Profilegraph Core
//!
//! Shared data model for subject knowledge graphs. A *subject* (for example a
//! learner profile) owns a partition of typed entities and weighted edges that
//! are built up incrementally from conversational sessions.
//!
//! # Model
//!
//! ```text
//!   Entity ──(Edge: temporal_cooccurrence, symmetric)── Entity
//!     │
//!     └──(Edge: learning_pathway / emotional_association, directed)──► Entity
//!
//!   Observation: immutable record of one ingestion batch
//!   Summary:     derived per-subject counters and ranked top-N lists
//! ```
//!
//! Entity and edge identifiers are pure functions of their content (see
//! [`ids`]), so the same name and type always resolve to the same node.

pub mod bounded;
pub mod candidate;
pub mod config;
pub mod edge;
pub mod entity;
pub mod error;
pub mod ids;
pub mod observation;
pub mod summary;

pub use bounded::BoundedLog;
pub use candidate::{
    CandidateKind, CandidateRejection, EntityCandidate, RelationCandidate, ValidationError,
};
pub use config::EngineConfig;
pub use edge::{
    Difficulty, Edge, EdgeAttributes, EdgeStatus, EdgeType, EndpointRef, EvidenceSnippet, Valence,
};
pub use entity::{
    AffectMoment, Connection, EdgeStats, Entity, EntityAttributes, EntityType, Milestone,
    RecentObservation,
};
pub use error::{GraphError, GraphResult};
pub use ids::{ConversationId, EdgeId, EntityId, ObservationId, SubjectId};
pub use observation::{EdgeTouch, EntityTouch, Observation, Occurrence};
pub use summary::{rank_order, RankedEntity, Summary};
