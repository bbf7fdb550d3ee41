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

//! Extraction candidates
//!
//! Candidates are the typed form of extraction oracle output. They carry no
//! identity yet; the resolver derives ids from `(name, type)` later.

use crate::edge::{EdgeAttributes, EdgeType};
use crate::entity::{EntityAttributes, EntityType};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A candidate entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityCandidate {
    pub name: String,
    pub entity_type: EntityType,
    pub confidence: f64,
    #[serde(default)]
    pub evidence: String,
    pub attributes: EntityAttributes,
    /// Skill milestone demonstrated in this conversation
    #[serde(default)]
    pub milestone: Option<String>,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub emotion_intensity: Option<f64>,
}

impl EntityCandidate {
    /// Candidate with default attributes for its type
    pub fn new(name: impl Into<String>, entity_type: EntityType, confidence: f64) -> Self {
        Self {
            name: name.into(),
            entity_type,
            confidence,
            evidence: String::new(),
            attributes: EntityAttributes::default_for(entity_type),
            milestone: None,
            emotion: None,
            emotion_intensity: None,
        }
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = evidence.into();
        self
    }
}

/// A candidate relationship between two named entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationCandidate {
    pub source_name: String,
    pub source_type: EntityType,
    pub target_name: String,
    pub target_type: EntityType,
    pub edge_type: EdgeType,
    pub confidence: f64,
    #[serde(default)]
    pub evidence: String,
    pub attributes: EdgeAttributes,
}

impl RelationCandidate {
    pub fn new(
        source: (&str, EntityType),
        target: (&str, EntityType),
        edge_type: EdgeType,
        confidence: f64,
    ) -> Self {
        Self {
            source_name: source.0.to_string(),
            source_type: source.1,
            target_name: target.0.to_string(),
            target_type: target.1,
            edge_type,
            confidence,
            evidence: String::new(),
            attributes: EdgeAttributes::default_for(edge_type),
        }
    }

    /// Mark a learning-pathway candidate as a prerequisite relation
    pub fn prerequisite(mut self) -> Self {
        if let EdgeAttributes::LearningPathway { prerequisite, .. } = &mut self.attributes {
            *prerequisite = true;
        }
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = evidence.into();
        self
    }
}

/// Why a single candidate was dropped
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("missing required field `{field}`")]
    MissingField { field: String },

    #[error("unknown entity type `{value}`")]
    UnknownEntityType { value: String },

    #[error("unknown edge type `{value}`")]
    UnknownEdgeType { value: String },

    #[error("confidence {confidence} outside [0, 1]")]
    ConfidenceOutOfRange { confidence: f64 },

    #[error("confidence {confidence} below threshold {threshold}")]
    BelowThreshold { confidence: f64, threshold: f64 },

    #[error("name is empty after normalization")]
    EmptyName,

    #[error("endpoint `{name}` was not resolved in this batch or the store")]
    UnresolvedEndpoint { name: String },

    #[error("relation points at itself")]
    SelfLoop,

    #[error("malformed candidate: {detail}")]
    Malformed { detail: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    Entity,
    Relation,
}

impl fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateKind::Entity => f.write_str("entity"),
            CandidateKind::Relation => f.write_str("relation"),
        }
    }
}

/// A dropped candidate, reported back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRejection {
    pub kind: CandidateKind,
    /// Position in the oracle output for its kind
    pub index: usize,
    /// Best-effort label (name or `source -> target`)
    pub label: Option<String>,
    pub error: ValidationError,
}

impl CandidateRejection {
    pub fn entity(index: usize, label: Option<String>, error: ValidationError) -> Self {
        Self {
            kind: CandidateKind::Entity,
            index,
            label,
            error,
        }
    }

    pub fn relation(index: usize, label: Option<String>, error: ValidationError) -> Self {
        Self {
            kind: CandidateKind::Relation,
            index,
            label,
            error,
        }
    }
}

impl fmt::Display for CandidateRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{} #{} ({}): {}", self.kind, self.index, label, self.error),
            None => write!(f, "{} #{}: {}", self.kind, self.index, self.error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prerequisite_builder() {
        let rel = RelationCandidate::new(
            ("Counting", EntityType::Skill),
            ("Addition", EntityType::Skill),
            EdgeType::LearningPathway,
            0.9,
        )
        .prerequisite();
        assert!(rel.attributes.is_prerequisite());

        let cooc = RelationCandidate::new(
            ("A", EntityType::Topic),
            ("B", EntityType::Topic),
            EdgeType::TemporalCooccurrence,
            0.9,
        )
        .prerequisite();
        assert!(!cooc.attributes.is_prerequisite());
    }

    #[test]
    fn test_rejection_display() {
        let rejection = CandidateRejection::entity(
            2,
            Some("Volcanoes".into()),
            ValidationError::BelowThreshold {
                confidence: 0.4,
                threshold: 0.7,
            },
        );
        assert_eq!(
            rejection.to_string(),
            "entity #2 (Volcanoes): confidence 0.4 below threshold 0.7"
        );
    }
}
