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

//! Candidate validator
//!
//! The confidence gate. Every candidate is judged on its own; a dropped
//! candidate never blocks the rest of the batch.

use crate::parser::ExtractionOutput;
use profilegraph_core::{
    ids, CandidateRejection, EngineConfig, EntityCandidate, EntityId, RelationCandidate,
    ValidationError,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// An accepted entity candidate with its derived id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedEntity {
    /// Position in the oracle output
    pub index: usize,
    pub id: EntityId,
    pub candidate: EntityCandidate,
}

/// An accepted relation candidate with derived endpoint ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedRelation {
    pub index: usize,
    pub source_id: EntityId,
    pub target_id: EntityId,
    pub candidate: RelationCandidate,
}

#[derive(Debug, Clone, Default)]
pub struct ValidatedCandidates {
    pub entities: Vec<ValidatedEntity>,
    pub relations: Vec<ValidatedRelation>,
    pub rejected: Vec<CandidateRejection>,
}

#[derive(Debug, Clone)]
pub struct CandidateValidator {
    threshold: f64,
    evidence_max_chars: usize,
}

impl CandidateValidator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            threshold: config.acceptance_threshold,
            evidence_max_chars: config.evidence_max_chars,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn check_confidence(&self, confidence: f64) -> Result<(), ValidationError> {
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(ValidationError::ConfidenceOutOfRange { confidence });
        }
        if confidence < self.threshold {
            return Err(ValidationError::BelowThreshold {
                confidence,
                threshold: self.threshold,
            });
        }
        Ok(())
    }

    pub fn validate_entity(&self, candidate: &EntityCandidate) -> Result<EntityId, ValidationError> {
        self.check_confidence(candidate.confidence)?;
        ids::entity_id(&candidate.name, candidate.entity_type).ok_or(ValidationError::EmptyName)
    }

    pub fn validate_relation(
        &self,
        candidate: &RelationCandidate,
    ) -> Result<(EntityId, EntityId), ValidationError> {
        self.check_confidence(candidate.confidence)?;
        let source = ids::entity_id(&candidate.source_name, candidate.source_type)
            .ok_or(ValidationError::EmptyName)?;
        let target = ids::entity_id(&candidate.target_name, candidate.target_type)
            .ok_or(ValidationError::EmptyName)?;
        if source == target {
            return Err(ValidationError::SelfLoop);
        }
        Ok((source, target))
    }

    /// Gate every candidate of a parsed extraction
    pub fn validate(&self, output: ExtractionOutput) -> ValidatedCandidates {
        let mut result = ValidatedCandidates {
            rejected: output.rejected,
            ..Default::default()
        };

        for (index, mut candidate) in output.entity_indexes.into_iter().zip(output.entities) {
            match self.validate_entity(&candidate) {
                Ok(id) => {
                    candidate.evidence = truncate_chars(&candidate.evidence, self.evidence_max_chars);
                    candidate.emotion_intensity = candidate.emotion_intensity.map(|v| v.clamp(0.0, 1.0));
                    result.entities.push(ValidatedEntity { index, id, candidate });
                }
                Err(error) => {
                    debug!(index, name = %candidate.name, %error, "Dropped entity candidate");
                    result
                        .rejected
                        .push(CandidateRejection::entity(index, Some(candidate.name), error));
                }
            }
        }

        for (index, mut candidate) in output.relation_indexes.into_iter().zip(output.relations) {
            match self.validate_relation(&candidate) {
                Ok((source_id, target_id)) => {
                    candidate.evidence = truncate_chars(&candidate.evidence, self.evidence_max_chars);
                    result.relations.push(ValidatedRelation {
                        index,
                        source_id,
                        target_id,
                        candidate,
                    });
                }
                Err(error) => {
                    let label = format!("{} -> {}", candidate.source_name, candidate.target_name);
                    debug!(index, relation = %label, %error, "Dropped relation candidate");
                    result
                        .rejected
                        .push(CandidateRejection::relation(index, Some(label), error));
                }
            }
        }

        result
    }
}

/// Truncate to at most `max` characters on a char boundary
pub fn truncate_chars(text: &str, max: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use profilegraph_core::{EdgeType, EntityType};

    fn validator() -> CandidateValidator {
        CandidateValidator::new(&EngineConfig::default())
    }

    #[test]
    fn test_threshold_gate() {
        let v = validator();
        assert!(v.validate_entity(&EntityCandidate::new("Dinosaurs", EntityType::Topic, 0.7)).is_ok());
        assert_eq!(
            v.validate_entity(&EntityCandidate::new("Volcanoes", EntityType::Topic, 0.69)),
            Err(ValidationError::BelowThreshold {
                confidence: 0.69,
                threshold: 0.7
            })
        );
        assert_eq!(
            v.validate_entity(&EntityCandidate::new("Volcanoes", EntityType::Topic, 1.2)),
            Err(ValidationError::ConfidenceOutOfRange { confidence: 1.2 })
        );
        assert!(matches!(
            v.validate_entity(&EntityCandidate::new("Volcanoes", EntityType::Topic, f64::NAN)),
            Err(ValidationError::ConfidenceOutOfRange { .. })
        ));
        assert_eq!(
            v.validate_entity(&EntityCandidate::new("?!", EntityType::Topic, 0.9)),
            Err(ValidationError::EmptyName)
        );
    }

    #[test]
    fn test_self_loop_rejected() {
        let rel = RelationCandidate::new(
            ("Dinosaurs", EntityType::Topic),
            ("dinosaurs!", EntityType::Topic),
            EdgeType::TemporalCooccurrence,
            0.9,
        );
        assert_eq!(validator().validate_relation(&rel), Err(ValidationError::SelfLoop));
    }

    #[test]
    fn test_drops_are_independent() {
        let output = ExtractionOutput::from_candidates(
            vec![
                EntityCandidate::new("Dinosaurs", EntityType::Topic, 0.9),
                EntityCandidate::new("Volcanoes", EntityType::Topic, 0.4),
            ],
            vec![RelationCandidate::new(
                ("Dinosaurs", EntityType::Topic),
                ("Volcanoes", EntityType::Topic),
                EdgeType::TemporalCooccurrence,
                1.5,
            )],
        );
        let validated = validator().validate(output);

        assert_eq!(validated.entities.len(), 1);
        assert_eq!(validated.entities[0].id, "topic_dinosaurs");
        assert!(validated.relations.is_empty());
        assert_eq!(validated.rejected.len(), 2);
        assert_eq!(validated.rejected[0].index, 1);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("  héllo wörld ", 5), "héllo");
        assert_eq!(truncate_chars("short", 200), "short");
        let long = "x".repeat(250);
        assert_eq!(truncate_chars(&long, 200).len(), 200);
    }
}
