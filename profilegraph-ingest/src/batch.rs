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

//! Ingestion batches
//!
//! A batch is the validated candidate set of one conversation window. Its key
//! is a digest of the subject, the conversation and the candidates, so the
//! same input always produces the same key and the same observation id.

use crate::validator::{ValidatedCandidates, ValidatedEntity, ValidatedRelation};
use chrono::{DateTime, Utc};
use profilegraph_core::{
    CandidateRejection, ConversationId, GraphResult, Observation, ObservationId, Occurrence,
    SubjectId,
};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct Batch {
    pub subject_id: SubjectId,
    pub conversation_id: ConversationId,
    /// Caller-assigned time used for every log entry of this batch
    pub observed_at: DateTime<Utc>,
    pub key: String,
    pub entities: Vec<ValidatedEntity>,
    pub relations: Vec<ValidatedRelation>,
    pub rejected: Vec<CandidateRejection>,
}

#[derive(Serialize)]
struct KeyMaterial<'a> {
    subject_id: &'a str,
    conversation_id: &'a str,
    entities: &'a [ValidatedEntity],
    relations: &'a [ValidatedRelation],
}

impl Batch {
    pub fn new(
        subject_id: impl Into<SubjectId>,
        conversation_id: impl Into<ConversationId>,
        observed_at: DateTime<Utc>,
        validated: ValidatedCandidates,
    ) -> GraphResult<Self> {
        let subject_id = subject_id.into();
        let conversation_id = conversation_id.into();
        let key = batch_key(
            &subject_id,
            &conversation_id,
            &validated.entities,
            &validated.relations,
        )?;

        Ok(Self {
            subject_id,
            conversation_id,
            observed_at,
            key,
            entities: validated.entities,
            relations: validated.relations,
            rejected: validated.rejected,
        })
    }

    pub fn observation_id(&self) -> ObservationId {
        Observation::id_for(&self.conversation_id, &self.key)
    }

    /// Mark for the entity mutation at `ordinal`
    pub fn entity_mark(&self, ordinal: usize) -> String {
        format!("{}#e{}", self.key, ordinal)
    }

    /// Mark for the relation mutation at `ordinal`
    pub fn relation_mark(&self, ordinal: usize) -> String {
        format!("{}#r{}", self.key, ordinal)
    }

    /// Whether a `created_by` mark belongs to this batch
    pub fn owns_mark(&self, mark: &str) -> bool {
        mark.strip_prefix(self.key.as_str())
            .is_some_and(|rest| rest.starts_with('#'))
    }

    pub fn occurrence(&self, evidence: &str) -> Occurrence {
        Occurrence::new(self.conversation_id.clone(), self.observed_at, evidence)
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }
}

/// blake3 digest of the canonical JSON encoding of a candidate set
pub fn batch_key(
    subject_id: &str,
    conversation_id: &str,
    entities: &[ValidatedEntity],
    relations: &[ValidatedRelation],
) -> GraphResult<String> {
    let material = serde_json::to_vec(&KeyMaterial {
        subject_id,
        conversation_id,
        entities,
        relations,
    })?;
    Ok(blake3::hash(&material).to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ExtractionOutput;
    use crate::validator::CandidateValidator;
    use profilegraph_core::{EngineConfig, EntityCandidate, EntityType};

    fn validated(confidence: f64) -> ValidatedCandidates {
        CandidateValidator::new(&EngineConfig::default()).validate(ExtractionOutput::from_candidates(
            vec![EntityCandidate::new("Dinosaurs", EntityType::Topic, confidence)],
            Vec::new(),
        ))
    }

    #[test]
    fn test_key_is_deterministic() {
        let a = Batch::new("child", "conv-1", Utc::now(), validated(0.9)).unwrap();
        let b = Batch::new("child", "conv-1", Utc::now(), validated(0.9)).unwrap();
        assert_eq!(a.key, b.key);
        assert_eq!(a.observation_id(), b.observation_id());

        let other_conv = Batch::new("child", "conv-2", Utc::now(), validated(0.9)).unwrap();
        let other_conf = Batch::new("child", "conv-1", Utc::now(), validated(0.95)).unwrap();
        assert_ne!(a.key, other_conv.key);
        assert_ne!(a.key, other_conf.key);
    }

    #[test]
    fn test_marks() {
        let batch = Batch::new("child", "conv-1", Utc::now(), validated(0.9)).unwrap();
        let mark = batch.entity_mark(0);
        assert!(mark.ends_with("#e0"));
        assert!(batch.owns_mark(&mark));
        assert!(batch.owns_mark(&batch.relation_mark(3)));
        assert!(!batch.owns_mark("other#e0"));
        assert!(!batch.owns_mark(""));
    }
}
