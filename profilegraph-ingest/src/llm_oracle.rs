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

//! Chat-completions extraction oracle
//!
//! Calls any OpenAI-compatible `/chat/completions` endpoint with the taxonomy
//! prompt and returns the model's message content unparsed.

use crate::oracle::{ExtractionOracle, SubjectContext, TranscriptContext};
use async_trait::async_trait;
use profilegraph_core::{GraphError, GraphResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;
use tracing::debug;

/// Oracle connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Base URL, `/chat/completions` is appended
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Only the first turns of a transcript are sent
    pub max_turns: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: 0.3,
            max_tokens: 2000,
            max_turns: 30,
        }
    }
}

pub struct HttpExtractionOracle {
    client: reqwest::Client,
    config: OracleConfig,
}

impl HttpExtractionOracle {
    pub fn new(config: OracleConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl ExtractionOracle for HttpExtractionOracle {
    async fn extract(
        &self,
        transcript: &TranscriptContext,
        subject: &SubjectContext,
    ) -> GraphResult<String> {
        let start = Instant::now();
        let prompt = build_prompt(transcript, subject, self.config.max_turns);

        let body = json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        let mut request = self
            .client
            .post(self.url())
            .header("content-type", "application/json")
            .json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| GraphError::Oracle(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GraphError::Oracle(format!(
                "HTTP {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GraphError::ExtractionFormat(e.to_string()))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                GraphError::ExtractionFormat("response has no message content".to_string())
            })?
            .trim()
            .to_string();

        debug!(
            subject = %subject.subject_id,
            model = %self.config.model,
            duration_ms = start.elapsed().as_millis() as u64,
            chars = content.len(),
            "Oracle answered"
        );

        Ok(content)
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

const TAXONOMY: &str = "\
TOPICS (category: subcategories)
- science_nature: prehistoric_animals, astronomy, biology, physics_chemistry, earth_science
- mathematics: numbers_counting, geometry, measurement, arithmetic
- language_literacy: reading, writing, vocabulary, storytelling
- arts_creativity: visual_arts, music, drama_performance, creative_expression
- social_emotional: emotions, relationships, empathy, conflict_resolution
- everyday_life: routines, safety, health, environment

SKILLS
- cognitive: memory, attention, reasoning, planning, categorization
- language_communication: expressive_language, receptive_language, conversation, pronunciation
- literacy_numeracy: counting, number_sense, phonics, reading_comprehension, writing
- social_emotional: emotion_recognition, emotion_regulation, empathy, cooperation
- creative_thinking: imagination, storytelling, creative_problem_solving, artistic_expression
- executive_function: working_memory, inhibitory_control, cognitive_flexibility, task_initiation

INTERESTS
- science_exploration: animals, space, nature, experiments
- creative: storytelling, art, music, pretend_play
- physical_active: sports, outdoor_play, dance_movement
- intellectual: puzzles, reading_books, numbers_patterns, questions_learning
- social_interactive: friendship, helping_caring, family
- fantasy_imagination: magical_themes, adventure, characters

CONCEPTS
- cognitive_development: cause_effect, classification, conservation, seriation
- time_sequence: temporal_concepts, sequence, duration, daily_cycles
- spatial_reasoning: position, direction, size_comparison, perspective
- abstract_thinking: symbolism, analogy, hypothetical_thinking, metacognition
- moral_reasoning: right_wrong, kindness, responsibility, honesty

PERSONALITY_TRAITS
- emotional_intelligence: self_awareness, self_regulation, empathy, social_awareness
- cognitive_traits: curiosity, persistence, attention_focus, creativity
- social_behavioral: cooperation, independence, leadership, shyness_confidence
- temperament: energy_level, adaptability, sensitivity, mood
- learning_style: verbal_learner, visual_learner, kinesthetic_learner, social_learner";

const OUTPUT_SHAPE: &str = r#"{
  "topics": [{"name": "Dinosaurs", "category": "science_nature", "subcategory": "prehistoric_animals",
              "knowledge_level": "intermediate", "question_types": ["what", "why"],
              "vocabulary_growth": ["carnivore"], "confidence": 0.9, "evidence": "..."}],
  "skills": [{"name": "Counting to 20", "category": "literacy_numeracy", "subcategory": "counting",
              "developmental_stage": "early_elementary", "mastery_level": "developing",
              "progression_rate": "steady", "milestone": "Counts to 20", "confidence": 0.85, "evidence": "..."}],
  "interests": [{"name": "Dinosaurs", "category": "science_exploration", "subcategory": "animals",
                 "engagement_level": 0.95, "initiation_frequency": 0.9, "persistence_level": 0.9,
                 "emotional_connection": "highly_positive", "emotion": "excitement", "emotion_intensity": 0.9,
                 "confidence": 0.9, "evidence": "..."}],
  "concepts": [{"name": "Extinction", "category": "cognitive_development", "subcategory": "cause_effect",
                "abstraction_level": "semi_abstract", "understanding_level": 0.7,
                "cognitive_markers": {"reasoning": "developing"}, "confidence": 0.8, "evidence": "..."}],
  "personality_traits": [{"name": "Curious", "category": "cognitive_traits", "subcategory": "curiosity",
                          "intensity": 0.85, "consistency": 0.9, "development_trend": "growing",
                          "confidence": 0.85, "evidence": "..."}],
  "relationships": [{"sourceEntity": "Counting to 20", "sourceType": "skill",
                     "targetEntity": "Addition", "targetType": "skill",
                     "relationType": "learning_pathway", "confidence": 0.85, "evidence": "...",
                     "attributes": {"prerequisite": true, "difficulty": "medium", "masteryRequired": 0.8}}]
}"#;

/// Extraction prompt for one transcript window
pub fn build_prompt(transcript: &TranscriptContext, subject: &SubjectContext, max_turns: usize) -> String {
    let conversation = transcript
        .turns
        .iter()
        .take(max_turns)
        .map(|t| format!("{}: {}", t.speaker, t.text))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You build a learning profile for a child (age level: {age}) from a conversation \
with an AI companion.\n\n\
CONVERSATION:\n{conversation}\n\n\
Extract topics, skills, interests, concepts and personality traits that are clearly \
evident, plus relationships between them. Give every item a confidence between 0.0 and \
1.0 and only include items at 0.7 or above. Evidence is a short quote or paraphrase, at \
most 200 characters.\n\n\
Use this taxonomy for category and subcategory:\n{taxonomy}\n\n\
Relationship types:\n\
- temporal_cooccurrence: discussed together, order does not matter \
(attributes: cooccurrenceFrequency, timeProximity)\n\
- learning_pathway: source enables or leads to target \
(attributes: prerequisite true/false, difficulty easy|medium|hard, masteryRequired)\n\
- emotional_association: an emotion tied to a topic or interest \
(attributes: emotion, intensity, valence positive|negative|neutral)\n\
Relationship endpoints must use names exactly as they appear in the entity arrays.\n\n\
Respond with one JSON object shaped like this and nothing else:\n{shape}",
        age = subject.age_level,
        conversation = conversation,
        taxonomy = TAXONOMY,
        shape = OUTPUT_SHAPE,
    )
}
