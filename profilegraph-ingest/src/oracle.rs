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

//! Extraction oracle boundary
//!
//! The oracle turns a transcript window into raw candidate JSON. It is a
//! black box to the engine: its output is always parsed and validated before
//! anything touches the graph.

use async_trait::async_trait;
use profilegraph_core::{GraphError, GraphResult, SubjectId};
use serde::{Deserialize, Serialize};

/// Age level assumed when the caller does not know it
pub const DEFAULT_AGE_LEVEL: &str = "elementary";

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptTurn {
    /// Who spoke, e.g. `child` or `assistant`
    pub speaker: String,
    pub text: String,
}

/// Transcript window handed to the oracle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptContext {
    pub turns: Vec<TranscriptTurn>,
}

impl TranscriptContext {
    pub fn new(turns: Vec<TranscriptTurn>) -> Self {
        Self { turns }
    }

    /// Parse `speaker: text` lines; lines without a speaker continue the previous turn
    pub fn from_lines(text: &str) -> Self {
        let mut turns: Vec<TranscriptTurn> = Vec::new();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match line.split_once(':') {
                Some((speaker, said)) if !speaker.trim().is_empty() && speaker.len() <= 24 => {
                    turns.push(TranscriptTurn {
                        speaker: speaker.trim().to_string(),
                        text: said.trim().to_string(),
                    });
                }
                _ => match turns.last_mut() {
                    Some(last) => {
                        last.text.push(' ');
                        last.text.push_str(line);
                    }
                    None => turns.push(TranscriptTurn {
                        speaker: "unknown".to_string(),
                        text: line.to_string(),
                    }),
                },
            }
        }
        Self { turns }
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// What the oracle knows about the subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectContext {
    pub subject_id: SubjectId,
    pub age_level: String,
}

impl SubjectContext {
    pub fn new(subject_id: impl Into<SubjectId>) -> Self {
        Self {
            subject_id: subject_id.into(),
            age_level: DEFAULT_AGE_LEVEL.to_string(),
        }
    }

    pub fn with_age_level(mut self, age_level: impl Into<String>) -> Self {
        self.age_level = age_level.into();
        self
    }
}

/// Source of candidate entities and relations
#[async_trait]
pub trait ExtractionOracle: Send + Sync {
    /// Raw oracle output, expected to contain one JSON object
    async fn extract(
        &self,
        transcript: &TranscriptContext,
        subject: &SubjectContext,
    ) -> GraphResult<String>;

    fn name(&self) -> &str;
}

/// Oracle that replays a fixed response
#[derive(Debug, Clone)]
pub struct StaticExtractionOracle {
    response: String,
}

impl StaticExtractionOracle {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Self {
        Self::new(value.to_string())
    }
}

#[async_trait]
impl ExtractionOracle for StaticExtractionOracle {
    async fn extract(
        &self,
        _transcript: &TranscriptContext,
        _subject: &SubjectContext,
    ) -> GraphResult<String> {
        Ok(self.response.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Oracle used when none is configured; every extraction fails
#[derive(Debug, Clone, Default)]
pub struct DisabledOracle;

#[async_trait]
impl ExtractionOracle for DisabledOracle {
    async fn extract(
        &self,
        _transcript: &TranscriptContext,
        _subject: &SubjectContext,
    ) -> GraphResult<String> {
        Err(GraphError::Oracle("no extraction oracle configured".to_string()))
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_from_lines() {
        let transcript = TranscriptContext::from_lines(
            "child: I like dinosaurs\nassistant: Which one?\n  the big one with tiny arms\n\nchild: T-Rex!",
        );
        assert_eq!(transcript.turns.len(), 3);
        assert_eq!(transcript.turns[1].speaker, "assistant");
        assert_eq!(transcript.turns[1].text, "Which one? the big one with tiny arms");
        assert_eq!(transcript.turns[2].text, "T-Rex!");
    }

    #[tokio::test]
    async fn test_static_oracle_replays() {
        let oracle = StaticExtractionOracle::new("{\"topics\": []}");
        let out = oracle
            .extract(&TranscriptContext::default(), &SubjectContext::new("s"))
            .await
            .unwrap();
        assert_eq!(out, "{\"topics\": []}");
    }

    #[tokio::test]
    async fn test_disabled_oracle_is_transient_failure() {
        let err = DisabledOracle
            .extract(&TranscriptContext::default(), &SubjectContext::new("s"))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
