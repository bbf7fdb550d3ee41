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

//! Graph engine error types

use std::time::Duration;
use thiserror::Error;

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors surfaced by ingestion and query operations.
///
/// Per-candidate validation failures are not errors at this level; they are
/// reported as [`crate::CandidateRejection`] values and the batch continues.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The extraction oracle returned output that could not be parsed at all.
    /// Nothing from the batch is persisted.
    #[error("Extraction output could not be parsed: {0}")]
    ExtractionFormat(String),

    /// The oracle did not answer within the caller-imposed deadline.
    #[error("Extraction timed out after {0:?}")]
    ExtractionTimeout(Duration),

    /// The oracle transport failed (connection refused, HTTP error, ...).
    #[error("Extraction oracle failed: {0}")]
    Oracle(String),

    /// Optimistic write retries were exhausted for a single document.
    #[error("Concurrency conflict on {key} after {attempts} attempts")]
    ConcurrencyConflict { key: String, attempts: u32 },

    /// A query referenced an entity absent from the subject's graph.
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// The prerequisite subgraph reachable from the query target is not a DAG.
    #[error("Prerequisite cycle detected: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    /// The persistence layer could not be reached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A stored document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stored edge already carries this id for a different endpoint pair.
    #[error("Edge {edge_id} is stored as {stored}, refusing to merge {incoming}")]
    EdgeEndpointMismatch {
        edge_id: String,
        stored: String,
        incoming: String,
    },

    /// The per-subject writer stopped before answering.
    #[error("Writer for subject {0} is no longer running")]
    WriterClosed(String),
}

impl GraphError {
    /// Whether the caller may retry the whole batch.
    ///
    /// Ingestion is idempotent per `(conversation, candidate set)`, so every
    /// transient failure can be retried wholesale.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GraphError::ConcurrencyConflict { .. }
                | GraphError::StoreUnavailable(_)
                | GraphError::ExtractionTimeout(_)
                | GraphError::Oracle(_)
                | GraphError::WriterClosed(_)
        )
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(e: serde_json::Error) -> Self {
        GraphError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(GraphError::StoreUnavailable("down".into()).is_transient());
        assert!(GraphError::ConcurrencyConflict {
            key: "k".into(),
            attempts: 3
        }
        .is_transient());
        assert!(!GraphError::ExtractionFormat("bad".into()).is_transient());
        assert!(!GraphError::NotFound("skill_x".into()).is_transient());
        assert!(!GraphError::EdgeEndpointMismatch {
            edge_id: "e".into(),
            stored: "a -> b".into(),
            incoming: "a -> c".into(),
        }
        .is_transient());
    }

    #[test]
    fn test_cycle_message_lists_path() {
        let err = GraphError::CycleDetected {
            path: vec!["skill_a".into(), "skill_b".into(), "skill_a".into()],
        };
        assert_eq!(
            err.to_string(),
            "Prerequisite cycle detected: skill_a -> skill_b -> skill_a"
        );
    }
}
