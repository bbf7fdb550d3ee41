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

//! Engine configuration

use crate::error::{GraphError, GraphResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for aggregation, summaries and query defaults.
///
/// Every field has a default so partial TOML tables deserialize cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Candidates with confidence below this are dropped (τ)
    pub acceptance_threshold: f64,

    /// Capacity of an entity's recent observation ring buffer
    pub recent_observations_capacity: usize,

    /// Capacity of an edge's evidence snippet ring buffer
    pub evidence_capacity: usize,

    /// Capacity of an edge's distinct conversation history
    pub conversation_history_capacity: usize,

    /// Capacity of milestone and affect logs
    pub domain_log_capacity: usize,

    /// Evidence text is truncated to this many characters
    pub evidence_max_chars: usize,

    /// Length of each per-type ranked list in the summary
    pub summary_top_n: usize,

    /// Length of an entity's strongest-connection list
    pub top_connections: usize,

    /// Optimistic write attempts before `ConcurrencyConflict`
    pub transact_max_attempts: u32,

    /// Deadline for a single oracle call, in seconds
    pub extraction_timeout_secs: u64,

    /// Minimum co-occurrence weight for an edge to join a cluster
    pub cluster_min_edge_weight: f64,

    /// Version tag written into every observation
    pub extraction_version: String,

    /// Applied-mark window kept per entity and edge for retry de-duplication
    pub idempotency_window: usize,

    /// A subject writer with no batches for this long is released, in seconds
    pub writer_idle_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.7,
            recent_observations_capacity: 5,
            evidence_capacity: 3,
            conversation_history_capacity: 10,
            domain_log_capacity: 5,
            evidence_max_chars: 200,
            summary_top_n: 5,
            top_connections: 3,
            transact_max_attempts: 3,
            extraction_timeout_secs: 30,
            cluster_min_edge_weight: 0.6,
            extraction_version: "v1.0".to_string(),
            idempotency_window: 64,
            writer_idle_secs: 300,
        }
    }
}

impl EngineConfig {
    /// Oracle deadline as a [`Duration`]
    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    /// Writer idle timeout as a [`Duration`]
    pub fn writer_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.writer_idle_secs)
    }

    /// Reject values that would break engine invariants.
    pub fn validate(&self) -> GraphResult<()> {
        if !(0.0..=1.0).contains(&self.acceptance_threshold) {
            return Err(GraphError::Config(format!(
                "acceptance_threshold must be within [0, 1], got {}",
                self.acceptance_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.cluster_min_edge_weight) {
            return Err(GraphError::Config(format!(
                "cluster_min_edge_weight must be within [0, 1], got {}",
                self.cluster_min_edge_weight
            )));
        }

        let capacities = [
            ("recent_observations_capacity", self.recent_observations_capacity),
            ("evidence_capacity", self.evidence_capacity),
            ("conversation_history_capacity", self.conversation_history_capacity),
            ("domain_log_capacity", self.domain_log_capacity),
            ("summary_top_n", self.summary_top_n),
            ("idempotency_window", self.idempotency_window),
        ];
        for (name, value) in capacities {
            if value == 0 {
                return Err(GraphError::Config(format!("{} must be greater than 0", name)));
            }
        }

        if self.transact_max_attempts == 0 {
            return Err(GraphError::Config(
                "transact_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.extraction_timeout_secs == 0 {
            return Err(GraphError::Config(
                "extraction_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.writer_idle_secs == 0 {
            return Err(GraphError::Config(
                "writer_idle_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.acceptance_threshold, 0.7);
        assert_eq!(config.recent_observations_capacity, 5);
        assert_eq!(config.evidence_capacity, 3);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let config = EngineConfig {
            evidence_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(GraphError::Config(_))));
    }

    #[test]
    fn test_partial_table_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"summary_top_n": 10}"#).unwrap();
        assert_eq!(config.summary_top_n, 10);
        assert_eq!(config.transact_max_attempts, 3);
    }
}
