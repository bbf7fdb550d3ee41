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

//! Ingestion results returned to callers

use profilegraph_core::{CandidateRejection, EdgeId, EntityId, Observation, ObservationId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionReport {
    pub observation_id: ObservationId,
    pub entities_touched: Vec<EntityId>,
    pub edges_touched: Vec<EdgeId>,
    pub rejected: Vec<CandidateRejection>,
    /// The batch had been applied before; nothing new was counted
    pub replayed: bool,
}

impl IngestionReport {
    pub fn from_observation(
        observation: &Observation,
        rejected: Vec<CandidateRejection>,
        replayed: bool,
    ) -> Self {
        Self {
            observation_id: observation.id.clone(),
            entities_touched: observation.entity_ids(),
            edges_touched: observation.edge_ids(),
            rejected,
            replayed,
        }
    }
}
