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

//! Neighbor lookup

use crate::snapshot::{Direction, GraphSnapshot};
use profilegraph_core::{EdgeId, EdgeType, EntityId, EntityType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub entity_id: EntityId,
    pub name: String,
    pub entity_type: EntityType,
    pub edge_id: EdgeId,
    pub edge_type: EdgeType,
    pub weight: f64,
}

/// Immediate neighbors of `entity_id`, one entry per connecting edge.
///
/// Sorted by edge weight descending, then neighbor id, then edge id. An
/// unknown entity yields an empty list.
pub fn neighbors(
    snapshot: &GraphSnapshot,
    entity_id: &str,
    edge_type: Option<EdgeType>,
    direction: Direction,
    limit: Option<usize>,
) -> Vec<Neighbor> {
    if !snapshot.contains(entity_id) {
        return Vec::new();
    }

    let mut found: Vec<Neighbor> = snapshot
        .edges_of(entity_id, direction)
        .into_iter()
        .filter(|edge| edge_type.map_or(true, |t| edge.edge_type == t))
        .filter_map(|edge| {
            let other = edge.other_endpoint(entity_id)?;
            let entity = snapshot.entity(other)?;
            Some(Neighbor {
                entity_id: entity.id.clone(),
                name: entity.name.clone(),
                entity_type: entity.entity_type,
                edge_id: edge.id.clone(),
                edge_type: edge.edge_type,
                weight: edge.weight,
            })
        })
        .collect();

    found.sort_by(|a, b| {
        b.weight
            .total_cmp(&a.weight)
            .then_with(|| a.entity_id.cmp(&b.entity_id))
            .then_with(|| a.edge_id.cmp(&b.edge_id))
    });

    if let Some(limit) = limit {
        found.truncate(limit);
    }
    found
}
