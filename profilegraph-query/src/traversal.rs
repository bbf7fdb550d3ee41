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

//! Breadth-first traversals
//!
//! Both traversals expand level by level. Within a level, candidate edges are
//! sorted by weight descending (then neighbor id, then edge id) before any
//! node is recorded, so results do not depend on index order.

use crate::snapshot::{Direction, GraphSnapshot};
use profilegraph_core::{EdgeId, EdgeType, EntityId, EntityType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An entity discovered by [`related_entities`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedEntity {
    pub entity_id: EntityId,
    pub name: String,
    pub entity_type: EntityType,
    /// Hop count at first discovery
    pub depth: usize,
    /// Weight of the edge that discovered this entity
    pub connection_strength: f64,
    pub via_edge_id: EdgeId,
    pub via_edge_type: EdgeType,
}

struct Candidate<'a> {
    weight: f64,
    neighbor: &'a str,
    edge_id: &'a str,
    edge_type: EdgeType,
}

/// Collect and order the next level's candidate edges
fn expand<'a>(
    snapshot: &'a GraphSnapshot,
    frontier: &[String],
    visited: &HashSet<String>,
    edge_types: Option<&[EdgeType]>,
    min_weight: f64,
) -> Vec<Candidate<'a>> {
    let mut candidates = Vec::new();

    for node in frontier {
        for edge in snapshot.edges_of(node, Direction::Both) {
            if edge.weight < min_weight {
                continue;
            }
            if let Some(types) = edge_types {
                if !types.contains(&edge.edge_type) {
                    continue;
                }
            }
            let Some(other) = edge.other_endpoint(node) else {
                continue;
            };
            if visited.contains(other) || !snapshot.contains(other) {
                continue;
            }
            candidates.push(Candidate {
                weight: edge.weight,
                neighbor: other,
                edge_id: &edge.id,
                edge_type: edge.edge_type,
            });
        }
    }

    candidates.sort_by(|a, b| {
        b.weight
            .total_cmp(&a.weight)
            .then_with(|| a.neighbor.cmp(b.neighbor))
            .then_with(|| a.edge_id.cmp(b.edge_id))
    });
    candidates
}

/// Entities reachable from `start` within `max_depth` hops.
///
/// Edges are followed in either direction. Each entity is reported once, at
/// the depth it was first discovered. The start entity is never reported; an
/// unknown start yields an empty list.
pub fn related_entities(
    snapshot: &GraphSnapshot,
    start: &str,
    max_depth: usize,
    edge_types: Option<&[EdgeType]>,
    min_weight: f64,
) -> Vec<RelatedEntity> {
    if !snapshot.contains(start) {
        return Vec::new();
    }

    let mut visited: HashSet<String> = HashSet::from([start.to_string()]);
    let mut frontier = vec![start.to_string()];
    let mut results = Vec::new();

    for depth in 1..=max_depth {
        let mut next = Vec::new();

        for candidate in expand(snapshot, &frontier, &visited, edge_types, min_weight) {
            if !visited.insert(candidate.neighbor.to_string()) {
                continue;
            }
            let Some(entity) = snapshot.entity(candidate.neighbor) else {
                continue;
            };
            results.push(RelatedEntity {
                entity_id: entity.id.clone(),
                name: entity.name.clone(),
                entity_type: entity.entity_type,
                depth,
                connection_strength: candidate.weight,
                via_edge_id: candidate.edge_id.to_string(),
                via_edge_type: candidate.edge_type,
            });
            next.push(entity.id.clone());
        }

        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    results
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntity {
    pub entity_id: EntityId,
    pub name: String,
    pub entity_type: EntityType,
    pub category: String,
    pub strength: f64,
    pub is_seed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEdge {
    pub edge_id: EdgeId,
    pub edge_type: EdgeType,
    pub source_id: EntityId,
    pub target_id: EntityId,
    pub weight: f64,
}

/// Compact neighbourhood of a set of seeds, for prompt context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSubgraph {
    pub entities: Vec<ContextEntity>,
    pub edges: Vec<ContextEdge>,
}

/// Multi-seed BFS capped at `max_entities`.
///
/// Seeds come first in the order given (unknown seeds are skipped), then
/// discovered entities level by level. Edges are every active edge of weight
/// at least `min_weight` between two included entities.
pub fn context_subgraph(
    snapshot: &GraphSnapshot,
    seeds: &[EntityId],
    max_entities: usize,
    depth: usize,
    min_weight: f64,
) -> ContextSubgraph {
    let mut visited: HashSet<String> = HashSet::new();
    let mut included: Vec<(&str, bool)> = Vec::new();

    for seed in seeds {
        if included.len() >= max_entities {
            break;
        }
        if snapshot.contains(seed) && visited.insert(seed.clone()) {
            included.push((seed.as_str(), true));
        }
    }

    let mut frontier: Vec<String> = included.iter().map(|(id, _)| id.to_string()).collect();
    for _ in 0..depth {
        if included.len() >= max_entities || frontier.is_empty() {
            break;
        }
        let mut next = Vec::new();
        for candidate in expand(snapshot, &frontier, &visited, None, min_weight) {
            if included.len() >= max_entities {
                break;
            }
            if visited.insert(candidate.neighbor.to_string()) {
                included.push((candidate.neighbor, false));
                next.push(candidate.neighbor.to_string());
            }
        }
        frontier = next;
    }

    let members: HashSet<&str> = included.iter().map(|(id, _)| *id).collect();

    let entities = included
        .iter()
        .filter_map(|(id, is_seed)| {
            let entity = snapshot.entity(id)?;
            Some(ContextEntity {
                entity_id: entity.id.clone(),
                name: entity.name.clone(),
                entity_type: entity.entity_type,
                category: entity.category().to_string(),
                strength: entity.strength,
                is_seed: *is_seed,
            })
        })
        .collect();

    let edges = snapshot
        .edges()
        .filter(|e| e.weight >= min_weight)
        .filter(|e| members.contains(e.source_id.as_str()) && members.contains(e.target_id.as_str()))
        .map(|e| ContextEdge {
            edge_id: e.id.clone(),
            edge_type: e.edge_type,
            source_id: e.source_id.clone(),
            target_id: e.target_id.clone(),
            weight: e.weight,
        })
        .collect();

    ContextSubgraph { entities, edges }
}
