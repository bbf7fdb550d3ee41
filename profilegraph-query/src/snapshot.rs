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

//! Point-in-time graph snapshot
//!
//! A snapshot holds every entity and every *active* edge of one subject plus
//! adjacency indexes. It is immutable once built; a batch derives a new one
//! instead of mutating it.

use profilegraph_core::{Edge, EdgeId, Entity, EntityId, GraphResult, SubjectId};
use profilegraph_storage::{keys, TypedStore};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Traversal direction relative to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outgoing,
    Incoming,
    #[default]
    Both,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "outgoing" | "out" => Some(Direction::Outgoing),
            "incoming" | "in" => Some(Direction::Incoming),
            "both" | "any" => Some(Direction::Both),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    subject_id: SubjectId,
    entities: BTreeMap<EntityId, Entity>,
    /// Active edges only
    edges: BTreeMap<EdgeId, Edge>,
    /// Edges leaving an entity. Symmetric edges are listed for both endpoints.
    outgoing: HashMap<EntityId, Vec<EdgeId>>,
    /// Edges arriving at an entity. Symmetric edges are listed for both endpoints.
    incoming: HashMap<EntityId, Vec<EdgeId>>,
}

impl GraphSnapshot {
    /// Build a snapshot, dropping inactive edges
    pub fn new(
        subject_id: impl Into<SubjectId>,
        entities: impl IntoIterator<Item = Entity>,
        edges: impl IntoIterator<Item = Edge>,
    ) -> Self {
        let entities: BTreeMap<EntityId, Entity> =
            entities.into_iter().map(|e| (e.id.clone(), e)).collect();
        let edges: BTreeMap<EdgeId, Edge> = edges
            .into_iter()
            .filter(Edge::is_active)
            .map(|e| (e.id.clone(), e))
            .collect();

        let mut snapshot = Self {
            subject_id: subject_id.into(),
            entities,
            edges,
            outgoing: HashMap::new(),
            incoming: HashMap::new(),
        };
        snapshot.rebuild_indexes();
        snapshot
    }

    /// Empty snapshot for a subject with no graph yet
    pub fn empty(subject_id: impl Into<SubjectId>) -> Self {
        Self::new(subject_id, Vec::new(), Vec::new())
    }

    /// Load every entity and edge of a subject from the store
    pub async fn load(store: &TypedStore, subject_id: &str) -> GraphResult<Self> {
        let entities: Vec<Entity> = store.scan(&keys::entities_prefix(subject_id)).await?;
        let edges: Vec<Edge> = store.scan(&keys::edges_prefix(subject_id)).await?;
        debug!(
            subject = subject_id,
            entities = entities.len(),
            edges = edges.len(),
            "Loaded graph snapshot"
        );
        Ok(Self::new(subject_id, entities, edges))
    }

    /// New snapshot with the given documents replacing their previous versions
    pub fn patched(
        &self,
        entities: impl IntoIterator<Item = Entity>,
        edges: impl IntoIterator<Item = Edge>,
    ) -> Self {
        let mut next_entities = self.entities.clone();
        for entity in entities {
            next_entities.insert(entity.id.clone(), entity);
        }

        let mut next_edges = self.edges.clone();
        for edge in edges {
            if edge.is_active() {
                next_edges.insert(edge.id.clone(), edge);
            } else {
                next_edges.remove(&edge.id);
            }
        }

        let mut snapshot = Self {
            subject_id: self.subject_id.clone(),
            entities: next_entities,
            edges: next_edges,
            outgoing: HashMap::new(),
            incoming: HashMap::new(),
        };
        snapshot.rebuild_indexes();
        snapshot
    }

    fn rebuild_indexes(&mut self) {
        self.outgoing.clear();
        self.incoming.clear();

        for edge in self.edges.values() {
            self.outgoing
                .entry(edge.source_id.clone())
                .or_default()
                .push(edge.id.clone());
            self.incoming
                .entry(edge.target_id.clone())
                .or_default()
                .push(edge.id.clone());

            if edge.edge_type.is_symmetric() {
                self.outgoing
                    .entry(edge.target_id.clone())
                    .or_default()
                    .push(edge.id.clone());
                self.incoming
                    .entry(edge.source_id.clone())
                    .or_default()
                    .push(edge.id.clone());
            }
        }
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.get(id)
    }

    /// Entities in id order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Active edges in id order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges incident to `entity_id` in the given direction, each listed once
    pub fn edges_of(&self, entity_id: &str, direction: Direction) -> Vec<&Edge> {
        let lookup = |index: &HashMap<EntityId, Vec<EdgeId>>| -> Vec<&Edge> {
            index
                .get(entity_id)
                .map(|ids| ids.iter().filter_map(|id| self.edges.get(id)).collect())
                .unwrap_or_default()
        };

        match direction {
            Direction::Outgoing => lookup(&self.outgoing),
            Direction::Incoming => lookup(&self.incoming),
            Direction::Both => {
                let mut all = lookup(&self.outgoing);
                let mut seen: HashSet<&str> = all.iter().map(|e| e.id.as_str()).collect();
                for edge in lookup(&self.incoming) {
                    if seen.insert(edge.id.as_str()) {
                        all.push(edge);
                    }
                }
                all
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{TimeZone, Utc};
    use profilegraph_core::{
        ids, Edge, EdgeAttributes, EdgeType, EngineConfig, Entity, EntityAttributes, EntityType,
        Occurrence,
    };

    pub fn occurrence() -> Occurrence {
        Occurrence::new(
            "conv-1",
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
            "fixture",
        )
    }

    pub fn entity(name: &str, entity_type: EntityType, strength: f64) -> Entity {
        let id = ids::entity_id(name, entity_type).unwrap();
        Entity::new(
            id,
            name,
            EntityAttributes::default_for(entity_type),
            strength,
            &occurrence(),
            &EngineConfig::default(),
        )
    }

    pub fn categorized(name: &str, entity_type: EntityType, category: &str) -> Entity {
        let mut e = entity(name, entity_type, 0.8);
        if let EntityAttributes::Interest { category: c, .. }
        | EntityAttributes::Topic { category: c, .. } = &mut e.attributes
        {
            *c = category.to_string();
        }
        e
    }

    pub fn edge(source: &Entity, target: &Entity, edge_type: EdgeType, weight: f64) -> Edge {
        let (id, _, _) = ids::edge_id(edge_type, &source.id, &target.id);
        let (source, target) = if edge_type.is_symmetric() && target.id < source.id {
            (target, source)
        } else {
            (source, target)
        };
        Edge::new(
            id,
            source.into(),
            target.into(),
            EdgeAttributes::default_for(edge_type),
            weight,
            &occurrence(),
            &EngineConfig::default(),
        )
    }

    pub fn prerequisite(source: &Entity, target: &Entity, weight: f64) -> Edge {
        let mut e = edge(source, target, EdgeType::LearningPathway, weight);
        e.attributes = EdgeAttributes::LearningPathway {
            prerequisite: true,
            difficulty: None,
            mastery_required: None,
        };
        e
    }
}
