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

//! Graph Query Engine
//!
//! Read-only query interface over one immutable [`GraphSnapshot`]. Every
//! method sees the same snapshot, so a query never observes half a batch.

use crate::clusters::{interest_clusters, ClusterOptions, InterestCluster, DEFAULT_CLUSTER_TYPES};
use crate::listing::{list_entities, EntityQuery};
use crate::neighbors::{neighbors, Neighbor};
use crate::prerequisites::{learning_path, prerequisite_chain};
use crate::snapshot::{Direction, GraphSnapshot};
use crate::traversal::{context_subgraph, related_entities, ContextSubgraph, RelatedEntity};
use profilegraph_core::{EdgeType, EngineConfig, Entity, EntityId, EntityType, GraphResult};
use std::sync::Arc;

/// Defaults for [`GraphQueryEngine::context_subgraph`]
pub const CONTEXT_MAX_ENTITIES: usize = 15;
pub const CONTEXT_DEPTH: usize = 1;
pub const CONTEXT_MIN_WEIGHT: f64 = 0.7;

pub struct GraphQueryEngine {
    snapshot: Arc<GraphSnapshot>,
    cluster_min_edge_weight: f64,
}

impl GraphQueryEngine {
    pub fn new(snapshot: Arc<GraphSnapshot>, config: &EngineConfig) -> Self {
        Self {
            snapshot,
            cluster_min_edge_weight: config.cluster_min_edge_weight,
        }
    }

    pub fn snapshot(&self) -> &GraphSnapshot {
        &self.snapshot
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.snapshot.entity(id)
    }

    pub fn entities(&self, query: &EntityQuery) -> Vec<Entity> {
        list_entities(&self.snapshot, query)
    }

    pub fn neighbors(
        &self,
        entity_id: &str,
        edge_type: Option<EdgeType>,
        direction: Direction,
        limit: Option<usize>,
    ) -> Vec<Neighbor> {
        neighbors(&self.snapshot, entity_id, edge_type, direction, limit)
    }

    pub fn related_entities(
        &self,
        start: &str,
        max_depth: usize,
        edge_types: Option<&[EdgeType]>,
        min_weight: f64,
    ) -> Vec<RelatedEntity> {
        related_entities(&self.snapshot, start, max_depth, edge_types, min_weight)
    }

    /// Clusters over interests and topics
    pub fn interest_clusters(
        &self,
        min_cluster_size: usize,
        category: Option<&str>,
    ) -> Vec<InterestCluster> {
        self.clusters(min_cluster_size, category, &DEFAULT_CLUSTER_TYPES)
    }

    pub fn clusters(
        &self,
        min_cluster_size: usize,
        category: Option<&str>,
        entity_types: &[EntityType],
    ) -> Vec<InterestCluster> {
        let options = ClusterOptions {
            min_cluster_size,
            category,
            entity_types,
            min_edge_weight: self.cluster_min_edge_weight,
        };
        interest_clusters(&self.snapshot, &options)
    }

    pub fn prerequisite_chain(&self, target: &str) -> GraphResult<Vec<EntityId>> {
        prerequisite_chain(&self.snapshot, target)
    }

    pub fn learning_path(&self, start: &str, target: &str) -> GraphResult<Option<Vec<EntityId>>> {
        learning_path(&self.snapshot, start, target)
    }

    pub fn context_subgraph(
        &self,
        seeds: &[EntityId],
        max_entities: Option<usize>,
        depth: Option<usize>,
        min_weight: Option<f64>,
    ) -> ContextSubgraph {
        context_subgraph(
            &self.snapshot,
            seeds,
            max_entities.unwrap_or(CONTEXT_MAX_ENTITIES),
            depth.unwrap_or(CONTEXT_DEPTH),
            min_weight.unwrap_or(CONTEXT_MIN_WEIGHT),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::fixtures::*;

    #[test]
    fn test_cluster_weight_comes_from_config() {
        let a = entity("A", EntityType::Interest, 0.9);
        let b = entity("B", EntityType::Interest, 0.9);
        let snap = Arc::new(GraphSnapshot::new(
            "s",
            vec![a.clone(), b.clone()],
            vec![edge(&a, &b, EdgeType::TemporalCooccurrence, 0.65)],
        ));

        let lenient = GraphQueryEngine::new(snap.clone(), &EngineConfig::default());
        assert_eq!(lenient.interest_clusters(2, None).len(), 1);

        let strict = GraphQueryEngine::new(
            snap,
            &EngineConfig {
                cluster_min_edge_weight: 0.7,
                ..EngineConfig::default()
            },
        );
        assert!(strict.interest_clusters(2, None).is_empty());
    }
}
