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

//! Interest clustering
//!
//! Connected components over symmetric edges, found with an iterative DFS.

use crate::snapshot::GraphSnapshot;
use profilegraph_core::{Entity, EntityId, EntityType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Label used when no member carries a category
pub const UNCATEGORIZED: &str = "uncategorized";

/// Entity types clustered when the caller does not choose
pub const DEFAULT_CLUSTER_TYPES: [EntityType; 2] = [EntityType::Interest, EntityType::Topic];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterMember {
    pub entity_id: EntityId,
    pub name: String,
    pub entity_type: EntityType,
    pub category: String,
    pub strength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestCluster {
    /// Position-based id, `cluster_0` is the largest
    pub id: String,
    /// Majority category of the members
    pub label: String,
    /// Three strongest member names joined with ` & `
    pub display_name: String,
    /// Members in id order
    pub members: Vec<ClusterMember>,
    pub internal_edges: usize,
    pub average_weight: f64,
}

impl InterestCluster {
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

#[derive(Debug, Clone)]
pub struct ClusterOptions<'a> {
    pub min_cluster_size: usize,
    pub category: Option<&'a str>,
    pub entity_types: &'a [EntityType],
    /// Symmetric edges lighter than this do not connect members
    pub min_edge_weight: f64,
}

impl Default for ClusterOptions<'_> {
    fn default() -> Self {
        Self {
            min_cluster_size: 2,
            category: None,
            entity_types: &DEFAULT_CLUSTER_TYPES,
            min_edge_weight: 0.6,
        }
    }
}

fn eligible(entity: &Entity, options: &ClusterOptions<'_>) -> bool {
    options.entity_types.contains(&entity.entity_type)
        && options.category.map_or(true, |c| entity.category() == c)
}

/// Majority category; ties go to the category of the lowest-id member
fn majority_label(members: &[&Entity]) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for member in members {
        if !member.category().is_empty() {
            *counts.entry(member.category()).or_default() += 1;
        }
    }

    let Some(best) = counts.values().copied().max() else {
        return UNCATEGORIZED.to_string();
    };

    // members are in id order
    members
        .iter()
        .map(|m| m.category())
        .find(|c| counts.get(c) == Some(&best))
        .unwrap_or(UNCATEGORIZED)
        .to_string()
}

fn display_name(members: &[&Entity]) -> String {
    let mut ranked: Vec<&&Entity> = members.iter().collect();
    ranked.sort_by(|a, b| {
        b.strength
            .total_cmp(&a.strength)
            .then_with(|| b.mention_count.cmp(&a.mention_count))
            .then_with(|| a.id.cmp(&b.id))
    });
    ranked
        .iter()
        .take(3)
        .map(|e| e.name.as_str())
        .collect::<Vec<_>>()
        .join(" & ")
}

/// Connected components of eligible entities with at least `min_cluster_size` members.
///
/// Clusters are ordered by size descending, then by their lowest member id.
pub fn interest_clusters(
    snapshot: &GraphSnapshot,
    options: &ClusterOptions<'_>,
) -> Vec<InterestCluster> {
    let nodes: BTreeMap<&str, &Entity> = snapshot
        .entities()
        .filter(|e| eligible(e, options))
        .map(|e| (e.id.as_str(), e))
        .collect();

    let mut adjacency: HashMap<&str, BTreeSet<&str>> = HashMap::new();
    let mut component_edges: Vec<(&str, f64)> = Vec::new();
    for edge in snapshot.edges() {
        if !edge.edge_type.is_symmetric() || edge.weight < options.min_edge_weight {
            continue;
        }
        let (a, b) = (edge.source_id.as_str(), edge.target_id.as_str());
        if !nodes.contains_key(a) || !nodes.contains_key(b) {
            continue;
        }
        adjacency.entry(a).or_default().insert(b);
        adjacency.entry(b).or_default().insert(a);
        component_edges.push((a, edge.weight));
    }

    let mut component_of: HashMap<&str, usize> = HashMap::new();
    let mut components: Vec<Vec<&str>> = Vec::new();

    for &root in nodes.keys() {
        if component_of.contains_key(root) {
            continue;
        }
        let index = components.len();
        let mut members = Vec::new();
        let mut stack = vec![root];
        component_of.insert(root, index);

        while let Some(node) = stack.pop() {
            members.push(node);
            if let Some(next) = adjacency.get(node) {
                for &neighbor in next.iter().rev() {
                    if !component_of.contains_key(neighbor) {
                        component_of.insert(neighbor, index);
                        stack.push(neighbor);
                    }
                }
            }
        }

        members.sort_unstable();
        components.push(members);
    }

    let mut edge_totals: HashMap<usize, (usize, f64)> = HashMap::new();
    for (endpoint, weight) in component_edges {
        if let Some(&index) = component_of.get(endpoint) {
            let entry = edge_totals.entry(index).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += weight;
        }
    }

    let mut clusters: Vec<(usize, Vec<&str>)> = components
        .into_iter()
        .enumerate()
        .filter(|(_, members)| members.len() >= options.min_cluster_size.max(1))
        .collect();

    clusters.sort_by(|(_, a), (_, b)| b.len().cmp(&a.len()).then_with(|| a[0].cmp(b[0])));

    clusters
        .into_iter()
        .enumerate()
        .map(|(position, (index, ids))| {
            let members: Vec<&Entity> = ids.iter().filter_map(|id| nodes.get(id).copied()).collect();
            let (internal_edges, total_weight) = edge_totals.get(&index).copied().unwrap_or((0, 0.0));

            InterestCluster {
                id: format!("cluster_{}", position),
                label: majority_label(&members),
                display_name: display_name(&members),
                members: members
                    .iter()
                    .map(|e| ClusterMember {
                        entity_id: e.id.clone(),
                        name: e.name.clone(),
                        entity_type: e.entity_type,
                        category: e.category().to_string(),
                        strength: e.strength,
                    })
                    .collect(),
                internal_edges,
                average_weight: if internal_edges > 0 {
                    total_weight / internal_edges as f64
                } else {
                    0.0
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::fixtures::*;
    use profilegraph_core::EdgeType;

    #[test]
    fn test_isolated_entity_excluded() {
        let i1 = entity("I1", EntityType::Interest, 0.9);
        let i2 = entity("I2", EntityType::Interest, 0.8);
        let i3 = entity("I3", EntityType::Interest, 0.9);
        let snap = GraphSnapshot::new(
            "s",
            vec![i1.clone(), i2.clone(), i3],
            vec![edge(&i1, &i2, EdgeType::TemporalCooccurrence, 0.9)],
        );

        let clusters = interest_clusters(&snap, &ClusterOptions::default());
        assert_eq!(clusters.len(), 1);
        let ids: Vec<&str> = clusters[0].members.iter().map(|m| m.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["interest_i1", "interest_i2"]);
        assert_eq!(clusters[0].display_name, "I1 & I2");
        assert_eq!(clusters[0].internal_edges, 1);
        assert_eq!(clusters[0].label, UNCATEGORIZED);
    }

    #[test]
    fn test_ordering_and_labels() {
        let a = categorized("A", EntityType::Interest, "arts");
        let b = categorized("B", EntityType::Interest, "science");
        let c = categorized("C", EntityType::Topic, "science");
        let x = categorized("X", EntityType::Interest, "sports");
        let y = categorized("Y", EntityType::Interest, "music");
        let edges = vec![
            edge(&a, &b, EdgeType::TemporalCooccurrence, 0.9),
            edge(&b, &c, EdgeType::TemporalCooccurrence, 0.7),
            edge(&x, &y, EdgeType::TemporalCooccurrence, 0.8),
        ];
        let snap = GraphSnapshot::new("s", vec![a, b, c, x, y], edges);

        let clusters = interest_clusters(&snap, &ClusterOptions::default());
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].id, "cluster_0");
        assert_eq!(clusters[0].size(), 3);
        assert_eq!(clusters[0].label, "science");
        // tie between music and sports goes to the lowest member id
        assert_eq!(clusters[1].label, "sports");
    }

    #[test]
    fn test_weak_and_directed_edges_do_not_connect() {
        let a = entity("A", EntityType::Interest, 0.9);
        let b = entity("B", EntityType::Interest, 0.9);
        let c = entity("C", EntityType::Interest, 0.9);
        let edges = vec![
            edge(&a, &b, EdgeType::TemporalCooccurrence, 0.5),
            edge(&b, &c, EdgeType::LearningPathway, 0.9),
        ];
        let snap = GraphSnapshot::new("s", vec![a, b, c], edges);
        assert!(interest_clusters(&snap, &ClusterOptions::default()).is_empty());
    }

    #[test]
    fn test_category_filter() {
        let a = categorized("A", EntityType::Interest, "science");
        let b = categorized("B", EntityType::Interest, "science");
        let c = categorized("C", EntityType::Interest, "arts");
        let edges = vec![
            edge(&a, &b, EdgeType::TemporalCooccurrence, 0.9),
            edge(&b, &c, EdgeType::TemporalCooccurrence, 0.9),
        ];
        let snap = GraphSnapshot::new("s", vec![a, b, c], edges);

        let options = ClusterOptions {
            category: Some("science"),
            ..ClusterOptions::default()
        };
        let clusters = interest_clusters(&snap, &options);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].size(), 2);
    }
}
