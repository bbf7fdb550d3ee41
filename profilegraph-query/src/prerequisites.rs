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

//! Prerequisite chains and learning paths
//!
//! Both queries walk the prerequisite subgraph: active `learning_pathway`
//! edges whose `prerequisite` flag is set, read as `source` must come before
//! `target`.

use crate::snapshot::{Direction, GraphSnapshot};
use profilegraph_core::{EntityId, GraphError, GraphResult};
use std::collections::{HashMap, VecDeque};

/// Prerequisite predecessors of `entity_id` as `(source id, weight)`, sorted by id
fn predecessors<'a>(snapshot: &'a GraphSnapshot, entity_id: &str) -> Vec<(&'a str, f64)> {
    let mut preds: Vec<(&str, f64)> = snapshot
        .edges_of(entity_id, Direction::Incoming)
        .into_iter()
        .filter(|e| e.is_prerequisite() && e.target_id == entity_id)
        .map(|e| (e.source_id.as_str(), e.weight))
        .collect();
    preds.sort_by(|a, b| a.0.cmp(b.0));
    preds
}

/// Prerequisite successors of `entity_id` as `(target id, weight)`, sorted by id
fn successors<'a>(snapshot: &'a GraphSnapshot, entity_id: &str) -> Vec<(&'a str, f64)> {
    let mut succ: Vec<(&str, f64)> = snapshot
        .edges_of(entity_id, Direction::Outgoing)
        .into_iter()
        .filter(|e| e.is_prerequisite() && e.source_id == entity_id)
        .map(|e| (e.target_id.as_str(), e.weight))
        .collect();
    succ.sort_by(|a, b| a.0.cmp(b.0));
    succ
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    /// On the current DFS path
    Open,
    Done,
}

/// Every prerequisite of `target`, ordered roots first and ending with `target`.
///
/// Fails with `NotFound` for an unknown target and with `CycleDetected` when
/// the backward walk meets a node already on its path. The reported cycle is
/// in edge direction and starts and ends on the same entity.
pub fn prerequisite_chain(snapshot: &GraphSnapshot, target: &str) -> GraphResult<Vec<EntityId>> {
    if !snapshot.contains(target) {
        return Err(GraphError::NotFound(target.to_string()));
    }

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut order: Vec<EntityId> = Vec::new();
    // (node, its predecessors, next predecessor to visit)
    let mut stack: Vec<(&str, Vec<(&str, f64)>, usize)> = Vec::new();

    let root = snapshot
        .entity(target)
        .map(|e| e.id.as_str())
        .ok_or_else(|| GraphError::NotFound(target.to_string()))?;
    marks.insert(root, Mark::Open);
    stack.push((root, predecessors(snapshot, root), 0));

    while let Some((node, preds, next)) = stack.last_mut() {
        if *next >= preds.len() {
            let node = *node;
            marks.insert(node, Mark::Done);
            order.push(node.to_string());
            stack.pop();
            continue;
        }

        let (pred, _) = preds[*next];
        *next += 1;

        match marks.get(pred) {
            Some(Mark::Done) => {}
            Some(Mark::Open) => {
                let start = stack.iter().position(|(n, _, _)| *n == pred).unwrap_or(0);
                let mut path: Vec<String> = stack[start..].iter().map(|(n, _, _)| n.to_string()).collect();
                path.push(pred.to_string());
                path.reverse();
                return Err(GraphError::CycleDetected { path });
            }
            None => {
                marks.insert(pred, Mark::Open);
                stack.push((pred, predecessors(snapshot, pred), 0));
            }
        }
    }

    Ok(order)
}

/// Shortest prerequisite path from `start` to `target`, widest among equals.
///
/// Hop count is minimized first; among shortest paths the one whose weakest
/// edge is strongest wins, remaining ties going to the lower predecessor id.
/// Returns `Ok(None)` when `target` is unreachable.
pub fn learning_path(
    snapshot: &GraphSnapshot,
    start: &str,
    target: &str,
) -> GraphResult<Option<Vec<EntityId>>> {
    for id in [start, target] {
        if !snapshot.contains(id) {
            return Err(GraphError::NotFound(id.to_string()));
        }
    }
    if start == target {
        return Ok(Some(vec![start.to_string()]));
    }

    // BFS layers
    let mut dist: HashMap<&str, usize> = HashMap::from([(start, 0)]);
    let mut order: Vec<&str> = vec![start];
    let mut queue: VecDeque<&str> = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        let d = dist[node];
        for (next, _) in successors(snapshot, node) {
            if !dist.contains_key(next) {
                dist.insert(next, d + 1);
                order.push(next);
                queue.push_back(next);
            }
        }
    }

    if !dist.contains_key(target) {
        return Ok(None);
    }

    // Widest path over the shortest-path DAG, nodes taken in BFS order
    let mut best: HashMap<&str, f64> = HashMap::from([(start, f64::INFINITY)]);
    let mut parent: HashMap<&str, &str> = HashMap::new();
    for &node in &order {
        let Some(&width) = best.get(node) else {
            continue;
        };
        let d = dist[node];
        for (next, weight) in successors(snapshot, node) {
            if dist.get(next) != Some(&(d + 1)) {
                continue;
            }
            let candidate = width.min(weight);
            let better = match (best.get(next), parent.get(next)) {
                (Some(&current), Some(&p)) => {
                    candidate > current || (candidate == current && node < p)
                }
                _ => true,
            };
            if better {
                best.insert(next, candidate);
                parent.insert(next, node);
            }
        }
    }

    let mut path = vec![target.to_string()];
    let mut cursor = target;
    while cursor != start {
        let Some(&p) = parent.get(cursor) else {
            return Ok(None);
        };
        path.push(p.to_string());
        cursor = p;
    }
    path.reverse();
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::fixtures::*;
    use profilegraph_core::{EdgeType, Entity, EntityType};

    fn skills(names: &[&str]) -> Vec<Entity> {
        names.iter().map(|n| entity(n, EntityType::Skill, 0.9)).collect()
    }

    #[test]
    fn test_chain_roots_first() {
        let s = skills(&["S1", "S2", "S3"]);
        let edges = vec![prerequisite(&s[0], &s[1], 0.9), prerequisite(&s[1], &s[2], 0.9)];
        let snap = GraphSnapshot::new("s", s, edges);

        assert_eq!(
            prerequisite_chain(&snap, "skill_s3").unwrap(),
            vec!["skill_s1", "skill_s2", "skill_s3"]
        );
        assert_eq!(prerequisite_chain(&snap, "skill_s1").unwrap(), vec!["skill_s1"]);
    }

    #[test]
    fn test_chain_cycle_is_an_error() {
        let s = skills(&["S1", "S2", "S3"]);
        let edges = vec![
            prerequisite(&s[0], &s[1], 0.9),
            prerequisite(&s[1], &s[2], 0.9),
            prerequisite(&s[2], &s[0], 0.9),
        ];
        let snap = GraphSnapshot::new("s", s, edges);

        match prerequisite_chain(&snap, "skill_s3") {
            Err(GraphError::CycleDetected { path }) => {
                assert_eq!(path, vec!["skill_s3", "skill_s1", "skill_s2", "skill_s3"]);
            }
            other => panic!("Expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_chain_diamond_is_topological() {
        // A -> B -> D, A -> C -> D
        let s = skills(&["A", "B", "C", "D"]);
        let edges = vec![
            prerequisite(&s[0], &s[1], 0.9),
            prerequisite(&s[0], &s[2], 0.9),
            prerequisite(&s[1], &s[3], 0.9),
            prerequisite(&s[2], &s[3], 0.9),
        ];
        let snap = GraphSnapshot::new("s", s, edges);
        assert_eq!(
            prerequisite_chain(&snap, "skill_d").unwrap(),
            vec!["skill_a", "skill_b", "skill_c", "skill_d"]
        );
    }

    #[test]
    fn test_chain_ignores_non_prerequisite_edges() {
        let s = skills(&["S1", "S2"]);
        let edges = vec![edge(&s[0], &s[1], EdgeType::LearningPathway, 0.9)];
        let snap = GraphSnapshot::new("s", s, edges);
        assert_eq!(prerequisite_chain(&snap, "skill_s2").unwrap(), vec!["skill_s2"]);
        assert!(matches!(
            prerequisite_chain(&snap, "skill_zz"),
            Err(GraphError::NotFound(_))
        ));
    }

    #[test]
    fn test_widest_path_tie_break() {
        let s = skills(&["S1", "S2", "S3", "S4"]);
        let edges = vec![
            prerequisite(&s[0], &s[1], 0.9),
            prerequisite(&s[1], &s[3], 0.9),
            prerequisite(&s[0], &s[2], 0.5),
            prerequisite(&s[2], &s[3], 0.5),
        ];
        let snap = GraphSnapshot::new("s", s, edges);
        assert_eq!(
            learning_path(&snap, "skill_s1", "skill_s4").unwrap(),
            Some(vec!["skill_s1".into(), "skill_s2".into(), "skill_s4".into()])
        );
    }

    #[test]
    fn test_shorter_path_beats_wider_path() {
        // S1 -> S4 directly (0.2) vs S1 -> S2 -> S4 (0.9, 0.9)
        let s = skills(&["S1", "S2", "S4"]);
        let edges = vec![
            prerequisite(&s[0], &s[2], 0.2),
            prerequisite(&s[0], &s[1], 0.9),
            prerequisite(&s[1], &s[2], 0.9),
        ];
        let snap = GraphSnapshot::new("s", s, edges);
        assert_eq!(
            learning_path(&snap, "skill_s1", "skill_s4").unwrap(),
            Some(vec!["skill_s1".into(), "skill_s4".into()])
        );
    }

    #[test]
    fn test_path_edge_cases() {
        let s = skills(&["S1", "S2"]);
        let edges = vec![prerequisite(&s[0], &s[1], 0.9)];
        let snap = GraphSnapshot::new("s", s, edges);

        assert_eq!(
            learning_path(&snap, "skill_s1", "skill_s1").unwrap(),
            Some(vec!["skill_s1".into()])
        );
        assert_eq!(learning_path(&snap, "skill_s2", "skill_s1").unwrap(), None);
        assert!(matches!(
            learning_path(&snap, "skill_s1", "skill_nope"),
            Err(GraphError::NotFound(_))
        ));
    }
}
