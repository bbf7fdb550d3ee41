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

//! Deterministic identifiers
//!
//! ```text
//! entity:  {type}_{normalized name}                 topic_dinosaurs
//! edge:    {edge type}:{source id}:{target id}      learning_pathway:skill_counting:skill_addition
//! ```
//!
//! Symmetric edge types sort the two endpoint ids before joining them, so the
//! same pair always yields the same id regardless of extraction order.
//! Normalized names never contain [`EDGE_ID_SEPARATOR`], so distinct endpoint
//! pairs never share an edge id.

use crate::edge::EdgeType;
use crate::entity::EntityType;

pub type SubjectId = String;
pub type ConversationId = String;
pub type EntityId = String;
pub type EdgeId = String;
pub type ObservationId = String;

/// Joins the parts of an edge id
pub const EDGE_ID_SEPARATOR: char = ':';

/// Normalize a display name for identity.
///
/// Lower-cases, drops everything that is not an ASCII letter, digit or
/// whitespace, and joins the remaining words with underscores.
pub fn normalize_name(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Entity id for a name and type, or `None` when the name normalizes to nothing.
pub fn entity_id(name: &str, entity_type: EntityType) -> Option<EntityId> {
    let normalized = normalize_name(name);
    if normalized.is_empty() {
        return None;
    }
    Some(format!("{}_{}", entity_type.as_str(), normalized))
}

/// Edge id for an endpoint pair.
///
/// Returns the id together with the (possibly swapped) `(source, target)`
/// order the edge must be stored with.
pub fn edge_id<'a>(
    edge_type: EdgeType,
    source_id: &'a str,
    target_id: &'a str,
) -> (EdgeId, &'a str, &'a str) {
    let (first, second) = if edge_type.is_symmetric() && target_id < source_id {
        (target_id, source_id)
    } else {
        (source_id, target_id)
    };
    let id = format!(
        "{}{sep}{}{sep}{}",
        edge_type.as_str(),
        first,
        second,
        sep = EDGE_ID_SEPARATOR
    );
    (id, first, second)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Dinosaurs"), "dinosaurs");
        assert_eq!(normalize_name("T-Rex's  Diet!"), "trexs_diet");
        assert_eq!(normalize_name("  Counting to 20 "), "counting_to_20");
        assert_eq!(normalize_name("¿¡!!"), "");
    }

    #[test]
    fn test_entity_id_is_pure() {
        assert_eq!(
            entity_id("Counting to 20", EntityType::Skill).as_deref(),
            Some("skill_counting_to_20")
        );
        assert_eq!(
            entity_id("counting TO 20!", EntityType::Skill),
            entity_id("Counting to 20", EntityType::Skill)
        );
        assert_ne!(
            entity_id("Dinosaurs", EntityType::Topic),
            entity_id("Dinosaurs", EntityType::Interest)
        );
        assert_eq!(entity_id("???", EntityType::Topic), None);
    }

    #[test]
    fn test_symmetric_edge_ids_collapse() {
        let (ab, s1, t1) = edge_id(EdgeType::TemporalCooccurrence, "topic_b", "topic_a");
        let (ba, s2, t2) = edge_id(EdgeType::TemporalCooccurrence, "topic_a", "topic_b");
        assert_eq!(ab, ba);
        assert_eq!((s1, t1), ("topic_a", "topic_b"));
        assert_eq!((s2, t2), ("topic_a", "topic_b"));
    }

    #[test]
    fn test_directed_edge_ids_keep_order() {
        let (forward, _, _) = edge_id(EdgeType::LearningPathway, "skill_b", "skill_a");
        let (backward, source, target) = edge_id(EdgeType::LearningPathway, "skill_a", "skill_b");
        assert_ne!(forward, backward);
        assert_eq!(forward, "learning_pathway:skill_b:skill_a");
        assert_eq!((source, target), ("skill_a", "skill_b"));
    }

    #[test]
    fn test_edge_ids_do_not_collide_across_pairs() {
        let x_y = entity_id("x topic y", EntityType::Topic).unwrap();
        let z = entity_id("z", EntityType::Topic).unwrap();
        let x = entity_id("x", EntityType::Topic).unwrap();
        let y_z = entity_id("y topic z", EntityType::Topic).unwrap();

        let (first, _, _) = edge_id(EdgeType::LearningPathway, &x_y, &z);
        let (second, _, _) = edge_id(EdgeType::LearningPathway, &x, &y_z);
        assert_ne!(first, second);
        assert!(!normalize_name("a:b").contains(EDGE_ID_SEPARATOR));
    }
}
