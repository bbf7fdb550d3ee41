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

//! Filtered, ordered entity listing

use crate::snapshot::GraphSnapshot;
use profilegraph_core::{Entity, EntityType};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const DEFAULT_LIST_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    /// Strength desc, then mention count desc
    #[default]
    Strength,
    MentionCount,
    ConversationCount,
    /// Most recently observed first
    LastObservedAt,
    /// Case-insensitive, ascending
    Name,
}

impl OrderBy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "strength" => Some(OrderBy::Strength),
            "mentions" | "mention_count" | "mentioncount" => Some(OrderBy::MentionCount),
            "conversations" | "conversation_count" | "conversationcount" => {
                Some(OrderBy::ConversationCount)
            }
            "last_observed_at" | "lastobservedat" | "recent" => Some(OrderBy::LastObservedAt),
            "name" => Some(OrderBy::Name),
            _ => None,
        }
    }

    fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        let primary = match self {
            OrderBy::Strength => b
                .strength
                .total_cmp(&a.strength)
                .then_with(|| b.mention_count.cmp(&a.mention_count)),
            OrderBy::MentionCount => b.mention_count.cmp(&a.mention_count),
            OrderBy::ConversationCount => b.conversation_count.cmp(&a.conversation_count),
            OrderBy::LastObservedAt => b.last_observed_at.cmp(&a.last_observed_at),
            OrderBy::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityQuery {
    pub entity_type: Option<EntityType>,
    pub category: Option<String>,
    #[serde(default)]
    pub order_by: OrderBy,
    /// Defaults to [`DEFAULT_LIST_LIMIT`]
    pub limit: Option<usize>,
}

impl EntityQuery {
    pub fn of_type(entity_type: EntityType) -> Self {
        Self {
            entity_type: Some(entity_type),
            ..Self::default()
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

pub fn list_entities(snapshot: &GraphSnapshot, query: &EntityQuery) -> Vec<Entity> {
    let mut results: Vec<&Entity> = snapshot
        .entities()
        .filter(|e| query.entity_type.map_or(true, |t| e.entity_type == t))
        .filter(|e| query.category.as_deref().map_or(true, |c| e.category() == c))
        .collect();

    results.sort_by(|a, b| query.order_by.compare(a, b));
    results.truncate(query.limit.unwrap_or(DEFAULT_LIST_LIMIT));
    results.into_iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::fixtures::*;

    fn snapshot() -> GraphSnapshot {
        let mut a = entity("Apples", EntityType::Topic, 0.8);
        a.mention_count = 5;
        let b = entity("bananas", EntityType::Topic, 0.9);
        let mut c = entity("Cherries", EntityType::Topic, 0.8);
        c.mention_count = 5;
        let d = entity("Drawing", EntityType::Skill, 0.95);
        GraphSnapshot::new("s", vec![a, b, c, d], Vec::new())
    }

    fn ids(entities: Vec<Entity>) -> Vec<String> {
        entities.into_iter().map(|e| e.id).collect()
    }

    #[test]
    fn test_default_order_is_strength() {
        let listed = list_entities(&snapshot(), &EntityQuery::of_type(EntityType::Topic));
        assert_eq!(ids(listed), vec!["topic_bananas", "topic_apples", "topic_cherries"]);
    }

    #[test]
    fn test_name_order_and_limit() {
        let query = EntityQuery::default().order_by(OrderBy::Name).limit(2);
        let listed = list_entities(&snapshot(), &query);
        assert_eq!(ids(listed), vec!["topic_apples", "topic_bananas"]);
    }

    #[test]
    fn test_category_filter() {
        let query = EntityQuery::default().category("nonexistent");
        assert!(list_entities(&snapshot(), &query).is_empty());
    }

    #[test]
    fn test_parse_order() {
        assert_eq!(OrderBy::parse("mentionCount"), Some(OrderBy::MentionCount));
        assert_eq!(OrderBy::parse("last-observed-at"), Some(OrderBy::LastObservedAt));
        assert_eq!(OrderBy::parse("random"), None);
    }
}
