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

//! Per-subject summary
//!
//! Ranked lists use one total order everywhere: strength descending, then
//! mention count descending, then id ascending.

use crate::bounded::BoundedLog;
use crate::entity::{Entity, EntityType};
use crate::ids::{EntityId, ObservationId, SubjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Entry in a top-N list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntity {
    pub id: EntityId,
    pub name: String,
    pub strength: f64,
    pub mention_count: u64,
}

impl From<&Entity> for RankedEntity {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id.clone(),
            name: entity.name.clone(),
            strength: entity.strength,
            mention_count: entity.mention_count,
        }
    }
}

/// Ranking order for summary lists
pub fn rank_order(a: &RankedEntity, b: &RankedEntity) -> Ordering {
    b.strength
        .total_cmp(&a.strength)
        .then_with(|| b.mention_count.cmp(&a.mention_count))
        .then_with(|| a.id.cmp(&b.id))
}

/// Derived per-subject cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub subject_id: SubjectId,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub last_observation_id: Option<ObservationId>,
    pub total_entities: u64,
    pub total_edges: u64,
    #[serde(default)]
    pub counts_by_type: BTreeMap<EntityType, u64>,
    #[serde(default)]
    pub top_by_type: BTreeMap<EntityType, Vec<RankedEntity>>,
    /// Batch keys already folded into the counters
    #[serde(default = "default_applied_batches")]
    pub applied_batches: BoundedLog<String>,
}

/// Batch keys remembered by a summary
pub const SUMMARY_BATCH_WINDOW: usize = 64;

fn default_applied_batches() -> BoundedLog<String> {
    BoundedLog::new(SUMMARY_BATCH_WINDOW)
}

impl Summary {
    pub fn empty(subject_id: impl Into<SubjectId>) -> Self {
        Self {
            subject_id: subject_id.into(),
            last_updated_at: None,
            last_observation_id: None,
            total_entities: 0,
            total_edges: 0,
            counts_by_type: BTreeMap::new(),
            top_by_type: BTreeMap::new(),
            applied_batches: default_applied_batches(),
        }
    }

    pub fn has_applied(&self, batch_key: &str) -> bool {
        self.applied_batches.iter().any(|k| k == batch_key)
    }

    pub fn count(&self, entity_type: EntityType) -> u64 {
        self.counts_by_type.get(&entity_type).copied().unwrap_or(0)
    }

    pub fn top(&self, entity_type: EntityType) -> &[RankedEntity] {
        self.top_by_type
            .get(&entity_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Ranked content only, without bookkeeping fields
    pub fn same_rankings(&self, other: &Summary) -> bool {
        self.total_entities == other.total_entities
            && self.total_edges == other.total_edges
            && self.counts_by_type == other.counts_by_type
            && self.top_by_type == other.top_by_type
    }
}
