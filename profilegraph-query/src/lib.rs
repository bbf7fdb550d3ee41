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

//! Profilegraph Query
//!
//! Read-only graph algorithms over an immutable per-subject snapshot:
//!
//! - neighbor lookup by direction and edge type
//! - bounded breadth-first traversal (`related_entities`)
//! - connected-component clustering over co-occurrence edges
//! - prerequisite-chain reconstruction with cycle detection
//! - shortest prerequisite path with a widest-path tie-break
//! - entity listing and context-subgraph extraction
//!
//! Snapshots are loaded once per query; traversal never goes back to the store.

pub mod clusters;
pub mod engine;
pub mod listing;
pub mod neighbors;
pub mod prerequisites;
pub mod snapshot;
pub mod traversal;

pub use clusters::{ClusterMember, ClusterOptions, InterestCluster};
pub use engine::GraphQueryEngine;
pub use listing::{EntityQuery, OrderBy};
pub use neighbors::Neighbor;
pub use snapshot::{Direction, GraphSnapshot};
pub use traversal::{ContextEdge, ContextEntity, ContextSubgraph, RelatedEntity};
