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

//! Key scheme
//!
//! ```text
//! subjects/{subject}/entities/{entity_id}
//! subjects/{subject}/edges/{edge_id}
//! subjects/{subject}/observations/{observation_id}
//! subjects/{subject}/summary
//! ```

/// Key prefix for subjects
const SUBJECT_PREFIX: &str = "subjects";
const ENTITY_SEGMENT: &str = "entities";
const EDGE_SEGMENT: &str = "edges";
const OBSERVATION_SEGMENT: &str = "observations";
const SUMMARY_SEGMENT: &str = "summary";

pub fn subject_prefix(subject_id: &str) -> String {
    format!("{}/{}/", SUBJECT_PREFIX, subject_id)
}

pub fn entity(subject_id: &str, entity_id: &str) -> String {
    format!("{}{}/{}", subject_prefix(subject_id), ENTITY_SEGMENT, entity_id)
}

pub fn entities_prefix(subject_id: &str) -> String {
    format!("{}{}/", subject_prefix(subject_id), ENTITY_SEGMENT)
}

pub fn edge(subject_id: &str, edge_id: &str) -> String {
    format!("{}{}/{}", subject_prefix(subject_id), EDGE_SEGMENT, edge_id)
}

pub fn edges_prefix(subject_id: &str) -> String {
    format!("{}{}/", subject_prefix(subject_id), EDGE_SEGMENT)
}

pub fn observation(subject_id: &str, observation_id: &str) -> String {
    format!(
        "{}{}/{}",
        subject_prefix(subject_id),
        OBSERVATION_SEGMENT,
        observation_id
    )
}

pub fn observations_prefix(subject_id: &str) -> String {
    format!("{}{}/", subject_prefix(subject_id), OBSERVATION_SEGMENT)
}

pub fn summary(subject_id: &str) -> String {
    format!("{}{}", subject_prefix(subject_id), SUMMARY_SEGMENT)
}
