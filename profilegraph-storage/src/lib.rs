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

//! Profilegraph Storage
//!
//! Minimal key/document persistence boundary for subject graphs.
//!
//! ```text
//!   TypedStore<T>  ── serde + optimistic transact (bounded retries)
//!        │
//!   dyn DocumentStore ── get / put / put_if_version / scan_prefix
//!        │
//!   InMemoryStore | FileStore | FaultInjectingStore (wrapper)
//! ```
//!
//! Every document carries a store-assigned version used for compare-and-swap.
//! Timestamps inside documents are always written by the caller.

pub mod document;
pub mod error;
pub mod faults;
pub mod file;
pub mod keys;
pub mod memory;
pub mod typed;

pub use document::{DocumentStore, VersionedDocument};
pub use error::{StoreError, StoreResult};
pub use faults::FaultInjectingStore;
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use typed::{Outcome, TypedStore};
