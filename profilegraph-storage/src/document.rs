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

//! Document store trait

use crate::error::StoreResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored JSON document and its version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedDocument {
    /// Starts at 1 and increases by one on every write
    pub version: u64,
    pub doc: Value,
}

/// Key/document persistence boundary.
///
/// Implementations must make `put_if_version` atomic with respect to every
/// other write on the same key.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<VersionedDocument>>;

    /// Unconditional write, returns the new version
    async fn put(&self, key: &str, doc: Value) -> StoreResult<u64>;

    /// Compare-and-swap write.
    ///
    /// `expected = None` means the key must not exist yet. Fails with
    /// [`crate::StoreError::VersionConflict`] when the stored version differs.
    async fn put_if_version(&self, key: &str, doc: Value, expected: Option<u64>)
        -> StoreResult<u64>;

    /// All documents whose key starts with `prefix`, in key order
    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, VersionedDocument)>>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}
