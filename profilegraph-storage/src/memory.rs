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

//! In-memory document store for development and tests

use crate::document::{DocumentStore, VersionedDocument};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    docs: RwLock<BTreeMap<String, VersionedDocument>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    /// Checked write, `expected = None` skips the version check
    fn write(
        &self,
        key: &str,
        doc: Value,
        expected: Option<Option<u64>>,
    ) -> StoreResult<VersionedDocument> {
        let mut docs = self.docs.write();
        let found = docs.get(key).map(|d| d.version);

        if let Some(expected) = expected {
            if found != expected {
                return Err(StoreError::VersionConflict {
                    key: key.to_string(),
                    expected,
                    found,
                });
            }
        }

        let stored = VersionedDocument {
            version: found.unwrap_or(0) + 1,
            doc,
        };
        docs.insert(key.to_string(), stored.clone());
        Ok(stored)
    }

    fn get_sync(&self, key: &str) -> Option<VersionedDocument> {
        self.docs.read().get(key).cloned()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<VersionedDocument>> {
        Ok(self.get_sync(key))
    }

    async fn put(&self, key: &str, doc: Value) -> StoreResult<u64> {
        self.write(key, doc, None).map(|d| d.version)
    }

    async fn put_if_version(
        &self,
        key: &str,
        doc: Value,
        expected: Option<u64>,
    ) -> StoreResult<u64> {
        self.write(key, doc, Some(expected)).map(|d| d.version)
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, VersionedDocument)>> {
        let docs = self.docs.read();
        Ok(docs
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
