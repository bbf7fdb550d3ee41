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

//! Typed access and optimistic transactions

use crate::document::DocumentStore;
use crate::error::StoreError;
use profilegraph_core::{GraphError, GraphResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// What a transaction mutator decided
#[derive(Debug)]
pub enum Outcome<T, R> {
    /// Write `T` (if the version still matches) and return `R`
    Commit(T, R),
    /// Leave the document as is and return `R`
    Abort(R),
}

/// Serde layer over a [`DocumentStore`]
#[derive(Clone)]
pub struct TypedStore {
    store: Arc<dyn DocumentStore>,
    max_attempts: u32,
}

impl TypedStore {
    pub fn new(store: Arc<dyn DocumentStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn raw(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> GraphResult<Option<T>> {
        match self.store.get(key).await? {
            Some(versioned) => Ok(Some(serde_json::from_value(versioned.doc)?)),
            None => Ok(None),
        }
    }

    pub async fn put<T: Serialize>(&self, key: &str, value: &T) -> GraphResult<()> {
        let doc = serde_json::to_value(value)?;
        self.store.put(key, doc).await?;
        Ok(())
    }

    /// Write only if the key does not exist yet.
    ///
    /// Returns `false` when a document was already present.
    pub async fn create<T: Serialize>(&self, key: &str, value: &T) -> GraphResult<bool> {
        let doc = serde_json::to_value(value)?;
        match self.store.put_if_version(key, doc, None).await {
            Ok(_) => Ok(true),
            Err(StoreError::VersionConflict { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Read-modify-write with compare-and-swap and bounded retries.
    ///
    /// The mutator may run more than once; it must be a pure function of the
    /// document it is given.
    pub async fn transact<T, R, F>(&self, key: &str, mut mutate: F) -> GraphResult<R>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(Option<T>) -> GraphResult<Outcome<T, R>>,
    {
        for attempt in 1..=self.max_attempts {
            let current = self.store.get(key).await?;
            let expected = current.as_ref().map(|d| d.version);
            let value = match current {
                Some(versioned) => Some(serde_json::from_value::<T>(versioned.doc)?),
                None => None,
            };

            let (next, result) = match mutate(value)? {
                Outcome::Commit(next, result) => (next, result),
                Outcome::Abort(result) => return Ok(result),
            };

            let doc = serde_json::to_value(&next)?;
            match self.store.put_if_version(key, doc, expected).await {
                Ok(_) => return Ok(result),
                Err(StoreError::VersionConflict { .. }) => {
                    debug!(key, attempt, "Version conflict, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(GraphError::ConcurrencyConflict {
            key: key.to_string(),
            attempts: self.max_attempts,
        })
    }

    /// All documents under a prefix, in key order
    pub async fn scan<T: DeserializeOwned>(&self, prefix: &str) -> GraphResult<Vec<T>> {
        self.query(prefix, |_: &T| true).await
    }

    /// Documents under a prefix that match `predicate`
    pub async fn query<T, P>(&self, prefix: &str, predicate: P) -> GraphResult<Vec<T>>
    where
        T: DeserializeOwned,
        P: Fn(&T) -> bool,
    {
        let docs = self.store.scan_prefix(prefix).await?;
        let mut out = Vec::with_capacity(docs.len());
        for (_, versioned) in docs {
            let value: T = serde_json::from_value(versioned.doc)?;
            if predicate(&value) {
                out.push(value);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faults::FaultInjectingStore;
    use crate::memory::InMemoryStore;

    #[tokio::test]
    async fn test_transact_creates_and_updates() {
        let typed = TypedStore::new(Arc::new(InMemoryStore::new()), 3);

        let n: u32 = typed
            .transact("counter", |current: Option<u32>| {
                let next = current.unwrap_or(0) + 1;
                Ok(Outcome::Commit(next, next))
            })
            .await
            .unwrap();
        assert_eq!(n, 1);

        let n: u32 = typed
            .transact("counter", |current: Option<u32>| {
                let next = current.unwrap_or(0) + 1;
                Ok(Outcome::Commit(next, next))
            })
            .await
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(typed.get::<u32>("counter").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_transact_retries_then_gives_up() {
        let faults = Arc::new(FaultInjectingStore::new(Arc::new(InMemoryStore::new())));
        let typed = TypedStore::new(faults.clone(), 3);

        faults.inject_conflicts(2);
        let mut calls = 0;
        typed
            .transact("k", |_: Option<u32>| {
                calls += 1;
                Ok(Outcome::Commit(1u32, ()))
            })
            .await
            .unwrap();
        assert_eq!(calls, 3);

        faults.inject_conflicts(3);
        let err = typed
            .transact("k", |_: Option<u32>| Ok(Outcome::Commit(2u32, ())))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::ConcurrencyConflict { attempts: 3, .. }
        ));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_abort_does_not_write() {
        let faults = Arc::new(FaultInjectingStore::new(Arc::new(InMemoryStore::new())));
        let typed = TypedStore::new(faults.clone(), 3);
        let out = typed
            .transact("k", |_: Option<u32>| Ok(Outcome::<u32, _>::Abort("skipped")))
            .await
            .unwrap();
        assert_eq!(out, "skipped");
        assert_eq!(faults.write_count(), 0);
    }

    #[tokio::test]
    async fn test_create_is_exclusive() {
        let typed = TypedStore::new(Arc::new(InMemoryStore::new()), 3);
        assert!(typed.create("obs", &"first").await.unwrap());
        assert!(!typed.create("obs", &"second").await.unwrap());
        assert_eq!(typed.get::<String>("obs").await.unwrap().as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_outage_maps_to_store_unavailable() {
        let faults = Arc::new(FaultInjectingStore::new(Arc::new(InMemoryStore::new())));
        let typed = TypedStore::new(faults.clone(), 3);
        faults.set_offline(true);
        let err = typed.get::<u32>("k").await.unwrap_err();
        assert!(matches!(err, GraphError::StoreUnavailable(_)));
    }
}
