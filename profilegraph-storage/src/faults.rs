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

//! Fault injection wrapper
//!
//! Wraps any [`DocumentStore`] and simulates outages or lost CAS races so the
//! retry and idempotency paths can be exercised deterministically.

use crate::document::{DocumentStore, VersionedDocument};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

pub struct FaultInjectingStore {
    inner: Arc<dyn DocumentStore>,
    offline: AtomicBool,
    /// Writes allowed before going offline, negative when disarmed
    writes_until_outage: AtomicI64,
    pending_conflicts: AtomicU32,
    writes: AtomicU64,
}

impl FaultInjectingStore {
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner,
            offline: AtomicBool::new(false),
            writes_until_outage: AtomicI64::new(-1),
            pending_conflicts: AtomicU32::new(0),
            writes: AtomicU64::new(0),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
        if !offline {
            self.writes_until_outage.store(-1, Ordering::SeqCst);
        }
    }

    /// Let `n` more writes through, then fail every call until `set_offline(false)`
    pub fn fail_after_writes(&self, n: u64) {
        self.writes_until_outage.store(n as i64, Ordering::SeqCst);
    }

    /// Make the next `n` conditional writes lose their compare-and-swap
    pub fn inject_conflicts(&self, n: u32) {
        self.pending_conflicts.store(n, Ordering::SeqCst);
    }

    /// Successful writes so far
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected outage".to_string()));
        }
        Ok(())
    }

    fn admit_write(&self) -> StoreResult<()> {
        self.check_online()?;

        let remaining = self.writes_until_outage.load(Ordering::SeqCst);
        if remaining == 0 {
            self.offline.store(true, Ordering::SeqCst);
            return Err(StoreError::Unavailable("injected outage".to_string()));
        }
        if remaining > 0 {
            self.writes_until_outage.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn take_conflict(&self) -> bool {
        self.pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl DocumentStore for FaultInjectingStore {
    async fn get(&self, key: &str) -> StoreResult<Option<VersionedDocument>> {
        self.check_online()?;
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, doc: Value) -> StoreResult<u64> {
        self.admit_write()?;
        let version = self.inner.put(key, doc).await?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(version)
    }

    async fn put_if_version(
        &self,
        key: &str,
        doc: Value,
        expected: Option<u64>,
    ) -> StoreResult<u64> {
        self.admit_write()?;
        if self.take_conflict() {
            return Err(StoreError::VersionConflict {
                key: key.to_string(),
                expected,
                found: None,
            });
        }
        let version = self.inner.put_if_version(key, doc, expected).await?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(version)
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, VersionedDocument)>> {
        self.check_online()?;
        self.inner.scan_prefix(prefix).await
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
