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

//! Per-subject summary cache
//!
//! Summaries are read far more often than batches are applied. Entries are
//! tagged with the document version they were decoded from, and a read only
//! reuses an entry while the stored summary still has that version. Writes
//! from any process sharing the store are therefore seen on the next read.

use moka::sync::Cache;
use profilegraph_core::{SubjectId, Summary};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SummaryCacheConfig {
    /// Maximum number of cached subjects
    pub max_entries: u64,
    pub ttl: Duration,
}

impl Default for SummaryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SummaryCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub entry_count: u64,
}

#[derive(Clone)]
struct VersionedSummary {
    version: u64,
    summary: Arc<Summary>,
}

pub struct SummaryCache {
    cache: Cache<SubjectId, VersionedSummary>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SummaryCache {
    pub fn new(config: SummaryCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .build();

        Self {
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cached summary decoded from exactly `version`
    pub fn get(&self, subject_id: &str, version: u64) -> Option<Arc<Summary>> {
        match self.cache.get(subject_id) {
            Some(cached) if cached.version == version => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(cached.summary)
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, version: u64, summary: Summary) -> Arc<Summary> {
        let summary = Arc::new(summary);
        self.cache.insert(
            summary.subject_id.clone(),
            VersionedSummary {
                version,
                summary: summary.clone(),
            },
        );
        summary
    }

    pub fn stats(&self) -> SummaryCacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        SummaryCacheStats {
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            entry_count: self.cache.entry_count(),
        }
    }
}

impl Default for SummaryCache {
    fn default() -> Self {
        Self::new(SummaryCacheConfig::default())
    }
}
