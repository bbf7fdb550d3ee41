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

//! File-backed document store
//!
//! Each document lives in its own JSON file. Key segments become directories,
//! so a prefix scan only walks the matching subtree:
//!
//! ```text
//! subjects/child-1/entities/topic_dinosaurs  ->  <root>/subjects/child-1/entities/topic_dinosaurs.json
//! subjects/Child 1/summary                    ->  <root>/subjects/~4368696c642031/summary.json
//! ```
//!
//! Nothing is cached in memory. Every read goes to disk, so several processes
//! can share one data directory. A write takes the document's lock file,
//! re-reads the stored version, then writes a temporary file and renames it
//! into place.

use crate::document::{DocumentStore, VersionedDocument};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, warn};

/// A lock file older than this was left behind by a crashed writer
const STALE_LOCK_AGE: Duration = Duration::from_secs(30);

/// How long a writer waits for a document lock
const LOCK_WAIT: Duration = Duration::from_secs(10);

const LOCK_POLL: Duration = Duration::from_millis(2);

/// On-disk record
#[derive(Debug, Serialize, Deserialize)]
struct DocumentFile {
    key: String,
    version: u64,
    doc: Value,
}

/// Path component for one key segment.
///
/// Plain segments are kept readable; anything else is hex encoded behind a
/// `~`, which plain segments never contain.
fn encode_segment(segment: &str) -> String {
    let plain = !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-');
    if plain {
        segment.to_string()
    } else {
        format!("~{}", hex::encode(segment.as_bytes()))
    }
}

fn unavailable(e: std::io::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

/// Held lock file of one document, removed on drop
struct DocumentLock {
    path: PathBuf,
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(lock = %self.path.display(), error = %e, "Failed to release document lock");
        }
    }
}

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Open (or create) a store rooted at `path`
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&path).await?;
        debug!(path = %path.display(), "Opened file store");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir_for<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> PathBuf {
        let mut dir = self.path.clone();
        for segment in segments {
            dir.push(encode_segment(segment));
        }
        dir
    }

    fn file_for(&self, key: &str) -> PathBuf {
        let (mut path, name) = match key.rsplit_once('/') {
            Some((parent, name)) => (self.dir_for(parent.split('/')), name),
            None => (self.path.clone(), key),
        };
        path.push(format!("{}.json", encode_segment(name)));
        path
    }

    async fn read_file(path: &Path) -> StoreResult<Option<DocumentFile>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn is_stale(lock_path: &Path) -> bool {
        match tokio::fs::metadata(lock_path).await.and_then(|m| m.modified()) {
            Ok(modified) => SystemTime::now()
                .duration_since(modified)
                .map(|age| age > STALE_LOCK_AGE)
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Take the lock file next to `file`, waiting for other writers
    async fn lock(&self, file: &Path) -> StoreResult<DocumentLock> {
        let lock_path = file.with_extension("lock");
        if let Some(parent) = lock_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(unavailable)?;
        }

        let started = Instant::now();
        loop {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
                .await
            {
                Ok(_) => return Ok(DocumentLock { path: lock_path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if Self::is_stale(&lock_path).await {
                        warn!(lock = %lock_path.display(), "Removing stale document lock");
                        if let Err(e) = tokio::fs::remove_file(&lock_path).await {
                            debug!(lock = %lock_path.display(), error = %e, "Stale lock already gone");
                        }
                        continue;
                    }
                    if started.elapsed() >= LOCK_WAIT {
                        return Err(StoreError::Unavailable(format!(
                            "Timed out waiting for {}",
                            lock_path.display()
                        )));
                    }
                    tokio::time::sleep(LOCK_POLL).await;
                }
                Err(e) => return Err(unavailable(e)),
            }
        }
    }

    async fn write(&self, key: &str, doc: Value, expected: Option<Option<u64>>) -> StoreResult<u64> {
        let file_path = self.file_for(key);
        let _lock = self.lock(&file_path).await?;

        let found = Self::read_file(&file_path).await?.map(|f| f.version);
        if let Some(expected) = expected {
            if found != expected {
                return Err(StoreError::VersionConflict {
                    key: key.to_string(),
                    expected,
                    found,
                });
            }
        }

        let record = DocumentFile {
            key: key.to_string(),
            version: found.unwrap_or(0) + 1,
            doc,
        };
        let content = serde_json::to_vec_pretty(&record)?;

        let temp_path = file_path.with_extension("tmp");
        tokio::fs::write(&temp_path, content).await.map_err(unavailable)?;
        tokio::fs::rename(&temp_path, &file_path).await.map_err(unavailable)?;

        Ok(record.version)
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<VersionedDocument>> {
        Ok(Self::read_file(&self.file_for(key)).await?.map(|file| VersionedDocument {
            version: file.version,
            doc: file.doc,
        }))
    }

    async fn put(&self, key: &str, doc: Value) -> StoreResult<u64> {
        self.write(key, doc, None).await
    }

    async fn put_if_version(
        &self,
        key: &str,
        doc: Value,
        expected: Option<u64>,
    ) -> StoreResult<u64> {
        self.write(key, doc, Some(expected)).await
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, VersionedDocument)>> {
        let root = match prefix.rsplit_once('/') {
            Some((parent, _)) => self.dir_for(parent.split('/')),
            None => self.path.clone(),
        };

        let mut found = Vec::new();
        let mut pending = vec![root];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(unavailable(e)),
            };

            while let Some(entry) = entries.next_entry().await.map_err(unavailable)? {
                let path = entry.path();
                if entry.file_type().await.map_err(unavailable)?.is_dir() {
                    pending.push(path);
                    continue;
                }
                if path.extension().map(|e| e != "json").unwrap_or(true) {
                    continue;
                }

                match Self::read_file(&path).await {
                    Ok(Some(file)) if file.key.starts_with(prefix) => found.push((
                        file.key,
                        VersionedDocument {
                            version: file.version,
                            doc: file.doc,
                        },
                    )),
                    Ok(_) => {}
                    Err(StoreError::Serialization(e)) => {
                        warn!(file = %path.display(), error = %e, "Skipping unreadable document");
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::{Outcome, TypedStore};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_documents_survive_reopen() {
        let dir = tempdir().unwrap();

        {
            let store = FileStore::open(dir.path()).await.unwrap();
            store.put("subjects/s/entities/topic_a", json!({"name": "A"})).await.unwrap();
            store
                .put_if_version("subjects/s/entities/topic_a", json!({"name": "A2"}), Some(1))
                .await
                .unwrap();
        }

        let store = FileStore::open(dir.path()).await.unwrap();
        let doc = store.get("subjects/s/entities/topic_a").await.unwrap().unwrap();
        assert_eq!(doc.version, 2);
        assert_eq!(doc.doc["name"], "A2");

        let scanned = store.scan_prefix("subjects/s/").await.unwrap();
        assert_eq!(scanned.len(), 1);
    }

    #[tokio::test]
    async fn test_conflict_does_not_touch_disk() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.put("k", json!(1)).await.unwrap();

        assert!(store.put_if_version("k", json!(2), Some(7)).await.is_err());

        let reopened = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.get("k").await.unwrap().unwrap().doc, json!(1));
    }

    #[tokio::test]
    async fn test_two_handles_see_each_others_writes() {
        let dir = tempdir().unwrap();
        let a = FileStore::open(dir.path()).await.unwrap();
        let b = FileStore::open(dir.path()).await.unwrap();
        let key = "subjects/s/entities/topic_a";

        a.put(key, json!(1)).await.unwrap();
        assert_eq!(b.get(key).await.unwrap().unwrap().version, 1);

        b.put_if_version(key, json!(2), Some(1)).await.unwrap();
        let err = a.put_if_version(key, json!(3), Some(1)).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict {
                found: Some(2),
                ..
            }
        ));
        assert_eq!(a.get(key).await.unwrap().unwrap().doc, json!(2));
        assert_eq!(a.scan_prefix("subjects/s/").await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_increments_from_two_handles_are_not_lost() {
        let dir = tempdir().unwrap();
        let a = TypedStore::new(Arc::new(FileStore::open(dir.path()).await.unwrap()), 50);
        let b = TypedStore::new(Arc::new(FileStore::open(dir.path()).await.unwrap()), 50);

        let bump = |store: TypedStore| async move {
            for _ in 0..10 {
                store
                    .transact("counters/shared", |current: Option<u64>| {
                        let next = current.unwrap_or(0) + 1;
                        Ok(Outcome::Commit(next, next))
                    })
                    .await
                    .unwrap();
            }
        };
        let (first, second) = tokio::join!(tokio::spawn(bump(a)), tokio::spawn(bump(b)));
        first.unwrap();
        second.unwrap();

        let reader = FileStore::open(dir.path()).await.unwrap();
        let doc = reader.get("counters/shared").await.unwrap().unwrap();
        assert_eq!(doc.doc, json!(20));
        assert_eq!(doc.version, 20);
    }

    #[tokio::test]
    async fn test_unusual_key_segments() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let key = "subjects/Child 1/edges/learning_pathway:skill_a:skill_b";

        store.put(key, json!("edge")).await.unwrap();
        assert_eq!(store.get(key).await.unwrap().unwrap().doc, json!("edge"));

        let found = store.scan_prefix("subjects/Child 1/").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, key);
        assert!(store.scan_prefix("subjects/Child/").await.unwrap().is_empty());
        assert_eq!(encode_segment("topic_a"), "topic_a");
        assert!(encode_segment("..").starts_with('~'));
    }
}
