//! In-memory storage backend.
//!
//! This is the reference implementation of `StorageBackend`: a sorted
//! `BTreeMap<ColumnKey, Bytes>` protected by a RwLock.
//!
//! ## Limitations
//!
//! - **Buffered writes**: `write()` only queues ops. Nothing is visible to
//!   readers until `flush()`, which applies the queue in order.
//! - **Tombstones shadow older cells**: applying a tombstone drops the cells
//!   its row already holds, but the marker itself stays until `compact()`.
//! - **No column-visibility filtering**: every cell is returned; filtering is
//!   the decoder's job.
//!
//! Use this backend for:
//! - Testing the decoder, encoder, mutations and queries
//! - Embedding in applications that don't need persistence

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{Cursor, Read};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use super::columns::{ColumnEntry, ColumnKey, ColumnOp};
use super::StorageBackend;
use crate::model::LargeValueStore;
use crate::{Error, Result};

// ============================================================================
// MemoryBackend
// ============================================================================

/// In-memory column store.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    table: RwLock<BTreeMap<ColumnKey, Bytes>>,
    pending: Mutex<Vec<ColumnOp>>,
    large_values: Arc<MemoryLargeValueStore>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                table: RwLock::new(BTreeMap::new()),
                pending: Mutex::new(Vec::new()),
                large_values: Arc::new(MemoryLargeValueStore::default()),
            }),
        }
    }

    /// Number of stored cells (flushed only).
    pub fn cell_count(&self) -> usize {
        self.inner.table.read().len()
    }

    /// Number of queued ops awaiting `flush`.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Physically drop every row that carries a tombstone.
    /// Returns the number of rows removed.
    pub fn compact(&self) -> usize {
        let mut table = self.inner.table.write();
        let dead: BTreeSet<String> = table
            .iter()
            .filter(|(key, value)| {
                ColumnEntry::new(
                    key.row.as_str(),
                    key.family.as_str(),
                    key.qualifier.as_str(),
                    key.visibility.as_str(),
                    (*value).clone(),
                )
                .is_tombstone()
            })
            .map(|(key, _)| key.row.clone())
            .collect();
        for row in &dead {
            table.retain(|key, _| key.row != *row);
        }
        if !dead.is_empty() {
            tracing::debug!(rows = dead.len(), "compacted tombstoned rows");
        }
        dead.len()
    }

    fn apply(&self, ops: Vec<ColumnOp>) {
        let mut table = self.inner.table.write();
        for op in ops {
            match op {
                ColumnOp::Put(entry) => {
                    if entry.is_tombstone() {
                        table.retain(|key, _| key.row != entry.row);
                    }
                    let value = entry.value.clone();
                    table.insert(entry.key(), value);
                }
                ColumnOp::Delete(key) => {
                    table.remove(&key);
                }
            }
        }
    }

    fn collect<'a>(iter: impl Iterator<Item = (&'a ColumnKey, &'a Bytes)>) -> Vec<ColumnEntry> {
        iter.map(|(key, value)| {
            ColumnEntry::new(
                key.row.as_str(),
                key.family.as_str(),
                key.qualifier.as_str(),
                key.visibility.as_str(),
                value.clone(),
            )
        })
        .collect()
    }

    fn row_start(row: &str) -> ColumnKey {
        ColumnKey {
            row: row.to_string(),
            family: String::new(),
            qualifier: String::new(),
            visibility: String::new(),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// StorageBackend impl
// ============================================================================

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn shutdown(&self) -> Result<()> {
        self.flush().await
    }

    async fn flush(&self) -> Result<()> {
        let ops = std::mem::take(&mut *self.inner.pending.lock());
        if !ops.is_empty() {
            tracing::trace!(ops = ops.len(), "flushing buffered writes");
            self.apply(ops);
        }
        Ok(())
    }

    async fn write(&self, ops: Vec<ColumnOp>) -> Result<()> {
        tracing::trace!(ops = ops.len(), "buffering writes");
        self.inner.pending.lock().extend(ops);
        Ok(())
    }

    async fn read_row(&self, row_key: &str) -> Result<Vec<ColumnEntry>> {
        let table = self.inner.table.read();
        let range = table.range((Bound::Included(Self::row_start(row_key)), Bound::Unbounded));
        Ok(Self::collect(range.take_while(|(key, _)| key.row == row_key)))
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<ColumnEntry>> {
        let table = self.inner.table.read();
        let range = table.range((Bound::Included(Self::row_start(prefix)), Bound::Unbounded));
        Ok(Self::collect(range.take_while(|(key, _)| key.row.starts_with(prefix))))
    }

    async fn delete_row(&self, row_key: &str) -> Result<bool> {
        let mut table = self.inner.table.write();
        let before = table.len();
        table.retain(|key, _| key.row != row_key);
        Ok(table.len() != before)
    }

    fn large_values(&self) -> Option<Arc<dyn LargeValueStore>> {
        Some(self.inner.large_values.clone())
    }
}

// ============================================================================
// MemoryLargeValueStore
// ============================================================================

/// Large-value store keeping payloads in a map. Readers are restartable.
#[derive(Default)]
pub struct MemoryLargeValueStore {
    blobs: RwLock<HashMap<String, Bytes>>,
    next_id: AtomicU64,
}

impl MemoryLargeValueStore {
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl LargeValueStore for MemoryLargeValueStore {
    fn put(&self, bytes: &[u8]) -> Result<String> {
        let locator = format!("mem-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        self.blobs.write().insert(locator.clone(), Bytes::copy_from_slice(bytes));
        Ok(locator)
    }

    fn open(&self, locator: &str) -> Result<Box<dyn Read + Send>> {
        let bytes = self
            .blobs
            .read()
            .get(locator)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("large value {locator}")))?;
        Ok(Box::new(Cursor::new(bytes)))
    }
}
