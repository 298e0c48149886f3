//! # Storage Backend Trait
//!
//! The contract between the graph and any column store. Backends move
//! [`ColumnEntry`] cells; they never interpret visibility or property
//! layout. That is the job of the [`decoder`] and [`encoder`].
//!
//! The one rule a backend must honor: a tombstone shadows every cell of its
//! row written before it, never cells written after it. Deleting the marker
//! makes the row writable again.
//!
//! ## Implementations
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryBackend` | `memory` | In-memory sorted table for testing/embedding |

pub mod codec;
pub mod columns;
pub mod decoder;
pub mod encoder;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::model::LargeValueStore;
use crate::Result;

pub use codec::{JsonValueCodec, ValueCodec};
pub use columns::{ColumnEntry, ColumnKey, ColumnOp};
pub use decoder::{group_rows, EdgeKind, ElementKind, RowDecoder, RowGroups, VertexKind};
pub use encoder::{ElementEncoder, StoredElement, DEFAULT_LARGE_VALUE_THRESHOLD};
pub use memory::{MemoryBackend, MemoryLargeValueStore};

// ============================================================================
// StorageBackend Trait
// ============================================================================

/// The universal storage contract.
///
/// Reads return cells sorted by [`ColumnKey`], so the cells of one row are
/// contiguous. Writes may be buffered until [`flush`](Self::flush).
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Shut down the backend, flushing any pending writes.
    async fn shutdown(&self) -> Result<()>;

    /// Make every buffered write visible to readers.
    async fn flush(&self) -> Result<()>;

    // ========================================================================
    // Cells
    // ========================================================================

    /// Apply a batch of puts and deletes in order. A tombstone put shadows
    /// the cells its row already holds.
    async fn write(&self, ops: Vec<ColumnOp>) -> Result<()>;

    /// All cells of one row. Empty if the row does not exist.
    async fn read_row(&self, row_key: &str) -> Result<Vec<ColumnEntry>>;

    /// All cells of several rows, in row-key order.
    ///
    /// Default: one `read_row` per key.
    async fn read_rows(&self, row_keys: &[String]) -> Result<Vec<ColumnEntry>> {
        let mut keys: Vec<&String> = row_keys.iter().collect();
        keys.sort();
        keys.dedup();
        let mut out = Vec::new();
        for key in keys {
            out.extend(self.read_row(key).await?);
        }
        Ok(out)
    }

    /// All cells of every row whose key starts with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<ColumnEntry>>;

    /// Physically remove a row. Returns true if it existed.
    async fn delete_row(&self, row_key: &str) -> Result<bool>;

    // ========================================================================
    // Large values
    // ========================================================================

    /// Store for out-of-band property payloads, if this backend has one.
    fn large_values(&self) -> Option<Arc<dyn LargeValueStore>> {
        None
    }
}
