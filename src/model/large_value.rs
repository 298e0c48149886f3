//! Large-value indirection.
//!
//! A property column may hold a locator instead of the payload. The decoder
//! binds each locator to the backend's [`LargeValueStore`]; the bytes are only
//! read when [`LargeValueRef::open`] is called.

use std::fmt;
use std::io::Read;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Upper bound on the buffer reserved before reading a payload.
const MAX_PREALLOCATION: usize = 1 << 20;

/// Backend storage for out-of-band property payloads.
pub trait LargeValueStore: Send + Sync {
    /// Store a payload and return its locator.
    fn put(&self, bytes: &[u8]) -> Result<String>;

    /// Open a fresh reader over the payload at `locator`.
    fn open(&self, locator: &str) -> Result<Box<dyn Read + Send>>;

    /// Whether `open` may be called repeatedly for the same locator.
    /// Stores backed by one-shot streams return false.
    fn is_restartable(&self) -> bool {
        true
    }
}

/// Locator plus (once decoded) a handle to the store that can read it.
#[derive(Clone, Serialize, Deserialize)]
pub struct LargeValueRef {
    locator: String,
    length: u64,
    #[serde(skip)]
    store: Option<Arc<dyn LargeValueStore>>,
}

impl LargeValueRef {
    /// An unbound reference, as produced by the codec.
    pub fn new(locator: impl Into<String>, length: u64) -> Self {
        Self {
            locator: locator.into(),
            length,
            store: None,
        }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn is_bound(&self) -> bool {
        self.store.is_some()
    }

    pub fn bind(mut self, store: Arc<dyn LargeValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn is_restartable(&self) -> bool {
        self.store.as_ref().is_some_and(|s| s.is_restartable())
    }

    pub fn open(&self) -> Result<Box<dyn Read + Send>> {
        match &self.store {
            Some(store) => store.open(&self.locator),
            None => Err(Error::StorageError(format!(
                "large value {} is not bound to a store",
                self.locator
            ))),
        }
    }

    pub fn read_to_vec(&self) -> Result<Vec<u8>> {
        // The stored length is untrusted; cap the up-front reservation.
        let reserve = usize::try_from(self.length).unwrap_or(usize::MAX).min(MAX_PREALLOCATION);
        let mut buf = Vec::with_capacity(reserve);
        self.open()?.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl PartialEq for LargeValueRef {
    fn eq(&self, other: &Self) -> bool {
        self.locator == other.locator && self.length == other.length
    }
}

impl fmt::Debug for LargeValueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LargeValueRef")
            .field("locator", &self.locator)
            .field("length", &self.length)
            .field("bound", &self.is_bound())
            .finish()
    }
}
