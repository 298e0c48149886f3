//! Element id generation.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::ElementId;

pub trait IdGenerator: Send + Sync + 'static {
    fn next_id(&self) -> ElementId;
}

/// `prefix` followed by a process-local counter starting at 1.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new("")
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> ElementId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        ElementId(format!("{}{n}", self.prefix))
    }
}
