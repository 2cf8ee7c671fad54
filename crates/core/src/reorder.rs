//! Bounded reorder buffer
//!
//! Holds ranges that completed ahead of the delivery cursor. Entries are
//! released as soon as the cursor reaches them, so the buffer never keeps
//! bytes that were already handed to the sink.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::error::{Error, Result};

/// Completed-but-undelivered ranges keyed by range index
#[derive(Debug)]
pub struct ReorderBuffer {
    capacity: usize,
    next: u32,
    pending: BTreeMap<u32, Bytes>,
}

impl ReorderBuffer {
    /// Create a buffer holding at most `capacity` ranges
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Store a completed range
    ///
    /// Rejects indices already delivered, duplicates, and inserts beyond
    /// capacity; all three mean the scheduler broke its window.
    pub fn insert(&mut self, index: u32, data: Bytes) -> Result<()> {
        if index < self.next || self.pending.contains_key(&index) {
            return Err(Error::Internal(format!(
                "range {index} completed twice (delivery cursor at {})",
                self.next
            )));
        }
        if self.pending.len() >= self.capacity {
            return Err(Error::Internal(format!(
                "reorder buffer full ({} ranges) on range {index}",
                self.capacity
            )));
        }
        self.pending.insert(index, data);
        Ok(())
    }

    /// Take the range at the delivery cursor, advancing it
    pub fn pop_ready(&mut self) -> Option<Bytes> {
        let data = self.pending.remove(&self.next)?;
        self.next += 1;
        Some(data)
    }

    /// Number of buffered ranges
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
