//! Order-preserving batch accumulation.

use lakesync_queue::{MAX_BATCH_KEYS, WorkBatch};

/// Accumulates discovered keys and yields full batches as soon as the
/// cardinality limit is reached.
///
/// Keys come out in exactly the order they were pushed — listing order is
/// the contract, no client-side resort.
#[derive(Debug)]
pub struct Batcher {
    token: String,
    capacity: usize,
    pending: Vec<String>,
}

impl Batcher {
    /// Creates a batcher emitting batches of `capacity` keys, clamped to
    /// the wire limit of [`MAX_BATCH_KEYS`].
    #[must_use]
    pub fn new(token: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_BATCH_KEYS);
        Self {
            token: token.into(),
            capacity,
            pending: Vec::with_capacity(capacity),
        }
    }

    /// Adds one key; returns a full batch when the limit is reached.
    pub fn push(&mut self, key: String) -> Option<WorkBatch> {
        self.pending.push(key);
        if self.pending.len() < self.capacity {
            return None;
        }

        let object_keys = std::mem::replace(&mut self.pending, Vec::with_capacity(self.capacity));
        Some(WorkBatch {
            token: self.token.clone(),
            object_keys,
        })
    }

    /// Drains the final partial batch, if any keys remain.
    #[must_use]
    pub fn finish(self) -> Option<WorkBatch> {
        if self.pending.is_empty() {
            return None;
        }
        Some(WorkBatch {
            token: self.token,
            object_keys: self.pending,
        })
    }
}
