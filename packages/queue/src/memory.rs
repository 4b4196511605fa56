//! In-process work queue.
//!
//! Backs the one-shot `run` mode, where enumeration and transfer execute
//! in the same process and a network queue would be overhead. Also the
//! queue used in tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::{MAX_BATCH_KEYS, QueueError, QueuedBatch, WorkBatch, WorkQueue};

/// FIFO queue held in process memory.
///
/// Delivery is effectively exactly-once (no visibility timeout, no
/// redelivery), which is strictly easier than what consumers are written
/// to tolerate.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    batches: Mutex<VecDeque<WorkBatch>>,
    receipt_counter: AtomicU64,
}

impl MemoryQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches currently enqueued.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batches.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl WorkQueue for MemoryQueue {
    async fn send(&self, batch: &WorkBatch) -> Result<(), QueueError> {
        if batch.object_keys.len() > MAX_BATCH_KEYS {
            return Err(QueueError::OversizedBatch {
                keys: batch.object_keys.len(),
            });
        }

        self.batches
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(batch.clone());
        Ok(())
    }

    async fn receive(&self, max_batches: usize) -> Result<Vec<QueuedBatch>, QueueError> {
        let mut queue = self
            .batches
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let take = max_batches.min(queue.len());
        let batches = queue
            .drain(..take)
            .map(|batch| QueuedBatch {
                batch,
                receipt_handle: format!(
                    "memory-{}",
                    self.receipt_counter.fetch_add(1, Ordering::Relaxed)
                ),
            })
            .collect();

        Ok(batches)
    }

    async fn delete(&self, _receipt_handle: &str) -> Result<(), QueueError> {
        // Receives already removed the batch; deletion is a no-op.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(keys: &[&str]) -> WorkBatch {
        WorkBatch {
            token: "t".to_string(),
            object_keys: keys.iter().map(ToString::to_string).collect(),
        }
    }

    #[tokio::test]
    async fn delivers_in_fifo_order() {
        let queue = MemoryQueue::new();
        queue.send(&batch(&["a"])).await.unwrap();
        queue.send(&batch(&["b"])).await.unwrap();

        let received = queue.receive(10).await.unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].batch.object_keys, vec!["a"]);
        assert_eq!(received[1].batch.object_keys, vec!["b"]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn receive_respects_max_batches() {
        let queue = MemoryQueue::new();
        for _ in 0..3 {
            queue.send(&batch(&["k"])).await.unwrap();
        }

        let first = queue.receive(2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn rejects_oversized_batches() {
        let queue = MemoryQueue::new();
        let keys: Vec<String> = (0..=MAX_BATCH_KEYS).map(|i| format!("k{i}")).collect();
        let oversized = WorkBatch {
            token: "t".to_string(),
            object_keys: keys,
        };

        let err = queue.send(&oversized).await.unwrap_err();
        assert!(matches!(err, QueueError::OversizedBatch { keys } if keys == MAX_BATCH_KEYS + 1));
    }

    #[tokio::test]
    async fn empty_receive_is_not_an_error() {
        let queue = MemoryQueue::new();
        assert!(queue.receive(5).await.unwrap().is_empty());
    }
}
