#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Work batch wire format and queue backends.
//!
//! The enumerator and the transfer worker never talk to each other
//! directly — batches of discovered keys travel through a queue with
//! at-least-once delivery. Everything here treats redelivery as normal:
//! a batch may be received more than once, and consumers rely on the
//! transfer worker's idempotency guard rather than exactly-once delivery.

pub mod memory;
pub mod sqs;

pub use memory::MemoryQueue;
pub use sqs::SqsQueue;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Hard cap on keys per queue message, chosen to keep the JSON body
/// safely under the queue's payload limit.
pub const MAX_BATCH_KEYS: usize = 200;

/// Errors that can occur during queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Sending a message failed.
    #[error("Failed to send work batch: {source}")]
    Send {
        /// Underlying backend error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Receiving messages failed.
    #[error("Failed to receive work batches: {source}")]
    Receive {
        /// Underlying backend error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Deleting a processed message failed.
    #[error("Failed to delete work batch: {source}")]
    Delete {
        /// Underlying backend error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Batch exceeds the wire cardinality cap.
    #[error("Work batch holds {keys} keys, limit is {MAX_BATCH_KEYS}")]
    OversizedBatch {
        /// Number of keys in the rejected batch.
        keys: usize,
    },

    /// Message body could not be serialized or deserialized.
    #[error("Work batch serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One unit of queue delivery: the bearer token needed to re-establish an
/// export session plus an ordered list of source keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkBatch {
    /// Opaque vendor API token, forwarded so the consuming worker can
    /// mint its own short-lived credentials.
    pub token: String,
    /// Source keys to migrate, in discovery order.
    pub object_keys: Vec<String>,
}

impl WorkBatch {
    /// Serializes the batch into its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Serialization`] if encoding fails.
    pub fn to_wire(&self) -> Result<String, QueueError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a batch from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Serialization`] if the body is not a valid
    /// batch message.
    pub fn from_wire(body: &str) -> Result<Self, QueueError> {
        Ok(serde_json::from_str(body)?)
    }
}

/// A received batch plus the handle needed to delete it after processing.
#[derive(Debug, Clone)]
pub struct QueuedBatch {
    /// The decoded batch.
    pub batch: WorkBatch,
    /// Backend-specific deletion handle for this delivery.
    pub receipt_handle: String,
}

/// A queue of work batches.
///
/// Implementations must tolerate concurrent senders and receivers and
/// provide at-least-once delivery: a received message stays redeliverable
/// until [`WorkQueue::delete`] is called with its receipt handle.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Enqueues one batch.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::OversizedBatch`] for batches over
    /// [`MAX_BATCH_KEYS`] keys, or a backend error.
    async fn send(&self, batch: &WorkBatch) -> Result<(), QueueError>;

    /// Receives up to `max_batches` batches.
    ///
    /// An empty result means the queue had nothing to deliver right now —
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the receive call itself fails.
    async fn receive(&self, max_batches: usize) -> Result<Vec<QueuedBatch>, QueueError>;

    /// Deletes a processed message so it is never redelivered.
    ///
    /// # Errors
    ///
    /// Returns a backend error if deletion fails; the message will then
    /// redeliver and the worker's idempotency guard absorbs the repeat.
    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError>;
}
