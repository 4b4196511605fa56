//! SQS-backed work queue.

use async_trait::async_trait;

use crate::{MAX_BATCH_KEYS, QueueError, QueuedBatch, WorkBatch, WorkQueue};

/// SQS caps one `ReceiveMessage` call at ten messages.
const SQS_RECEIVE_CAP: usize = 10;

/// Long-poll duration for receives. Cuts empty responses without delaying
/// delivery of new messages.
const WAIT_TIME_SECONDS: i32 = 20;

/// Work queue backed by an SQS queue.
///
/// Redelivery is governed by the queue's visibility timeout: a received
/// batch that is never deleted becomes visible again and is re-processed,
/// which the transfer worker's idempotency guard makes safe.
#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsQueue {
    /// Wraps an SQS client and queue URL.
    #[must_use]
    pub const fn new(client: aws_sdk_sqs::Client, queue_url: String) -> Self {
        Self { client, queue_url }
    }
}

#[async_trait]
impl WorkQueue for SqsQueue {
    async fn send(&self, batch: &WorkBatch) -> Result<(), QueueError> {
        if batch.object_keys.len() > MAX_BATCH_KEYS {
            return Err(QueueError::OversizedBatch {
                keys: batch.object_keys.len(),
            });
        }

        let body = batch.to_wire()?;

        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| QueueError::Send {
                source: Box::new(e),
            })?;

        log::debug!(
            "Sent work batch of {} keys to {}",
            batch.object_keys.len(),
            self.queue_url
        );
        Ok(())
    }

    async fn receive(&self, max_batches: usize) -> Result<Vec<QueuedBatch>, QueueError> {
        let max = max_batches.clamp(1, SQS_RECEIVE_CAP);

        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(i32::try_from(max).unwrap_or(1))
            .wait_time_seconds(WAIT_TIME_SECONDS)
            .send()
            .await
            .map_err(|e| QueueError::Receive {
                source: Box::new(e),
            })?;

        let mut batches = Vec::new();
        for message in output.messages() {
            let (Some(body), Some(receipt_handle)) = (message.body(), message.receipt_handle())
            else {
                continue;
            };

            // A body that does not parse will redeliver until the queue's
            // dead-letter policy routes it away; skipping keeps one poison
            // message from blocking the rest of the receive.
            match WorkBatch::from_wire(body) {
                Ok(batch) => batches.push(QueuedBatch {
                    batch,
                    receipt_handle: receipt_handle.to_string(),
                }),
                Err(e) => {
                    log::warn!("Skipping undecodable queue message: {e}");
                }
            }
        }

        Ok(batches)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Delete {
                source: Box::new(e),
            })?;

        Ok(())
    }
}
