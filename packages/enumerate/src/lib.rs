#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Source object discovery.
//!
//! Walks the export bucket prefix by prefix, pages through listings, drops
//! marker objects, and ships surviving keys to the work queue in bounded
//! batches. Object counts are unbounded, so nothing here holds more than
//! one batch of keys in memory at a time.

pub mod batch;

pub use batch::Batcher;

use lakesync_queue::{QueueError, WorkQueue};

/// Marker objects written next to the data files; they carry no data and
/// are never migrated.
const SENTINEL_SUFFIX: &str = "_SUCCESS";

/// Errors that can occur during enumeration.
#[derive(Debug, thiserror::Error)]
pub enum EnumerateError {
    /// Listing a prefix failed. Aborts that prefix; the caller retries at
    /// prefix granularity.
    #[error("Failed to list s3://{bucket}/{prefix}: {source}")]
    List {
        /// Bucket name.
        bucket: String,
        /// Key prefix being listed.
        prefix: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Sending a batch to the work queue failed.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Counters for one enumeration run.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnumerationSummary {
    /// Data keys discovered (markers excluded).
    pub keys_discovered: u64,
    /// Batches sent to the work queue.
    pub batches_sent: u64,
}

/// Whether a key is a non-data marker object.
fn is_sentinel(key: &str) -> bool {
    key.ends_with(SENTINEL_SUFFIX)
}

/// Enumerates every prefix in order and sends discovered keys to the work
/// queue in batches of `batch_size`.
///
/// Batches may span prefixes: keys accumulate across prefix boundaries and
/// the final partial batch is flushed once after the last prefix. Pages
/// that report no matches are skipped silently.
///
/// # Errors
///
/// Returns [`EnumerateError::List`] when a listing call fails (nothing is
/// swallowed — the caller decides whether to re-run) and
/// [`EnumerateError::Queue`] when a batch cannot be sent.
pub async fn enumerate_into_queue(
    s3: &aws_sdk_s3::Client,
    source_bucket: &str,
    queue: &dyn WorkQueue,
    token: &str,
    prefixes: &[String],
    page_size: i32,
    batch_size: usize,
) -> Result<EnumerationSummary, EnumerateError> {
    let mut summary = EnumerationSummary::default();
    let mut batcher = Batcher::new(token, batch_size);

    for prefix in prefixes {
        log::info!("Listing s3://{source_bucket}/{prefix}");
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = s3
                .list_objects_v2()
                .bucket(source_bucket)
                .prefix(prefix)
                .max_keys(page_size);

            if let Some(continuation) = &continuation_token {
                request = request.continuation_token(continuation);
            }

            let output = request.send().await.map_err(|e| EnumerateError::List {
                bucket: source_bucket.to_string(),
                prefix: prefix.clone(),
                source: Box::new(e),
            })?;

            for object in output.contents() {
                let Some(key) = object.key() else {
                    continue;
                };
                if is_sentinel(key) {
                    continue;
                }

                summary.keys_discovered += 1;
                if let Some(full) = batcher.push(key.to_string()) {
                    queue.send(&full).await?;
                    summary.batches_sent += 1;
                }
            }

            if output.is_truncated() == Some(true) {
                continuation_token = output.next_continuation_token().map(String::from);
            } else {
                break;
            }
        }
    }

    if let Some(partial) = batcher.finish() {
        queue.send(&partial).await?;
        summary.batches_sent += 1;
    }

    log::info!(
        "Enumerated {} keys into {} batches",
        summary.keys_discovered,
        summary.batches_sent
    );
    Ok(summary)
}
