//! Per-batch transfer orchestration.
//!
//! One invocation handles one work batch: translate each key, probe the
//! destination, copy what is missing, and report a per-key outcome. The
//! worker never raises for a single key — batches survive their worst
//! member, and the caller decides what to do with the outcome list.

use lakesync_keymap::{KeyPattern, Translation};

use crate::engine::copy_object;
use crate::store::{DestinationStore, SourceStore};

/// Outcome of processing one source key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Bytes were transferred to the destination.
    Copied {
        /// Parts uploaded.
        parts: u64,
        /// Bytes transferred.
        bytes: u64,
    },
    /// Key does not address a data object; nothing to do.
    SkippedMalformed,
    /// Destination already holds the object from a prior (possibly
    /// redelivered) attempt.
    SkippedExists,
    /// Copying this key failed; its siblings were still processed.
    Failed {
        /// What went wrong.
        reason: String,
    },
}

/// One key's outcome, tagged with the key for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyReport {
    /// The source key as received in the batch.
    pub source_key: String,
    /// What happened to it.
    pub outcome: KeyOutcome,
}

/// Counts plus per-key reports for one processed batch.
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Objects actually copied.
    pub copied: u64,
    /// Keys skipped because the destination already had the object.
    pub skipped_exists: u64,
    /// Keys skipped because they do not address a data object.
    pub skipped_malformed: u64,
    /// Keys that failed.
    pub failed: u64,
    /// Bytes transferred for the copied objects.
    pub bytes_copied: u64,
    /// Per-key outcomes in batch order.
    pub reports: Vec<KeyReport>,
}

impl BatchSummary {
    fn record(&mut self, source_key: &str, outcome: KeyOutcome) {
        match &outcome {
            KeyOutcome::Copied { bytes, .. } => {
                self.copied += 1;
                self.bytes_copied += bytes;
            }
            KeyOutcome::SkippedExists => self.skipped_exists += 1,
            KeyOutcome::SkippedMalformed => self.skipped_malformed += 1,
            KeyOutcome::Failed { reason } => {
                self.failed += 1;
                log::warn!("Failed to migrate '{source_key}': {reason}");
            }
        }
        self.reports.push(KeyReport {
            source_key: source_key.to_string(),
            outcome,
        });
    }
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} copied ({} bytes), {} already present, {} non-data, {} failed",
            self.copied, self.bytes_copied, self.skipped_exists, self.skipped_malformed, self.failed
        )
    }
}

/// Processes one batch of source keys, sequentially and in order.
///
/// Per key: translate, probe the destination (the idempotency guard that
/// makes redelivery safe), copy if absent. A key failure is recorded and
/// the loop moves on. `credentials_expiring` is consulted before each key;
/// once it reports `true` the remaining keys are failed fast instead of
/// issuing source-store calls a stale credential would reject anyway.
pub async fn process_batch(
    pattern: &KeyPattern,
    source: &dyn SourceStore,
    destination: &dyn DestinationStore,
    object_keys: &[String],
    part_size: u64,
    credentials_expiring: impl Fn() -> bool,
) -> BatchSummary {
    let mut summary = BatchSummary::default();

    for source_key in object_keys {
        if credentials_expiring() {
            summary.record(
                source_key,
                KeyOutcome::Failed {
                    reason: "credential window elapsed".to_string(),
                },
            );
            continue;
        }

        let destination_key = match pattern.translate(source_key) {
            Translation::Matched(destination_key) => destination_key,
            Translation::NotApplicable => {
                summary.record(source_key, KeyOutcome::SkippedMalformed);
                continue;
            }
            Translation::Invalid { reason } => {
                log::debug!("Skipping '{source_key}': {reason}");
                summary.record(source_key, KeyOutcome::SkippedMalformed);
                continue;
            }
        };

        match destination.exists(&destination_key).await {
            Ok(true) => summary.record(source_key, KeyOutcome::SkippedExists),
            Ok(false) => {
                match copy_object(source, destination, source_key, &destination_key, part_size)
                    .await
                {
                    Ok(report) => summary.record(
                        source_key,
                        KeyOutcome::Copied {
                            parts: report.parts,
                            bytes: report.bytes,
                        },
                    ),
                    Err(e) => summary.record(
                        source_key,
                        KeyOutcome::Failed {
                            reason: e.to_string(),
                        },
                    ),
                }
            }
            Err(e) => summary.record(
                source_key,
                KeyOutcome::Failed {
                    reason: e.to_string(),
                },
            ),
        }
    }

    log::info!("Batch complete: {summary}");
    summary
}
