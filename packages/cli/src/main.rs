#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the vendor export migration tool.
//!
//! `enumerate` discovers source objects and enqueues work batches;
//! `work` drains the queue and copies objects; `run` does both in one
//! process without queue infrastructure; `translate` prints the
//! destination key for a single source key.

mod config;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use futures::stream::{self, StreamExt as _};
use lakesync_auth::ExportSession;
use lakesync_enumerate::enumerate_into_queue;
use lakesync_keymap::{DateRange, KeyPattern, Translation, enumeration_prefixes};
use lakesync_queue::{MemoryQueue, QueuedBatch, SqsQueue, WorkQueue};
use lakesync_transfer::{BatchSummary, S3DestinationStore, S3SourceStore, process_batch};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "lakesync", about = "Vendor export to destination lake migration tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover source objects and enqueue work batches
    Enumerate {
        /// First day to enumerate (YYYY-MM-DD, inclusive)
        #[arg(long)]
        start: Option<String>,
        /// Last day to enumerate (YYYY-MM-DD, inclusive)
        #[arg(long)]
        end: Option<String>,
    },
    /// Drain the work queue, copying each batch's objects
    Work {
        /// Stop after processing this many batches
        #[arg(long)]
        max_batches: Option<u64>,
    },
    /// Enumerate and copy in one process, without queue infrastructure
    Run {
        /// First day to migrate (YYYY-MM-DD, inclusive)
        #[arg(long)]
        start: Option<String>,
        /// Last day to migrate (YYYY-MM-DD, inclusive)
        #[arg(long)]
        end: Option<String>,
    },
    /// Print the destination key for a source key
    Translate {
        /// Source key to translate
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Enumerate { start, end } => cmd_enumerate(start, end).await,
        Commands::Work { max_batches } => cmd_work(max_batches).await,
        Commands::Run { start, end } => cmd_run(start, end).await,
        Commands::Translate { key } => cmd_translate(&key),
    }
}

/// Aggregated counters across every batch one invocation processed.
#[derive(Debug, Default, Clone, Copy)]
struct RunTotals {
    batches: u64,
    copied: u64,
    skipped_exists: u64,
    skipped_malformed: u64,
    failed: u64,
    bytes_copied: u64,
}

impl RunTotals {
    fn absorb(&mut self, summary: &BatchSummary) {
        self.batches += 1;
        self.copied += summary.copied;
        self.skipped_exists += summary.skipped_exists;
        self.skipped_malformed += summary.skipped_malformed;
        self.failed += summary.failed;
        self.bytes_copied += summary.bytes_copied;
    }
}

impl std::fmt::Display for RunTotals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} batches: {} copied ({} bytes), {} already present, {} non-data, {} failed",
            self.batches,
            self.copied,
            self.bytes_copied,
            self.skipped_exists,
            self.skipped_malformed,
            self.failed
        )
    }
}

async fn cmd_enumerate(
    start: Option<String>,
    end: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let token = config.require_token()?.to_string();
    let queue_url = config.require_queue_url()?.to_string();
    let range = parse_date_range(start.as_deref(), end.as_deref())?;

    let http = reqwest::Client::new();
    let session = ExportSession::establish(&http, &config.credentials_url, &token).await?;
    log::info!("Enumerating export for account {}", session.account_id());

    let prefixes = enumeration_prefixes(session.account_id(), &config.table_families, range.as_ref());

    let aws = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .load()
        .await;
    let queue = SqsQueue::new(aws_sdk_sqs::Client::new(&aws), queue_url);

    let summary = enumerate_into_queue(
        session.s3(),
        &config.source_bucket,
        &queue,
        &token,
        &prefixes,
        config.page_size,
        config.batch_size,
    )
    .await?;

    log::info!(
        "Done: {} keys across {} prefixes -> {} batches",
        summary.keys_discovered,
        prefixes.len(),
        summary.batches_sent
    );
    Ok(())
}

async fn cmd_work(max_batches: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let queue_url = config.require_queue_url()?.to_string();

    let aws = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .load()
        .await;
    let queue = SqsQueue::new(aws_sdk_sqs::Client::new(&aws), queue_url);
    let destination_client = aws_sdk_s3::Client::new(&aws);

    let totals = drain_queue(&queue, &config, &destination_client, max_batches).await?;
    log::info!("Work complete: {totals}");
    Ok(())
}

async fn cmd_run(
    start: Option<String>,
    end: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let token = config.require_token()?.to_string();
    let range = parse_date_range(start.as_deref(), end.as_deref())?;

    let http = reqwest::Client::new();
    let session = ExportSession::establish(&http, &config.credentials_url, &token).await?;
    log::info!("Migrating export for account {}", session.account_id());

    let prefixes = enumeration_prefixes(session.account_id(), &config.table_families, range.as_ref());
    let queue = MemoryQueue::new();

    let summary = enumerate_into_queue(
        session.s3(),
        &config.source_bucket,
        &queue,
        &token,
        &prefixes,
        config.page_size,
        config.batch_size,
    )
    .await?;
    log::info!(
        "Discovered {} keys in {} batches; copying...",
        summary.keys_discovered,
        summary.batches_sent
    );

    let aws = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .load()
        .await;
    let destination_client = aws_sdk_s3::Client::new(&aws);

    let totals = drain_queue(&queue, &config, &destination_client, None).await?;
    log::info!("Migration complete: {totals}");
    Ok(())
}

fn cmd_translate(key: &str) -> Result<(), Box<dyn std::error::Error>> {
    match KeyPattern::new().translate(key) {
        Translation::Matched(destination_key) => {
            println!("{destination_key}");
            Ok(())
        }
        Translation::NotApplicable => Err("key does not match the export grammar".into()),
        Translation::Invalid { reason } => Err(reason.into()),
    }
}

/// Receives and processes batches until the queue runs dry or the batch
/// cap is hit. Batches within one round are processed concurrently up to
/// the configured ceiling; each gets its own export session.
async fn drain_queue(
    queue: &dyn WorkQueue,
    config: &Config,
    destination_client: &aws_sdk_s3::Client,
    max_batches: Option<u64>,
) -> Result<RunTotals, Box<dyn std::error::Error>> {
    let pattern = KeyPattern::new();
    let http = reqwest::Client::new();
    let mut totals = RunTotals::default();

    loop {
        let want = max_batches.map_or(config.concurrency, |max| {
            usize::try_from(max.saturating_sub(totals.batches))
                .unwrap_or(usize::MAX)
                .min(config.concurrency)
        });
        if want == 0 {
            break;
        }

        let queued = queue.receive(want).await?;
        if queued.is_empty() {
            log::info!("Queue drained");
            break;
        }

        let summaries: Vec<Option<BatchSummary>> = stream::iter(
            queued
                .into_iter()
                .map(|batch| process_queued_batch(config, &pattern, &http, destination_client, queue, batch)),
        )
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

        let attempted = summaries.len();
        let mut started = 0usize;
        for summary in summaries.into_iter().flatten() {
            totals.absorb(&summary);
            started += 1;
        }

        // Credential issuance is infrastructure: it is not retried in a
        // loop here, the messages redeliver and a later invocation picks
        // them up.
        if started == 0 {
            return Err(format!(
                "none of {attempted} received batches could start processing; \
                 messages left for redelivery"
            )
            .into());
        }
    }

    Ok(totals)
}

/// Processes one received batch end to end.
///
/// Returns `None` when processing could not start (credential exchange
/// failed) — the message is left on the queue and redelivers after the
/// visibility timeout. Once a batch has a complete outcome list its
/// message is deleted: failed keys are re-migrated by re-running
/// `enumerate`, which the destination existence probe makes cheap.
async fn process_queued_batch(
    config: &Config,
    pattern: &KeyPattern,
    http: &reqwest::Client,
    destination_client: &aws_sdk_s3::Client,
    queue: &dyn WorkQueue,
    queued: QueuedBatch,
) -> Option<BatchSummary> {
    let session = match ExportSession::establish(http, &config.credentials_url, &queued.batch.token)
        .await
    {
        Ok(session) => session,
        Err(e) => {
            log::error!("Could not establish export session: {e}; leaving batch for redelivery");
            return None;
        }
    };

    let source = S3SourceStore::new(session.s3().clone(), config.source_bucket.clone());
    let destination =
        S3DestinationStore::new(destination_client.clone(), config.destination_bucket.clone());

    let summary = process_batch(
        pattern,
        &source,
        &destination,
        &queued.batch.object_keys,
        config.part_size,
        || session.is_expiring(),
    )
    .await;

    if let Err(e) = queue.delete(&queued.receipt_handle).await {
        // Redelivery of a fully-processed batch is absorbed by the
        // idempotency guard; worst case is wasted existence probes.
        log::warn!("Could not delete processed batch: {e}");
    }

    Some(summary)
}

/// Parses `--start`/`--end` into an inclusive range. Both or neither must
/// be given; without them enumeration covers every day in the export.
fn parse_date_range(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Option<DateRange>, Box<dyn std::error::Error>> {
    match (start, end) {
        (None, None) => Ok(None),
        (Some(start), Some(end)) => {
            let start = parse_date(start)?;
            let end = parse_date(end)?;
            if start > end {
                return Err(format!("--start {start} is after --end {end}").into());
            }
            Ok(Some(DateRange { start, end }))
        }
        _ => Err("--start and --end must be given together".into()),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{raw}', expected YYYY-MM-DD").into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_range() {
        let range = parse_date_range(Some("2023-01-30"), Some("2023-02-02"))
            .unwrap()
            .unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2023, 1, 30).unwrap());
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2023, 2, 2).unwrap());
    }

    #[test]
    fn no_dates_means_no_range() {
        assert!(parse_date_range(None, None).unwrap().is_none());
    }

    #[test]
    fn lone_start_is_rejected() {
        assert!(parse_date_range(Some("2023-01-30"), None).is_err());
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert!(parse_date_range(Some("2023-02-02"), Some("2023-01-30")).is_err());
    }

    #[test]
    fn garbage_date_is_rejected() {
        assert!(parse_date_range(Some("01/30/2023"), Some("2023-02-02")).is_err());
    }
}
