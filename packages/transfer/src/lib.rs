#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Object transfer: the chunked copy engine and the per-batch worker.
//!
//! The worker processes one batch of source keys sequentially — per-key
//! memory stays bounded and a failing key never takes its siblings down
//! with it. All store I/O goes through the [`store::SourceStore`] and
//! [`store::DestinationStore`] traits; production code plugs in the S3
//! implementations, tests plug in in-memory ones.

pub mod engine;
pub mod store;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{CopyReport, DEFAULT_PART_SIZE, copy_object};
pub use store::{
    DestinationStore, S3DestinationStore, S3SourceStore, SourceStore, StoreError, TransferPart,
};
pub use worker::{BatchSummary, KeyOutcome, KeyReport, process_batch};
