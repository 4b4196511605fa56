//! Size-adaptive chunked copy.
//!
//! Objects below the part-size threshold move in one read + one write.
//! Everything else goes through a multipart upload: contiguous ranges are
//! downloaded and re-uploaded strictly in ascending offset order, and the
//! upload is only finalized once every part's confirmation tag has been
//! collected. Any failure abandons the session, so the destination
//! namespace never shows a partially-written object.

use bytes::Bytes;

use crate::store::{DestinationStore, SourceStore, StoreError, TransferPart};

/// Part size threshold: objects at or above this length are copied via
/// multipart upload, in ranges of this many bytes.
pub const DEFAULT_PART_SIZE: u64 = 5 * 1024 * 1024;

/// What one completed copy did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyReport {
    /// Parts uploaded (1 for a single-shot copy).
    pub parts: u64,
    /// Bytes transferred.
    pub bytes: u64,
}

/// An inclusive byte range paired with its 1-based part number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PartRange {
    number: i32,
    start: u64,
    end: u64,
}

/// Splits `total_len` bytes into ascending ranges of `part_size`, the
/// last possibly shorter. Empty for a zero-length object.
fn part_ranges(total_len: u64, part_size: u64) -> Vec<PartRange> {
    let mut ranges = Vec::new();
    let mut start = 0u64;
    let mut number = 1i32;

    while start < total_len {
        let end = (start + part_size).min(total_len) - 1;
        ranges.push(PartRange { number, start, end });
        start = end + 1;
        number += 1;
    }

    ranges
}

/// Copies one object from the source store to the destination store.
///
/// The destination object's bytes are the exact concatenation of the
/// source's ranges in ascending offset order. On any part failure the
/// multipart session is aborted before the error propagates — a finalize
/// call is never issued for an incomplete part list.
///
/// # Errors
///
/// Returns the first [`StoreError`] encountered; the destination is left
/// without a (finished) object under `destination_key` in that case.
pub async fn copy_object(
    source: &dyn SourceStore,
    destination: &dyn DestinationStore,
    source_key: &str,
    destination_key: &str,
    part_size: u64,
) -> Result<CopyReport, StoreError> {
    let total_len = source.content_length(source_key).await?;

    if total_len < part_size {
        // Single-shot. A zero-length source still produces a destination
        // object, otherwise the exists-probe would re-queue it forever.
        let body = if total_len == 0 {
            Bytes::new()
        } else {
            source.read_range(source_key, 0, total_len - 1).await?
        };
        destination.put(destination_key, body).await?;

        log::debug!("Copied {source_key} -> {destination_key} ({total_len} bytes, single-shot)");
        return Ok(CopyReport {
            parts: 1,
            bytes: total_len,
        });
    }

    let upload_id = destination.begin_multipart(destination_key).await?;

    let upload_result = async {
        let ranges = part_ranges(total_len, part_size);
        let mut parts: Vec<TransferPart> = Vec::with_capacity(ranges.len());

        for range in &ranges {
            let body = source.read_range(source_key, range.start, range.end).await?;
            let etag = destination
                .upload_part(destination_key, &upload_id, range.number, body)
                .await?;
            parts.push(TransferPart {
                number: range.number,
                etag,
            });
        }

        destination
            .complete_multipart(destination_key, &upload_id, &parts)
            .await?;

        Ok(parts.len() as u64)
    }
    .await;

    match upload_result {
        Ok(parts) => {
            log::debug!("Copied {source_key} -> {destination_key} ({total_len} bytes, {parts} parts)");
            Ok(CopyReport {
                parts,
                bytes: total_len,
            })
        }
        Err(e) => {
            if let Err(abort_err) = destination
                .abort_multipart(destination_key, &upload_id)
                .await
            {
                log::warn!("Failed to abort multipart upload of {destination_key}: {abort_err}");
            }
            Err(e)
        }
    }
}
