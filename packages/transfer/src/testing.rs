//! In-memory store doubles for engine and worker tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use crate::store::{DestinationStore, SourceStore, StoreError, TransferPart};

fn probe_err(key: &str, message: &str) -> StoreError {
    StoreError::Probe {
        bucket: "memory".to_string(),
        key: key.to_string(),
        source: message.to_string().into(),
    }
}

/// Read-only in-memory source bucket.
#[derive(Debug, Default)]
pub struct MemorySource {
    objects: HashMap<String, Bytes>,
    fail_reads_from: Mutex<Option<u64>>,
    reads: AtomicU64,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(key: &str, body: Bytes) -> Self {
        let mut source = Self::new();
        source.insert(key, body);
        source
    }

    pub fn insert(&mut self, key: &str, body: Bytes) {
        self.objects.insert(key.to_string(), body);
    }

    /// Makes every ranged read starting at or beyond `offset` fail.
    pub fn fail_reads_from(&self, offset: u64) {
        *self.fail_reads_from.lock().unwrap() = Some(offset);
    }

    /// Ranged reads served so far.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SourceStore for MemorySource {
    async fn content_length(&self, key: &str) -> Result<u64, StoreError> {
        self.objects
            .get(key)
            .map(|body| body.len() as u64)
            .ok_or_else(|| probe_err(key, "no such object"))
    }

    async fn read_range(&self, key: &str, start: u64, end: u64) -> Result<Bytes, StoreError> {
        self.reads.fetch_add(1, Ordering::Relaxed);

        if let Some(fail_from) = *self.fail_reads_from.lock().unwrap() {
            if start >= fail_from {
                return Err(StoreError::Read {
                    bucket: "memory".to_string(),
                    key: key.to_string(),
                    start,
                    end,
                    source: "injected read failure".to_string().into(),
                });
            }
        }

        let body = self
            .objects
            .get(key)
            .ok_or_else(|| probe_err(key, "no such object"))?;

        let start_idx = usize::try_from(start).unwrap();
        let end_idx = usize::try_from(end).unwrap() + 1;
        Ok(body.slice(start_idx..end_idx.min(body.len())))
    }
}

#[derive(Debug)]
struct OpenUpload {
    key: String,
    parts: Vec<(i32, Bytes)>,
}

/// Writable in-memory destination bucket with multipart bookkeeping.
///
/// `complete_multipart` verifies what a real store would enforce plus the
/// engine's own contract: part numbers must be 1-based, contiguous, and
/// submitted in ascending order.
#[derive(Debug, Default)]
pub struct MemoryDestination {
    objects: Mutex<HashMap<String, Bytes>>,
    uploads: Mutex<HashMap<String, OpenUpload>>,
    next_upload_id: AtomicU64,
    sessions_opened: AtomicU64,
    completed: AtomicU64,
    aborted: AtomicU64,
    bytes_written: AtomicU64,
    fail_part: Mutex<Option<i32>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    pub fn multipart_sessions_opened(&self) -> u64 {
        self.sessions_opened.load(Ordering::Relaxed)
    }

    pub fn completed_uploads(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn aborted_uploads(&self) -> u64 {
        self.aborted.load(Ordering::Relaxed)
    }

    /// Makes the upload of part `number` fail.
    pub fn fail_part(&self, number: i32) {
        *self.fail_part.lock().unwrap() = Some(number);
    }

    fn multipart_err(key: &str, message: String) -> StoreError {
        StoreError::Multipart {
            bucket: "memory".to_string(),
            key: key.to_string(),
            source: message.into(),
        }
    }
}

#[async_trait]
impl DestinationStore for MemoryDestination {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    async fn put(&self, key: &str, body: Bytes) -> Result<(), StoreError> {
        self.bytes_written
            .fetch_add(body.len() as u64, Ordering::Relaxed);
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }

    async fn begin_multipart(&self, key: &str) -> Result<String, StoreError> {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
        let upload_id = format!("upload-{}", self.next_upload_id.fetch_add(1, Ordering::Relaxed));
        self.uploads.lock().unwrap().insert(
            upload_id.clone(),
            OpenUpload {
                key: key.to_string(),
                parts: Vec::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<String, StoreError> {
        if *self.fail_part.lock().unwrap() == Some(part_number) {
            return Err(Self::multipart_err(key, format!("injected failure on part {part_number}")));
        }

        let mut uploads = self.uploads.lock().unwrap();
        let upload = uploads
            .get_mut(upload_id)
            .ok_or_else(|| Self::multipart_err(key, "unknown upload id".to_string()))?;

        self.bytes_written
            .fetch_add(body.len() as u64, Ordering::Relaxed);
        upload.parts.push((part_number, body));
        Ok(format!("etag-{part_number}"))
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[TransferPart],
    ) -> Result<(), StoreError> {
        let upload = self
            .uploads
            .lock()
            .unwrap()
            .remove(upload_id)
            .ok_or_else(|| Self::multipart_err(key, "unknown upload id".to_string()))?;

        if parts.is_empty() {
            return Err(Self::multipart_err(key, "empty part list".to_string()));
        }
        for (index, part) in parts.iter().enumerate() {
            let expected = i32::try_from(index).unwrap() + 1;
            if part.number != expected {
                return Err(Self::multipart_err(
                    key,
                    format!("part list not contiguous: {} at position {index}", part.number),
                ));
            }
            if part.etag != format!("etag-{}", part.number) {
                return Err(Self::multipart_err(key, format!("bad etag for part {}", part.number)));
            }
        }
        if parts.len() != upload.parts.len() {
            return Err(Self::multipart_err(
                key,
                format!("{} parts submitted, {} uploaded", parts.len(), upload.parts.len()),
            ));
        }

        let mut uploaded = upload.parts;
        uploaded.sort_by_key(|(number, _)| *number);
        let mut body = Vec::new();
        for (_, chunk) in uploaded {
            body.extend_from_slice(&chunk);
        }

        self.completed.fetch_add(1, Ordering::Relaxed);
        self.objects
            .lock()
            .unwrap()
            .insert(upload.key, Bytes::from(body));
        Ok(())
    }

    async fn abort_multipart(&self, _key: &str, upload_id: &str) -> Result<(), StoreError> {
        self.uploads.lock().unwrap().remove(upload_id);
        self.aborted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
