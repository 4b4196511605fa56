//! Store access traits and their S3 implementations.
//!
//! The engine and worker are written against these traits rather than the
//! SDK so the copy protocol can be exercised against in-memory stores.
//! The source side is read-only (the vendor credential cannot write); the
//! destination side carries the full single-shot + multipart surface.

use async_trait::async_trait;
use bytes::Bytes;

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};

/// Errors raised by store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Metadata probe (`HeadObject`) failed.
    #[error("Failed to probe s3://{bucket}/{key}: {source}")]
    Probe {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Ranged read failed.
    #[error("Failed to read s3://{bucket}/{key} bytes {start}-{end}: {source}")]
    Read {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// First byte of the failed range.
        start: u64,
        /// Last byte (inclusive) of the failed range.
        end: u64,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Single-shot write failed.
    #[error("Failed to write s3://{bucket}/{key}: {source}")]
    Write {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A multipart upload operation failed.
    #[error("Multipart upload of s3://{bucket}/{key} failed: {source}")]
    Multipart {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// One uploaded part's confirmation: its 1-based number and the tag the
/// destination returned for it. Completion submits these in ascending
/// part-number order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPart {
    /// 1-based, contiguous part number.
    pub number: i32,
    /// Upload confirmation tag (ETag).
    pub etag: String,
}

/// Read access to the vendor export bucket.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Total byte length of an object, via a metadata probe.
    async fn content_length(&self, key: &str) -> Result<u64, StoreError>;

    /// Reads the inclusive byte range `start..=end` of an object.
    async fn read_range(&self, key: &str, start: u64, end: u64) -> Result<Bytes, StoreError>;
}

/// Write access to the caller-owned destination bucket.
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// Whether an object already exists under `key` (metadata-only probe).
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Writes a whole object in one operation.
    async fn put(&self, key: &str, body: Bytes) -> Result<(), StoreError>;

    /// Opens a multipart upload session, returning its upload id.
    async fn begin_multipart(&self, key: &str) -> Result<String, StoreError>;

    /// Uploads one part, returning its confirmation tag.
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<String, StoreError>;

    /// Finalizes a multipart upload from the ordered part list.
    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[TransferPart],
    ) -> Result<(), StoreError>;

    /// Abandons a multipart upload so no finished object appears.
    async fn abort_multipart(&self, key: &str, upload_id: &str) -> Result<(), StoreError>;
}

/// [`SourceStore`] over an S3 bucket readable with vendor credentials.
#[derive(Debug, Clone)]
pub struct S3SourceStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3SourceStore {
    /// Wraps a client (typically from an export session) and bucket name.
    #[must_use]
    pub const fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl SourceStore for S3SourceStore {
    async fn content_length(&self, key: &str) -> Result<u64, StoreError> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Probe {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                source: Box::new(e.into_service_error()),
            })?;

        let length = output.content_length().unwrap_or(0);
        Ok(u64::try_from(length).unwrap_or(0))
    }

    async fn read_range(&self, key: &str, start: u64, end: u64) -> Result<Bytes, StoreError> {
        let read_err = |source: Box<dyn std::error::Error + Send + Sync>| StoreError::Read {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            start,
            end,
            source,
        };

        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .range(format!("bytes={start}-{end}"))
            .send()
            .await
            .map_err(|e| read_err(Box::new(e.into_service_error())))?;

        let aggregated = output
            .body
            .collect()
            .await
            .map_err(|e| read_err(Box::new(e)))?;

        Ok(aggregated.into_bytes())
    }
}

/// [`DestinationStore`] over the caller-owned S3 bucket.
#[derive(Debug, Clone)]
pub struct S3DestinationStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3DestinationStore {
    /// Wraps a client using the caller's own AWS identity.
    #[must_use]
    pub const fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    fn multipart_err(
        &self,
        key: &str,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> StoreError {
        StoreError::Multipart {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            source,
        }
    }
}

#[async_trait]
impl DestinationStore for S3DestinationStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                // NotFound is the expected answer for a key that has not
                // been migrated yet, not an error.
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    return Ok(false);
                }
                Err(StoreError::Probe {
                    bucket: self.bucket.clone(),
                    key: key.to_string(),
                    source: Box::new(service_err),
                })
            }
        }
    }

    async fn put(&self, key: &str, body: Bytes) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StoreError::Write {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                source: Box::new(e.into_service_error()),
            })?;

        Ok(())
    }

    async fn begin_multipart(&self, key: &str) -> Result<String, StoreError> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| self.multipart_err(key, Box::new(e.into_service_error())))?;

        output
            .upload_id()
            .map(ToString::to_string)
            .ok_or_else(|| self.multipart_err(key, "no upload id in response".into()))
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<String, StoreError> {
        let output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| self.multipart_err(key, Box::new(e.into_service_error())))?;

        output
            .e_tag()
            .map(ToString::to_string)
            .ok_or_else(|| {
                self.multipart_err(key, format!("part {part_number} returned no ETag").into())
            })
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[TransferPart],
    ) -> Result<(), StoreError> {
        let completed = parts
            .iter()
            .map(|part| {
                CompletedPart::builder()
                    .part_number(part.number)
                    .e_tag(&part.etag)
                    .build()
            })
            .collect();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| self.multipart_err(key, Box::new(e.into_service_error())))?;

        Ok(())
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> Result<(), StoreError> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| self.multipart_err(key, Box::new(e.into_service_error())))?;

        Ok(())
    }
}
