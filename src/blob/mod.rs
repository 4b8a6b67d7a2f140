//! Blob Store Gateway
//!
//! The presigned-URL contract the rest of the system is written against.
//! Uploads never flow through this process: the server mints time-limited
//! URLs and the client PUTs bytes straight to object storage. Part PUT
//! responses carry an ETag header whose value (quotes stripped) identifies
//! the part at completion time.

use crate::api::PartRef;
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::time::Duration;
use thiserror::Error;

mod s3;

pub use s3::S3BlobStore;

/// Blob store errors
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Presigning error: {0}")]
    Presign(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Multipart transaction missing upload id")]
    MissingUploadId,
}

/// How a presigned GET should ask the browser to handle the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Render in the browser (preview).
    Inline,
    /// Save to disk under the original name (download).
    Attachment,
}

/// Presigned-URL contract against object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Presign a single-shot PUT for small files.
    async fn issue_put_url(
        &self,
        key: &str,
        mime_type: &str,
        ttl: Duration,
    ) -> Result<String, BlobError>;

    /// Start a multipart transaction, returning its id.
    async fn begin_multipart(&self, key: &str, mime_type: &str) -> Result<String, BlobError>;

    /// Presign a PUT for one part of an open transaction.
    async fn issue_part_put_url(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        ttl: Duration,
    ) -> Result<String, BlobError>;

    /// Finalize a multipart transaction. Parts must be ascending and unique.
    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[PartRef],
    ) -> Result<(), BlobError>;

    /// Presign a GET carrying a content-disposition for `file_name`.
    async fn issue_get_url(
        &self,
        key: &str,
        file_name: &str,
        ttl: Duration,
        disposition: Disposition,
    ) -> Result<String, BlobError>;

    /// Delete an object. Used by eager cleanup and replace.
    async fn delete_object(&self, key: &str) -> Result<(), BlobError>;
}

/// Build a content-disposition header value with a percent-encoded filename.
pub(crate) fn content_disposition(disposition: Disposition, file_name: &str) -> String {
    let kind = match disposition {
        Disposition::Inline => "inline",
        Disposition::Attachment => "attachment",
    };
    let encoded = utf8_percent_encode(file_name, NON_ALPHANUMERIC);
    format!("{}; filename*=UTF-8''{}", kind, encoded)
}
