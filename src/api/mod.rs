//! Wire types for the upload session protocol.
//!
//! Shared by the server handlers and the client-side coordinator so both
//! ends agree on field names. All JSON is camelCase to match the public API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request body for `POST /api/upload/init`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadRequest {
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
    /// Expiry in milliseconds. 0 = never, negative = self-destruct sentinel.
    #[serde(default)]
    pub expiry_ms: i64,
    #[serde(default)]
    pub self_destruct: bool,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub release_date: Option<DateTime<Utc>>,
}

/// A presigned PUT URL for one part.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartUrl {
    pub part_number: u32,
    pub url: String,
}

/// Response body for `POST /api/upload/init` and `POST /api/replace/:id`.
///
/// Either `upload_url` (single-shot) or `upload_id` + `part_urls` +
/// `chunk_size` (multipart) is populated, depending on `multipart`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadResponse {
    pub file_id: String,
    pub storage_key: String,
    pub multipart: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_urls: Option<Vec<PartUrl>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u64>,
}

/// One completed part, identified by its number and storage ETag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartRef {
    #[serde(rename = "partNumber")]
    pub part_number: u32,
    #[serde(rename = "eTag")]
    pub etag: String,
}

/// Request body for `POST /api/upload/refresh-urls`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshUrlsRequest {
    pub file_id: String,
    pub upload_id: String,
    pub part_numbers: Vec<u32>,
}

/// Response body for `POST /api/upload/refresh-urls`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshUrlsResponse {
    pub part_urls: Vec<PartUrl>,
}

/// Request body for `POST /api/upload/complete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    pub file_id: String,
    #[serde(default)]
    pub upload_id: Option<String>,
    #[serde(default)]
    pub parts: Option<Vec<PartRef>>,
}

/// Response body for `POST /api/upload/complete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadResponse {
    pub success: bool,
    pub file_id: String,
    pub share_link: String,
    pub file_name: String,
}

/// Request body for `POST /api/replace/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceRequest {
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
}

/// Response body for `GET /api/files/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfoResponse {
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub self_destruct: bool,
    pub password_protected: bool,
}

/// Request body carrying an optional password (preview, verify, download).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PasswordBody {
    #[serde(default)]
    pub password: Option<String>,
}

/// Response body for `POST /api/files/preview/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub preview_url: String,
    pub file_name: String,
    pub mime_type: String,
}

/// Response body for `POST /api/files/verify/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
}

/// Response body for `POST /api/files/download/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub download_url: String,
    pub file_name: String,
}

/// Error body. `release_date` is set only for not-yet-released responses so
/// the client can render a countdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<DateTime<Utc>>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            release_date: None,
        }
    }
}

/// Number of fixed-size parts needed to cover `size_bytes`; the last part
/// may be shorter. Both ends of the protocol plan parts with this.
pub fn plan_part_count(size_bytes: u64, chunk_size: u64) -> u32 {
    size_bytes.div_ceil(chunk_size) as u32
}

/// Sort parts ascending by part number and drop duplicates.
///
/// Storage-side completion requires an ascending, unique part list; the
/// coordinator appends confirmed parts in whatever order batches settle, so
/// this runs once before completion is submitted.
pub fn normalize_parts(mut parts: Vec<PartRef>) -> Vec<PartRef> {
    parts.sort_by_key(|p| p.part_number);
    parts.dedup_by_key(|p| p.part_number);
    parts
}

/// Validate that a parts list is strictly ascending with no duplicates.
pub fn parts_are_ordered(parts: &[PartRef]) -> bool {
    parts.windows(2).all(|w| w[0].part_number < w[1].part_number)
}
