//! Session store
//!
//! Holds the server-side record behind every share link. The record is
//! keyed by the public link id; the storage key it points at is internal
//! and mutable (replacing a file's content reassigns it without changing
//! the link).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod memory;

pub use memory::MemoryStore;

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// One shareable file and its access policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileLink {
    /// Public identifier, immutable once issued.
    pub link_id: String,

    /// Internal blob identifier. Mutable: replace reassigns it.
    pub storage_key: String,

    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: u64,

    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,

    /// Content is inaccessible before this instant.
    pub release_date: Option<DateTime<Utc>>,

    /// Salted hash; plaintext is never persisted.
    pub password_hash: Option<String>,

    pub download_count: u64,
    pub max_downloads: Option<u64>,

    /// Multipart transaction id while an upload is in flight.
    pub upload_id: Option<String>,
}

impl FileLink {
    /// Whether the link can still be served at `now`.
    ///
    /// Release gating is checked separately by the download gate so the
    /// caller can distinguish "not yet" from "no longer".
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        if let Some(expires_at) = self.expires_at {
            if now > expires_at {
                return false;
            }
        }
        if let Some(max) = self.max_downloads {
            if self.download_count >= max {
                return false;
            }
        }
        true
    }
}

/// Document store contract for [`FileLink`] records.
///
/// Save is an upsert. `try_increment_download` must be atomic with respect
/// to the limit check so self-destruct links cannot be downloaded twice
/// under concurrent requests.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Find a record by its public link id.
    async fn find(&self, link_id: &str) -> Result<Option<FileLink>, StoreError>;

    /// Insert or replace a record.
    async fn save(&self, link: FileLink) -> Result<(), StoreError>;

    /// Delete a record. Deleting a missing record is not an error.
    async fn delete(&self, link_id: &str) -> Result<(), StoreError>;

    /// Atomically check the download limit and increment the counter.
    ///
    /// Returns the updated record on success, or `None` when the limit was
    /// already reached (the caller treats that as gone).
    async fn try_increment_download(&self, link_id: &str) -> Result<Option<FileLink>, StoreError>;
}
