//! Shared test support: a fake blob store and config/record builders.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use quickdrop::api::PartRef;
use quickdrop::blob::{BlobError, BlobStore, Disposition};
use quickdrop::config::{Config, ServerConfig, StorageConfig, UploadConfig};
use quickdrop::store::FileLink;
use std::time::Duration;

/// In-memory [`BlobStore`] that mints deterministic URLs and records every
/// destructive operation for assertions. `base_url` controls where PUT
/// URLs point, so tests can aim them at a mock HTTP server.
pub struct FakeBlobStore {
    base_url: String,
    pub deleted: Mutex<Vec<String>>,
    pub completed: Mutex<Vec<(String, Vec<PartRef>)>>,
}

impl FakeBlobStore {
    pub fn new() -> Self {
        Self::with_base("http://blob.invalid")
    }

    pub fn with_base(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            deleted: Mutex::new(Vec::new()),
            completed: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BlobStore for FakeBlobStore {
    async fn issue_put_url(
        &self,
        key: &str,
        _mime_type: &str,
        _ttl: Duration,
    ) -> Result<String, BlobError> {
        Ok(format!("{}/blob/{}", self.base_url, key))
    }

    async fn begin_multipart(&self, key: &str, _mime_type: &str) -> Result<String, BlobError> {
        Ok(format!("txn-{}", key))
    }

    async fn issue_part_put_url(
        &self,
        key: &str,
        _upload_id: &str,
        part_number: u32,
        _ttl: Duration,
    ) -> Result<String, BlobError> {
        Ok(format!("{}/blob/{}/{}", self.base_url, key, part_number))
    }

    async fn complete_multipart(
        &self,
        key: &str,
        _upload_id: &str,
        parts: &[PartRef],
    ) -> Result<(), BlobError> {
        let ascending = parts
            .windows(2)
            .all(|w| w[0].part_number < w[1].part_number);
        if parts.is_empty() || !ascending {
            return Err(BlobError::Storage(
                "parts must be ascending and unique".into(),
            ));
        }
        self.completed
            .lock()
            .push((key.to_string(), parts.to_vec()));
        Ok(())
    }

    async fn issue_get_url(
        &self,
        key: &str,
        file_name: &str,
        _ttl: Duration,
        disposition: Disposition,
    ) -> Result<String, BlobError> {
        let kind = match disposition {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        };
        Ok(format!(
            "{}/signed/{}?disposition={}&filename={}",
            self.base_url, key, kind, file_name
        ))
    }

    async fn delete_object(&self, key: &str) -> Result<(), BlobError> {
        self.deleted.lock().push(key.to_string());
        Ok(())
    }
}

/// A config with small thresholds so multipart kicks in for tiny files.
pub fn test_config(multipart_threshold: u64, part_size: u64) -> Config {
    Config {
        server: ServerConfig {
            address: "127.0.0.1:0".into(),
            public_url: "http://localhost:3000".into(),
        },
        storage: StorageConfig {
            bucket: "quickdrop-test".into(),
            region: "us-east-1".into(),
            endpoint: None,
            access_key: None,
            secret_key: None,
        },
        upload: UploadConfig {
            multipart_threshold,
            part_size,
            concurrent_parts: 8,
            part_url_ttl_secs: 60,
            download_url_ttl_secs: 60,
            preview_url_ttl_secs: 60,
        },
    }
}

/// A plain valid link record.
pub fn base_link(link_id: &str) -> FileLink {
    FileLink {
        link_id: link_id.into(),
        storage_key: format!("key-{}", link_id),
        original_name: "document.pdf".into(),
        mime_type: "application/pdf".into(),
        size_bytes: 2048,
        created_at: Utc::now(),
        expires_at: None,
        release_date: None,
        password_hash: None,
        download_count: 0,
        max_downloads: None,
        upload_id: None,
    }
}
