//! In-memory session store backed by DashMap.
//!
//! Suitable for single-node deployments and tests. A document database
//! with TTL eviction can replace it behind the same trait; the download
//! gate does its own expiry check either way.

use super::{FileLink, SessionStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;

/// DashMap-backed [`SessionStore`].
#[derive(Default)]
pub struct MemoryStore {
    links: DashMap<String, FileLink>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            links: DashMap::new(),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn find(&self, link_id: &str) -> Result<Option<FileLink>, StoreError> {
        Ok(self.links.get(link_id).map(|entry| entry.clone()))
    }

    async fn save(&self, link: FileLink) -> Result<(), StoreError> {
        self.links.insert(link.link_id.clone(), link);
        Ok(())
    }

    async fn delete(&self, link_id: &str) -> Result<(), StoreError> {
        self.links.remove(link_id);
        Ok(())
    }

    async fn try_increment_download(&self, link_id: &str) -> Result<Option<FileLink>, StoreError> {
        // The entry guard holds the shard lock, making check-and-increment
        // atomic against concurrent downloads of the same link.
        match self.links.get_mut(link_id) {
            Some(mut entry) => {
                if let Some(max) = entry.max_downloads {
                    if entry.download_count >= max {
                        return Ok(None);
                    }
                }
                entry.download_count += 1;
                Ok(Some(entry.clone()))
            }
            None => Err(StoreError::NotFound(link_id.to_string())),
        }
    }
}
