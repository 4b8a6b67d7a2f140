//! Resumable state persistence.
//!
//! A single global slot: at most one resumable upload exists per client at
//! a time. Starting a new upload simply overwrites whatever the slot held.

use super::state::ResumableState;
use chrono::Utc;
use std::path::PathBuf;
use thiserror::Error;

/// Persistence errors
#[derive(Error, Debug)]
pub enum RepoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Single-slot persistent register for [`ResumableState`].
pub trait StateRepository: Send + Sync {
    /// Load the slot. Stale or unreadable state is evicted and reported
    /// as empty rather than propagated.
    fn load(&self) -> Result<Option<ResumableState>, RepoError>;

    /// Overwrite the slot.
    fn save(&self, state: &ResumableState) -> Result<(), RepoError>;

    /// Empty the slot. Clearing an empty slot is not an error.
    fn clear(&self) -> Result<(), RepoError>;
}

/// JSON-file-backed [`StateRepository`].
pub struct FileStateRepository {
    path: PathBuf,
}

impl FileStateRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The conventional slot location under the user's data directory.
    pub fn default_slot(base_dir: &std::path::Path) -> Self {
        Self::new(base_dir.join("resumable-upload.json"))
    }
}

impl StateRepository for FileStateRepository {
    fn load(&self) -> Result<Option<ResumableState>, RepoError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let state: ResumableState = match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable resumable state");
                self.clear()?;
                return Ok(None);
            }
        };

        if state.is_stale(Utc::now()) {
            tracing::info!(
                link_id = %state.link_id,
                "Discarding stale resumable state"
            );
            self.clear()?;
            return Ok(None);
        }

        Ok(Some(state))
    }

    fn save(&self, state: &ResumableState) -> Result<(), RepoError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(state)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), RepoError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
