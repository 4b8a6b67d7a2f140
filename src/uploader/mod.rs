//! Upload Coordinator
//!
//! Client-side resumable multipart upload machinery. The coordinator drives
//! a file from "selected" to "fully transferred and committed": it splits
//! the file into parts, transfers them in bounded-concurrency windows
//! directly to presigned storage URLs, persists resumable state after every
//! window, and recovers from connection loss by pausing rather than failing.
//!
//! The session protocol (init / refresh-urls / complete) is spoken through
//! [`client::SessionClient`]; part bytes never touch the protocol server.

use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod client;
pub mod coordinator;
pub mod fingerprint;
pub mod progress;
pub mod repo;
pub mod state;

pub use client::SessionClient;
pub use coordinator::{CoordinatorConfig, UploadCoordinator, UploadOutcome, UploadPhase};
pub use fingerprint::FileFingerprint;
pub use progress::{ProgressObserver, ProgressTracker, ProgressUpdate};
pub use repo::{FileStateRepository, StateRepository};
pub use state::ResumableState;

/// Upload errors surfaced to the caller
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Failed to initialize upload: {0}")]
    InitFailed(String),

    #[error("Part {part_number} failed after {attempts} attempts: {reason}")]
    PartUploadFailed {
        part_number: u32,
        attempts: u32,
        reason: String,
    },

    /// Connection-level failure. The coordinator is paused and resumable
    /// state is preserved; resume when connectivity returns.
    #[error("Network connection lost, upload paused")]
    NetworkLost,

    /// The supplied file does not match the persisted resumable state.
    /// Surfaced instead of silently restarting so no bytes are re-sent.
    #[error("Resumable state does not match the supplied file")]
    ResumeMismatch,

    #[error("No resumable upload state found")]
    NoResumableState,

    /// Storage-side finalize rejected. Resumable state is preserved so
    /// completion can be retried without re-uploading data.
    #[error("Failed to finalize upload: {0}")]
    CompletionFailed(String),

    #[error("Upload cancelled")]
    Cancelled,

    #[error("Invalid operation in state {0}")]
    InvalidTransition(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State persistence error: {0}")]
    State(#[from] repo::RepoError),
}

/// Options chosen by the user at upload time.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Expiry in milliseconds. 0 = never, negative = self-destruct.
    pub expiry_ms: i64,
    pub self_destruct: bool,
    pub password: Option<String>,
    pub release_date: Option<DateTime<Utc>>,
}

/// What the caller gets back after a successful completion.
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub file_id: String,
    pub share_link: String,
    pub file_name: String,
}
