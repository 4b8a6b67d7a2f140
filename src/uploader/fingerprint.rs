//! File fingerprinting for resume verification.
//!
//! A fingerprint ties persisted resumable state to one specific local file,
//! not merely a same-named one: name, byte size, and modification time all
//! feed the digest. Any edit to the file changes its mtime and therefore
//! invalidates the state.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Derived identity of a local file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileFingerprint(String);

impl FileFingerprint {
    /// Fingerprint a file on disk.
    pub async fn for_path(path: &Path) -> io::Result<Self> {
        let meta = tokio::fs::metadata(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let modified_secs = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Ok(Self::derive(&name, meta.len(), modified_secs))
    }

    /// Derive a fingerprint from the identity triple.
    pub fn derive(name: &str, size_bytes: u64, modified_secs: u64) -> Self {
        let input = format!("{}\n{}\n{}", name, size_bytes, modified_secs);
        Self(crate::gate::sha256_hex(input.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
