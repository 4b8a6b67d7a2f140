//! Persisted resumable upload state.
//!
//! One JSON blob describing a multipart upload in flight: which file it
//! belongs to (fingerprint), the session and storage transaction ids, the
//! part plan, and which parts have been confirmed so far. Updated after
//! every transfer window, so a crash loses at most one in-flight window.

use super::fingerprint::FileFingerprint;
use crate::api::{normalize_parts, PartRef, PartUrl};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub use crate::api::plan_part_count;

/// State older than this is considered abandoned and discarded on load.
pub const STALENESS_SECS: i64 = 3600;

/// Resumable multipart upload state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumableState {
    pub fingerprint: FileFingerprint,
    pub link_id: String,
    pub upload_id: String,
    pub storage_key: String,
    pub chunk_size: u64,
    pub size_bytes: u64,
    pub total_parts: u32,

    /// Presigned PUT URLs, valid only for a bounded lifetime.
    pub part_urls: Vec<PartUrl>,

    /// Confirmed parts. Append-only; deduplicated by part number.
    pub completed_parts: Vec<PartRef>,

    /// Last write time, used for staleness eviction.
    pub saved_at: DateTime<Utc>,
}

impl ResumableState {
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.saved_at > Duration::seconds(STALENESS_SECS)
    }

    /// Byte offset where `part_number` starts.
    pub fn part_offset(&self, part_number: u32) -> u64 {
        (part_number as u64 - 1) * self.chunk_size
    }

    /// Length of `part_number`; the last part may be shorter.
    pub fn part_len(&self, part_number: u32) -> u64 {
        let offset = self.part_offset(part_number);
        self.chunk_size.min(self.size_bytes - offset)
    }

    /// Record newly confirmed parts, skipping any part number already held.
    pub fn record_completed(&mut self, parts: impl IntoIterator<Item = PartRef>) {
        for part in parts {
            if !self
                .completed_parts
                .iter()
                .any(|p| p.part_number == part.part_number)
            {
                self.completed_parts.push(part);
            }
        }
    }

    /// Part numbers not yet confirmed, ascending.
    pub fn remaining_parts(&self) -> Vec<u32> {
        let done: HashSet<u32> = self
            .completed_parts
            .iter()
            .map(|p| p.part_number)
            .collect();
        (1..=self.total_parts)
            .filter(|n| !done.contains(n))
            .collect()
    }

    /// Authoritative sum of confirmed part sizes. This is the progress
    /// floor; it never estimates from elapsed time.
    pub fn completed_bytes(&self) -> u64 {
        self.completed_parts
            .iter()
            .map(|p| self.part_len(p.part_number))
            .sum()
    }

    /// The finalize list: confirmed parts, ascending, unique.
    pub fn completion_parts(&self) -> Vec<PartRef> {
        normalize_parts(self.completed_parts.clone())
    }

    /// URL for one part, if the state still holds it.
    pub fn url_for_part(&self, part_number: u32) -> Option<&str> {
        self.part_urls
            .iter()
            .find(|p| p.part_number == part_number)
            .map(|p| p.url.as_str())
    }

    /// Swap in freshly re-signed URLs for the given parts, dropping the
    /// stale ones they replace.
    pub fn replace_part_urls(&mut self, fresh: Vec<PartUrl>) {
        let refreshed: HashSet<u32> = fresh.iter().map(|p| p.part_number).collect();
        self.part_urls.retain(|p| !refreshed.contains(&p.part_number));
        self.part_urls.extend(fresh);
        self.part_urls.sort_by_key(|p| p.part_number);
    }
}
