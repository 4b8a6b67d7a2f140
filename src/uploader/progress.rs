//! Progress and throughput accounting.
//!
//! The byte floor comes from the authoritative sum of completed part
//! sizes, never from elapsed time. Reported values are monotonically
//! non-decreasing even when a resume recomputes state from disk.

use std::sync::Arc;
use std::time::Instant;

/// A snapshot pushed to the observer after every transfer window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    pub bytes_done: u64,
    pub total_bytes: u64,
    /// 0..=100, rounded down.
    pub percent: u8,
    /// Recent transfer rate. Zero until two observations exist.
    pub bytes_per_sec: f64,
}

/// Callback invoked with progress snapshots.
pub type ProgressObserver = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Monotonic progress tracker for one upload.
pub struct ProgressTracker {
    total_bytes: u64,
    floor: u64,
    last_observation: Option<(Instant, u64)>,
    rate: f64,
}

impl ProgressTracker {
    /// `initial_bytes` seeds the floor; on resume this is the byte count
    /// already confirmed, so the display never moves backward.
    pub fn new(total_bytes: u64, initial_bytes: u64) -> Self {
        Self {
            total_bytes,
            floor: initial_bytes.min(total_bytes),
            last_observation: None,
            rate: 0.0,
        }
    }

    /// Record an absolute completed-byte count and produce a snapshot.
    pub fn observe(&mut self, bytes_done: u64) -> ProgressUpdate {
        self.observe_at(bytes_done, Instant::now())
    }

    fn observe_at(&mut self, bytes_done: u64, now: Instant) -> ProgressUpdate {
        let bytes = bytes_done.min(self.total_bytes).max(self.floor);

        if let Some((last_instant, last_bytes)) = self.last_observation {
            let elapsed = now.duration_since(last_instant).as_secs_f64();
            if elapsed > 0.0 && bytes > last_bytes {
                self.rate = (bytes - last_bytes) as f64 / elapsed;
            }
        }
        self.last_observation = Some((now, bytes));
        self.floor = bytes;

        ProgressUpdate {
            bytes_done: bytes,
            total_bytes: self.total_bytes,
            percent: self.percent(bytes),
            bytes_per_sec: self.rate,
        }
    }

    fn percent(&self, bytes: u64) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        ((bytes as f64 / self.total_bytes as f64) * 100.0).floor() as u8
    }
}
