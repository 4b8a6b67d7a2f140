//! The upload coordinator state machine.
//!
//! Drives one file from selected to committed. Multipart transfers run in
//! bounded-concurrency windows; the whole window is awaited before the next
//! starts, capping simultaneous connections and buffered chunks. Confirmed
//! parts are persisted after every window, so a crash or connection loss
//! costs at most one window of re-upload.
//!
//! Pause and cancel share one mechanism - a hard abort of in-flight
//! transfers via a cancellation token - and differ only in the recorded
//! phase. Persisted state survives both; only an explicit discard clears it.

use super::client::{ProtocolError, SessionClient};
use super::fingerprint::FileFingerprint;
use super::progress::{ProgressObserver, ProgressTracker};
use super::repo::StateRepository;
use super::state::{plan_part_count, ResumableState};
use super::{UploadError, UploadOptions, UploadReceipt};
use crate::api::PartRef;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;

/// Coordinator tuning.
///
/// The single-shot vs multipart split itself is decided by the session
/// protocol at init time; the coordinator follows whichever shape the
/// server hands back.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Parts transferred concurrently per window.
    pub concurrent_parts: usize,

    /// Attempts per part for non-network failures.
    pub part_attempts: u32,

    /// First retry delay; doubles per attempt (1s, 2s, 4s).
    pub part_backoff: Duration,

    /// Attempts for re-signing URLs when resuming.
    pub resume_attempts: u32,

    /// First resume retry delay; doubles per attempt (2s, 4s, 8s).
    pub resume_backoff: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            concurrent_parts: 8,
            part_attempts: 3,
            part_backoff: Duration::from_secs(1),
            resume_attempts: 3,
            resume_backoff: Duration::from_secs(2),
        }
    }
}

/// Coordinator phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Idle,
    Uploading,
    Paused,
    Cancelled,
    Completed,
}

/// How a driving call ended when it did not fail outright.
#[derive(Debug)]
pub enum UploadOutcome {
    Completed(UploadReceipt),
    /// Stopped by an explicit pause; resumable state is on disk.
    Paused,
}

enum RunControl {
    Done,
    PausedByCaller,
}

/// Client-side resumable upload coordinator.
pub struct UploadCoordinator {
    session: SessionClient,
    http: reqwest::Client,
    repo: Arc<dyn StateRepository>,
    config: CoordinatorConfig,
    phase: Mutex<UploadPhase>,
    cancel: Mutex<CancellationToken>,
    observer: Option<ProgressObserver>,
}

impl UploadCoordinator {
    pub fn new(
        base_url: impl Into<String>,
        repo: Arc<dyn StateRepository>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            session: SessionClient::new(base_url),
            http: reqwest::Client::new(),
            repo,
            config,
            phase: Mutex::new(UploadPhase::Idle),
            cancel: Mutex::new(CancellationToken::new()),
            observer: None,
        }
    }

    /// Attach a progress observer, called after every transfer window.
    pub fn with_observer(mut self, observer: ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn phase(&self) -> UploadPhase {
        *self.phase.lock()
    }

    fn set_phase(&self, phase: UploadPhase) {
        *self.phase.lock() = phase;
    }

    /// Pause a running upload: in-flight transfers are hard-aborted,
    /// confirmed parts stay persisted. No-op unless uploading.
    pub fn pause(&self) {
        let mut phase = self.phase.lock();
        if *phase == UploadPhase::Uploading {
            *phase = UploadPhase::Paused;
            self.cancel.lock().cancel();
            tracing::info!("Upload paused");
        }
    }

    /// Cancel the upload. Aborts in-flight transfers immediately but
    /// deliberately keeps resumable state; see [`discard`](Self::discard).
    pub fn cancel(&self) {
        let mut phase = self.phase.lock();
        if matches!(*phase, UploadPhase::Uploading | UploadPhase::Paused) {
            *phase = UploadPhase::Cancelled;
            self.cancel.lock().cancel();
            tracing::info!("Upload cancelled");
        }
    }

    /// Abandon the upload for good: clears the persisted slot.
    pub fn discard(&self) -> Result<(), UploadError> {
        self.repo.clear()?;
        Ok(())
    }

    /// Upload a file from scratch.
    ///
    /// A multipart run persists resumable state before the first byte
    /// moves and after every window. Superseding an unrelated persisted
    /// upload is intentional: the slot holds one upload at a time.
    pub async fn upload(
        &self,
        path: &Path,
        options: UploadOptions,
    ) -> Result<UploadOutcome, UploadError> {
        let token = self.begin_run()?;

        let meta = tokio::fs::metadata(path).await?;
        let size_bytes = meta.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = mime_for_path(path);

        let request = crate::api::InitUploadRequest {
            file_name: file_name.clone(),
            file_size: size_bytes,
            mime_type,
            expiry_ms: options.expiry_ms,
            self_destruct: options.self_destruct,
            password: options.password,
            release_date: options.release_date,
        };

        let init = match self.session.init(&request).await {
            Ok(response) => response,
            Err(error) => {
                self.set_phase(UploadPhase::Idle);
                return Err(UploadError::InitFailed(error.to_string()));
            }
        };

        tracing::info!(
            file_id = %init.file_id,
            multipart = init.multipart,
            size_bytes,
            "Upload session started"
        );

        if !init.multipart {
            return self.run_single_shot(path, size_bytes, &init, &token).await;
        }

        let upload_id = init
            .upload_id
            .ok_or_else(|| UploadError::InitFailed("missing upload id".into()))?;
        let chunk_size = init
            .chunk_size
            .ok_or_else(|| UploadError::InitFailed("missing chunk size".into()))?;
        let part_urls = init
            .part_urls
            .ok_or_else(|| UploadError::InitFailed("missing part URLs".into()))?;

        let mut state = ResumableState {
            fingerprint: FileFingerprint::for_path(path).await?,
            link_id: init.file_id,
            upload_id,
            storage_key: init.storage_key,
            chunk_size,
            size_bytes,
            total_parts: plan_part_count(size_bytes, chunk_size),
            part_urls,
            completed_parts: Vec::new(),
            saved_at: Utc::now(),
        };
        if let Err(error) = self.repo.save(&state) {
            self.set_phase(UploadPhase::Idle);
            return Err(error.into());
        }

        match self.drive(path, &mut state, &token).await? {
            RunControl::Done => self.finalize(&state).await,
            RunControl::PausedByCaller => Ok(UploadOutcome::Paused),
        }
    }

    /// Resume a paused or interrupted upload of the same file.
    ///
    /// The fingerprint check runs before any transfer: a mismatched file
    /// fails hard instead of silently restarting and re-sending bytes.
    pub async fn resume(&self, path: &Path) -> Result<UploadOutcome, UploadError> {
        if self.phase() == UploadPhase::Uploading {
            return Err(UploadError::InvalidTransition("uploading"));
        }

        let Some(mut state) = self.repo.load()? else {
            return Err(UploadError::NoResumableState);
        };

        let fingerprint = FileFingerprint::for_path(path).await?;
        if fingerprint != state.fingerprint {
            return Err(UploadError::ResumeMismatch);
        }

        let token = self.begin_run()?;
        let remaining = state.remaining_parts();
        tracing::info!(
            file_id = %state.link_id,
            remaining = remaining.len(),
            total = state.total_parts,
            "Resuming upload"
        );

        if !remaining.is_empty() {
            // Presigned URLs expire; never reuse ones from a previous run.
            let fresh = match self.refresh_urls_with_backoff(&state, remaining, &token).await {
                Ok(fresh) => fresh,
                Err(UploadError::Cancelled) if self.phase() == UploadPhase::Paused => {
                    return Ok(UploadOutcome::Paused);
                }
                Err(error) => return Err(error),
            };
            state.replace_part_urls(fresh);
            state.saved_at = Utc::now();
            if let Err(error) = self.repo.save(&state) {
                self.set_phase(UploadPhase::Paused);
                return Err(error.into());
            }

            if let RunControl::PausedByCaller = self.drive(path, &mut state, &token).await? {
                return Ok(UploadOutcome::Paused);
            }
        }

        self.finalize(&state).await
    }

    /// Begin a run, rejecting re-entry and arming a fresh abort token.
    fn begin_run(&self) -> Result<CancellationToken, UploadError> {
        let mut phase = self.phase.lock();
        if *phase == UploadPhase::Uploading {
            return Err(UploadError::InvalidTransition("uploading"));
        }
        *phase = UploadPhase::Uploading;

        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        Ok(token)
    }

    async fn run_single_shot(
        &self,
        path: &Path,
        size_bytes: u64,
        init: &crate::api::InitUploadResponse,
        token: &CancellationToken,
    ) -> Result<UploadOutcome, UploadError> {
        let upload_url = init
            .upload_url
            .as_deref()
            .ok_or_else(|| UploadError::InitFailed("missing upload URL".into()))?;

        let mut tracker = ProgressTracker::new(size_bytes, 0);
        self.emit(&mut tracker, 0);

        let body = Bytes::from(tokio::fs::read(path).await?);
        if let Err(error) = self.put_with_retries(upload_url, body, 1, token).await {
            return match self.settle_failure(error) {
                Ok(_) => Ok(UploadOutcome::Paused),
                Err(error) => Err(error),
            };
        }
        self.emit(&mut tracker, size_bytes);

        match self.session.complete(&init.file_id, None, None).await {
            Ok(response) => {
                self.set_phase(UploadPhase::Completed);
                Ok(UploadOutcome::Completed(UploadReceipt {
                    file_id: response.file_id,
                    share_link: response.share_link,
                    file_name: response.file_name,
                }))
            }
            Err(error) => {
                self.set_phase(UploadPhase::Idle);
                Err(UploadError::CompletionFailed(error.to_string()))
            }
        }
    }

    /// Transfer all remaining parts in bounded windows, persisting after
    /// each window settles.
    async fn drive(
        &self,
        path: &Path,
        state: &mut ResumableState,
        token: &CancellationToken,
    ) -> Result<RunControl, UploadError> {
        let mut tracker = ProgressTracker::new(state.size_bytes, state.completed_bytes());
        self.emit(&mut tracker, state.completed_bytes());

        let remaining = state.remaining_parts();
        for window in remaining.chunks(self.config.concurrent_parts) {
            if token.is_cancelled() {
                return self.settle_failure(UploadError::Cancelled);
            }

            let transfers = window.iter().map(|&part_number| {
                let url = state.url_for_part(part_number).map(str::to_string);
                let offset = state.part_offset(part_number);
                let len = state.part_len(part_number);
                async move {
                    let url = url.ok_or(UploadError::PartUploadFailed {
                        part_number,
                        attempts: 0,
                        reason: "no presigned URL for part".into(),
                    })?;
                    self.transfer_part(path, &url, part_number, offset, len, token)
                        .await
                }
            });

            let results = futures::future::join_all(transfers).await;

            let mut confirmed = Vec::new();
            let mut failure: Option<UploadError> = None;
            for result in results {
                match result {
                    Ok(part) => confirmed.push(part),
                    Err(error) => {
                        failure = Some(match failure.take() {
                            Some(previous) => worse_failure(previous, error),
                            None => error,
                        })
                    }
                }
            }

            // Persist what this window confirmed before reacting to any
            // failure, so a crash right now loses nothing already done.
            state.record_completed(confirmed);
            state.saved_at = Utc::now();
            if let Err(error) = self.repo.save(state) {
                self.set_phase(UploadPhase::Paused);
                return Err(error.into());
            }
            self.emit(&mut tracker, state.completed_bytes());

            if let Some(error) = failure {
                return self.settle_failure(error);
            }
        }

        Ok(RunControl::Done)
    }

    /// Transfer one part: seek, read, PUT to the presigned URL. Connection
    /// failures abort immediately (the coordinator pauses); server errors
    /// retry with exponential backoff up to the attempt limit.
    async fn transfer_part(
        &self,
        path: &Path,
        url: &str,
        part_number: u32,
        offset: u64,
        len: u64,
        token: &CancellationToken,
    ) -> Result<PartRef, UploadError> {
        let chunk = read_chunk(path, offset, len).await?;
        self.put_with_retries(url, chunk, part_number, token).await
    }

    async fn put_with_retries(
        &self,
        url: &str,
        body: Bytes,
        part_number: u32,
        token: &CancellationToken,
    ) -> Result<PartRef, UploadError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if token.is_cancelled() {
                return Err(UploadError::Cancelled);
            }

            let send = self.http.put(url).body(body.clone()).send();
            let result = tokio::select! {
                _ = token.cancelled() => return Err(UploadError::Cancelled),
                result = send => result,
            };

            let reason = match result {
                // A send error means the request never produced a response:
                // connection-class, pause rather than retry.
                Err(error) => {
                    tracing::warn!(part_number, error = %error, "Connection lost during part transfer");
                    return Err(UploadError::NetworkLost);
                }
                Ok(response) if response.status().is_success() => {
                    match etag_from_response(&response) {
                        Some(etag) => {
                            tracing::debug!(part_number, %etag, "Part confirmed");
                            return Ok(PartRef { part_number, etag });
                        }
                        None => "response missing ETag header".to_string(),
                    }
                }
                Ok(response) => format!("status {}", response.status()),
            };

            if attempt >= self.config.part_attempts {
                return Err(UploadError::PartUploadFailed {
                    part_number,
                    attempts: attempt,
                    reason,
                });
            }

            let delay = self.config.part_backoff * 2u32.pow(attempt - 1);
            tracing::warn!(
                part_number,
                attempt,
                max_attempts = self.config.part_attempts,
                reason = %reason,
                "Part transfer failed, backing off"
            );
            tokio::select! {
                _ = token.cancelled() => return Err(UploadError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Re-sign URLs for exactly the remaining parts, retrying connection
    /// failures on the resume backoff schedule.
    async fn refresh_urls_with_backoff(
        &self,
        state: &ResumableState,
        remaining: Vec<u32>,
        token: &CancellationToken,
    ) -> Result<Vec<crate::api::PartUrl>, UploadError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self
                .session
                .refresh_urls(&state.link_id, &state.upload_id, remaining.clone())
                .await
            {
                Ok(fresh) => return Ok(fresh),
                Err(error) if error.is_network() && attempt < self.config.resume_attempts => {
                    let delay = self.config.resume_backoff * 2u32.pow(attempt - 1);
                    tracing::warn!(attempt, "URL refresh failed, backing off");
                    tokio::select! {
                        _ = token.cancelled() => return Err(UploadError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(error) if error.is_network() => {
                    self.set_phase(UploadPhase::Paused);
                    return Err(UploadError::NetworkLost);
                }
                Err(error) => {
                    self.set_phase(UploadPhase::Paused);
                    return Err(UploadError::InitFailed(format!(
                        "failed to refresh part URLs: {}",
                        error
                    )));
                }
            }
        }
    }

    /// Submit completion. State is cleared only on success; a rejected
    /// finalize keeps it so completion alone can be retried later.
    async fn finalize(&self, state: &ResumableState) -> Result<UploadOutcome, UploadError> {
        let parts = state.completion_parts();
        if parts.len() != state.total_parts as usize {
            self.set_phase(UploadPhase::Paused);
            return Err(UploadError::CompletionFailed(format!(
                "only {} of {} parts confirmed",
                parts.len(),
                state.total_parts
            )));
        }

        match self
            .session
            .complete(&state.link_id, Some(&state.upload_id), Some(parts))
            .await
        {
            Ok(response) => {
                self.repo.clear()?;
                self.set_phase(UploadPhase::Completed);
                tracing::info!(file_id = %response.file_id, "Upload completed");
                Ok(UploadOutcome::Completed(UploadReceipt {
                    file_id: response.file_id,
                    share_link: response.share_link,
                    file_name: response.file_name,
                }))
            }
            Err(error) if error.is_network() => {
                self.set_phase(UploadPhase::Paused);
                Err(UploadError::NetworkLost)
            }
            Err(error) => {
                self.set_phase(UploadPhase::Paused);
                Err(UploadError::CompletionFailed(error.to_string()))
            }
        }
    }

    /// Map a window failure to the caller-facing result, recording the
    /// phase it leaves the coordinator in.
    fn settle_failure(&self, error: UploadError) -> Result<RunControl, UploadError> {
        match error {
            UploadError::Cancelled => {
                if self.phase() == UploadPhase::Paused {
                    Ok(RunControl::PausedByCaller)
                } else {
                    Err(UploadError::Cancelled)
                }
            }
            UploadError::NetworkLost => {
                self.set_phase(UploadPhase::Paused);
                Err(UploadError::NetworkLost)
            }
            error @ UploadError::PartUploadFailed { .. } => {
                self.set_phase(UploadPhase::Paused);
                Err(error)
            }
            other => Err(other),
        }
    }

    fn emit(&self, tracker: &mut ProgressTracker, bytes_done: u64) {
        let update = tracker.observe(bytes_done);
        if let Some(ref observer) = self.observer {
            observer(update);
        }
    }
}

/// Pick the failure that should win when a window reports several.
/// Caller-initiated aborts outrank connection loss, which outranks
/// per-part errors.
fn worse_failure(a: UploadError, b: UploadError) -> UploadError {
    fn rank(error: &UploadError) -> u8 {
        match error {
            UploadError::Cancelled => 3,
            UploadError::NetworkLost => 2,
            _ => 1,
        }
    }
    if rank(&b) > rank(&a) {
        b
    } else {
        a
    }
}

/// ETag header value with surrounding quotes stripped.
fn etag_from_response(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get("ETag")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim_matches('"').to_string())
        .filter(|s| !s.is_empty())
}

async fn read_chunk(path: &Path, offset: u64, len: u64) -> std::io::Result<Bytes> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    let mut buf = vec![0u8; len as usize];
    file.read_exact(&mut buf).await?;
    Ok(Bytes::from(buf))
}

fn mime_for_path(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_ascii_lowercase());

    match ext.as_deref() {
        Some("txt") => "text/plain",
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("mp3") => "audio/mpeg",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        _ => "application/octet-stream",
    }
    .to_string()
}
