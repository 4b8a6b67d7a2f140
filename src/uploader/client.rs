//! HTTP client for the upload session protocol.
//!
//! Thin typed wrapper over the three endpoints the coordinator calls:
//! init, refresh-urls, and complete. Connection-level failures are kept
//! distinct from server status errors because the coordinator reacts
//! differently to each (pause vs. surface).

use crate::api::{
    CompleteUploadRequest, CompleteUploadResponse, ErrorBody, InitUploadRequest,
    InitUploadResponse, PartRef, PartUrl, RefreshUrlsRequest, RefreshUrlsResponse,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Session protocol errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Connection-level failure: the request never produced a response.
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed server response: {0}")]
    Decode(String),
}

impl ProtocolError {
    /// Whether this failure is connection-class (pause-worthy) rather than
    /// a server-side rejection.
    pub fn is_network(&self) -> bool {
        matches!(self, ProtocolError::Network(_))
    }
}

/// Typed client for the session protocol endpoints.
#[derive(Clone)]
pub struct SessionClient {
    http: reqwest::Client,
    base_url: String,
}

impl SessionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `POST /api/upload/init`
    pub async fn init(
        &self,
        request: &InitUploadRequest,
    ) -> Result<InitUploadResponse, ProtocolError> {
        self.post_json("/api/upload/init", request).await
    }

    /// `POST /api/upload/refresh-urls`
    pub async fn refresh_urls(
        &self,
        file_id: &str,
        upload_id: &str,
        part_numbers: Vec<u32>,
    ) -> Result<Vec<PartUrl>, ProtocolError> {
        let request = RefreshUrlsRequest {
            file_id: file_id.to_string(),
            upload_id: upload_id.to_string(),
            part_numbers,
        };
        let response: RefreshUrlsResponse =
            self.post_json("/api/upload/refresh-urls", &request).await?;
        Ok(response.part_urls)
    }

    /// `POST /api/upload/complete`
    pub async fn complete(
        &self,
        file_id: &str,
        upload_id: Option<&str>,
        parts: Option<Vec<PartRef>>,
    ) -> Result<CompleteUploadResponse, ProtocolError> {
        let request = CompleteUploadRequest {
            file_id: file_id.to_string(),
            upload_id: upload_id.map(str::to_string),
            parts,
        };
        self.post_json("/api/upload/complete", &request).await
    }

    async fn post_json<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp, ProtocolError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ProtocolError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(ProtocolError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| ProtocolError::Decode(e.to_string()))
    }
}
