//! API router
//!
//! Parses incoming requests into typed routes for the session protocol and
//! the gated file endpoints.

use thiserror::Error;

/// Router errors
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("No route for path: {0}")]
    NotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),
}

/// API operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRoute {
    /// GET /health
    Health,
    /// POST /api/upload/init
    InitUpload,
    /// POST /api/upload/complete
    CompleteUpload,
    /// POST /api/upload/refresh-urls
    RefreshUrls,
    /// POST /api/replace/{fileId}
    Replace { file_id: String },
    /// GET /api/files/{fileId}
    FileInfo { file_id: String },
    /// POST /api/files/preview/{fileId}
    Preview { file_id: String },
    /// POST /api/files/verify/{fileId}
    Verify { file_id: String },
    /// POST /api/files/download/{fileId}
    Download { file_id: String },
}

/// Request parser
pub struct RouteParser;

impl RouteParser {
    /// Parse an HTTP method and path into an API route
    pub fn parse(method: &str, path: &str) -> Result<ApiRoute, RouterError> {
        let path = path.trim_end_matches('/');

        match (method, path) {
            ("GET", "/health") => return Ok(ApiRoute::Health),
            ("POST", "/api/upload/init") => return Ok(ApiRoute::InitUpload),
            ("POST", "/api/upload/complete") => return Ok(ApiRoute::CompleteUpload),
            ("POST", "/api/upload/refresh-urls") => return Ok(ApiRoute::RefreshUrls),
            _ => {}
        }

        if let Some(file_id) = Self::trailing_id(path, "/api/replace/") {
            return match method {
                "POST" => Ok(ApiRoute::Replace { file_id }),
                _ => Err(RouterError::MethodNotAllowed(method.to_string())),
            };
        }

        if let Some(file_id) = Self::trailing_id(path, "/api/files/preview/") {
            return match method {
                "POST" => Ok(ApiRoute::Preview { file_id }),
                _ => Err(RouterError::MethodNotAllowed(method.to_string())),
            };
        }

        if let Some(file_id) = Self::trailing_id(path, "/api/files/verify/") {
            return match method {
                "POST" => Ok(ApiRoute::Verify { file_id }),
                _ => Err(RouterError::MethodNotAllowed(method.to_string())),
            };
        }

        if let Some(file_id) = Self::trailing_id(path, "/api/files/download/") {
            return match method {
                "POST" => Ok(ApiRoute::Download { file_id }),
                _ => Err(RouterError::MethodNotAllowed(method.to_string())),
            };
        }

        if let Some(file_id) = Self::trailing_id(path, "/api/files/") {
            return match method {
                "GET" => Ok(ApiRoute::FileInfo { file_id }),
                _ => Err(RouterError::MethodNotAllowed(method.to_string())),
            };
        }

        Err(RouterError::NotFound(path.to_string()))
    }

    /// Extract a single non-empty trailing segment after `prefix`.
    fn trailing_id(path: &str, prefix: &str) -> Option<String> {
        let rest = path.strip_prefix(prefix)?;
        if rest.is_empty() || rest.contains('/') {
            return None;
        }
        Some(rest.to_string())
    }
}
