//! HTTP server for the upload session protocol.
//!
//! Built directly on `hyper` and `tokio`: each accepted connection runs in
//! its own task, and connection errors are logged without stopping the
//! accept loop. Handlers live in [`handlers`]; this module owns binding,
//! routing, and request-body plumbing.

use crate::blob::BlobStore;
use crate::config::Config;
use crate::router::{ApiRoute, RouteParser, RouterError};
use crate::store::SessionStore;
use http_body_util::BodyExt;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{body::Incoming, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

pub mod handlers;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),

    #[error("Server error: {0}")]
    RuntimeError(String),
}

/// Shared handler dependencies.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn SessionStore>,
    pub blob: Arc<dyn BlobStore>,
}

/// Session protocol HTTP server.
pub struct Server {
    state: Arc<AppState>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Bind to the configured address. Port 0 asks the OS for a free port;
    /// use [`local_addr`](Self::local_addr) to discover it.
    pub async fn bind(
        config: Config,
        store: Arc<dyn SessionStore>,
        blob: Arc<dyn BlobStore>,
    ) -> Result<Self, ServerError> {
        let addr: SocketAddr = config
            .server
            .address
            .parse()
            .map_err(|e| ServerError::BindError(format!("Invalid address: {}", e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        info!("Server bound to {}", local_addr);

        Ok(Self {
            state: Arc::new(AppState {
                config,
                store,
                blob,
            }),
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until a fatal listener error.
    pub async fn run(self) -> Result<(), ServerError> {
        info!("Starting server on {}", self.local_addr);

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let state = Arc::clone(&self.state);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                let service = service_fn(move |req| {
                    let state = Arc::clone(&state);
                    async move { handle_request(req, state).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection from {}: {}", peer_addr, e);
                }
            });
        }
    }
}

/// Route one request and dispatch to its handler.
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<String>, hyper::Error> {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let route = match RouteParser::parse(&method, &path) {
        Ok(route) => route,
        Err(RouterError::NotFound(_)) => {
            return Ok(plain_response(StatusCode::NOT_FOUND, "Not Found"));
        }
        Err(RouterError::MethodNotAllowed(_)) => {
            return Ok(plain_response(
                StatusCode::METHOD_NOT_ALLOWED,
                "Method Not Allowed",
            ));
        }
    };

    info!("Handling {} {}", method, path);

    let response = match route {
        ApiRoute::Health => plain_response(StatusCode::OK, "ok"),
        ApiRoute::InitUpload => match read_json(req).await? {
            Ok(body) => handlers::init_upload(&state, body).await,
            Err(response) => response,
        },
        ApiRoute::CompleteUpload => match read_json(req).await? {
            Ok(body) => handlers::complete_upload(&state, body).await,
            Err(response) => response,
        },
        ApiRoute::RefreshUrls => match read_json(req).await? {
            Ok(body) => handlers::refresh_urls(&state, body).await,
            Err(response) => response,
        },
        ApiRoute::Replace { file_id } => match read_json(req).await? {
            Ok(body) => handlers::replace_content(&state, &file_id, body).await,
            Err(response) => response,
        },
        ApiRoute::FileInfo { file_id } => handlers::file_info(&state, &file_id).await,
        ApiRoute::Preview { file_id } => match read_json_or_default(req).await? {
            Ok(body) => handlers::preview(&state, &file_id, body).await,
            Err(response) => response,
        },
        ApiRoute::Verify { file_id } => match read_json_or_default(req).await? {
            Ok(body) => handlers::verify_password(&state, &file_id, body).await,
            Err(response) => response,
        },
        ApiRoute::Download { file_id } => match read_json_or_default(req).await? {
            Ok(body) => handlers::download(&state, &file_id, body).await,
            Err(response) => response,
        },
    };

    Ok(response)
}

/// Collect and parse a JSON request body. Malformed bodies short-circuit
/// into a 400 response.
async fn read_json<T: DeserializeOwned>(
    req: Request<Incoming>,
) -> Result<Result<T, Response<String>>, hyper::Error> {
    let bytes = req.into_body().collect().await?.to_bytes();
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(Ok(value)),
        Err(e) => Ok(Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid request body: {}", e),
        ))),
    }
}

/// Like [`read_json`], but an empty body parses as the type's default.
async fn read_json_or_default<T: DeserializeOwned + Default>(
    req: Request<Incoming>,
) -> Result<Result<T, Response<String>>, hyper::Error> {
    let bytes = req.into_body().collect().await?.to_bytes();
    if bytes.is_empty() {
        return Ok(Ok(T::default()));
    }
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(Ok(value)),
        Err(e) => Ok(Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid request body: {}", e),
        ))),
    }
}

pub(crate) fn plain_response(status: StatusCode, body: &str) -> Response<String> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain")
        .body(body.to_string())
        .expect("Failed to build response")
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<String> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(json)
        .expect("Failed to build response")
}

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response<String> {
    json_response(status, &crate::api::ErrorBody::new(message))
}
