//! QuickDrop Library
//!
//! File sharing with resumable chunked uploads straight to object storage.
//!
//! # Components
//!
//! - **Session protocol server**: stateless HTTP endpoints that allocate
//!   share links, presign upload URLs, and gate downloads by expiry,
//!   download limit, password, and scheduled release
//! - **Upload coordinator**: client-side resumable multipart uploader with
//!   bounded-concurrency transfer windows and persisted resume state
//! - **Blob store gateway**: presigned-URL contract over S3-compatible
//!   storage
//!
//! # Example
//!
//! ```no_run
//! use quickdrop::{config::Config, server::Server};
//! use quickdrop::blob::S3BlobStore;
//! use quickdrop::store::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let blob = Arc::new(S3BlobStore::new(&config.storage).await);
//!     let store = Arc::new(MemoryStore::new());
//!     let server = Server::bind(config, store, blob).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod blob;
pub mod config;
pub mod gate;
pub mod router;
pub mod server;
pub mod store;
pub mod uploader;

// Re-export commonly used types
pub use config::Config;
pub use server::Server;
pub use uploader::UploadCoordinator;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
