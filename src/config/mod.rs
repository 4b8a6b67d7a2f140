//! Configuration module for QuickDrop
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
fn expand_env_vars(s: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]+))?\}").unwrap();
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in re.captures_iter(s) {
        let full_match = cap.get(0).unwrap();
        let var_name = cap.get(1).unwrap().as_str();

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name) {
            Ok(val) => val,
            Err(_) => {
                if let Some(default) = cap.get(2) {
                    default.as_str().to_string()
                } else {
                    full_match.as_str().to_string()
                }
            }
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);

    result
}

fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_http_url(&self.server.public_url) {
            return Err(ConfigError::ValidationError(
                "Invalid public_url: must start with http:// or https://".into(),
            ));
        }

        if self.storage.bucket.is_empty() {
            return Err(ConfigError::ValidationError(
                "Storage bucket must not be empty".into(),
            ));
        }

        if let Some(ref endpoint) = self.storage.endpoint {
            if !is_valid_http_url(endpoint) {
                return Err(ConfigError::ValidationError(
                    "Invalid storage endpoint: must start with http:// or https://".into(),
                ));
            }
        }

        if self.upload.part_size == 0 {
            return Err(ConfigError::ValidationError(
                "Upload part_size must be greater than zero".into(),
            ));
        }

        if self.upload.concurrent_parts == 0 {
            return Err(ConfigError::ValidationError(
                "Upload concurrent_parts must be greater than zero".into(),
            ));
        }

        if self.upload.multipart_threshold < self.upload.part_size {
            return Err(ConfigError::ValidationError(
                "multipart_threshold must be at least part_size".into(),
            ));
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address, e.g. "0.0.0.0:5000"
    pub address: String,

    /// Public base URL used to build share links, e.g. "https://quickdrop.io"
    pub public_url: String,
}

/// Object storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
}

/// Upload tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Files larger than this use multipart upload
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold: u64,

    /// Size of each multipart part (the last part may be shorter)
    #[serde(default = "default_part_size")]
    pub part_size: u64,

    /// Number of parts transferred concurrently per window
    #[serde(default = "default_concurrent_parts")]
    pub concurrent_parts: usize,

    /// Lifetime of presigned part PUT URLs in seconds
    #[serde(default = "default_part_url_ttl")]
    pub part_url_ttl_secs: u64,

    /// Lifetime of presigned download URLs in seconds
    #[serde(default = "default_download_url_ttl")]
    pub download_url_ttl_secs: u64,

    /// Lifetime of presigned preview URLs in seconds
    #[serde(default = "default_preview_url_ttl")]
    pub preview_url_ttl_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            multipart_threshold: default_multipart_threshold(),
            part_size: default_part_size(),
            concurrent_parts: default_concurrent_parts(),
            part_url_ttl_secs: default_part_url_ttl(),
            download_url_ttl_secs: default_download_url_ttl(),
            preview_url_ttl_secs: default_preview_url_ttl(),
        }
    }
}

fn default_multipart_threshold() -> u64 {
    104857600 // 100MB
}

fn default_part_size() -> u64 {
    104857600 // 100MB
}

fn default_concurrent_parts() -> usize {
    8
}

fn default_part_url_ttl() -> u64 {
    3600
}

fn default_download_url_ttl() -> u64 {
    3600
}

fn default_preview_url_ttl() -> u64 {
    300
}
