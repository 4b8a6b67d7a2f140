//! Configuration loader with environment variable expansion

use super::{expand_env_vars, Config, ConfigError};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let expanded = expand_env_vars(&content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_minimal_config() {
        let yaml = r#"
server:
  address: "127.0.0.1:5000"
  public_url: "http://localhost:3000"
storage:
  bucket: "quickdrop-files"
  region: "us-east-1"
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.storage.bucket, "quickdrop-files");
        assert_eq!(config.upload.concurrent_parts, 8);
    }

    #[test]
    fn test_load_rejects_invalid() {
        let yaml = r#"
server:
  address: "127.0.0.1:5000"
  public_url: "not-a-url"
storage:
  bucket: "quickdrop-files"
  region: "us-east-1"
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        assert!(ConfigLoader::load(file.path()).is_err());
    }
}
