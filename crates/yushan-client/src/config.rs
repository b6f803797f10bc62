//! Client configuration
//!
//! Config precedence: explicit path > YUSHAN_CONFIG env var > default
//! filename. `YUSHAN_API_URL` overrides the configured base URL so deploy
//! environments can retarget the client without editing the file.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub app: AppConfig,
}

/// API connection settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Host application settings
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Deployment path prefix prepended to redirect targets, e.g. "/yushan"
    /// when the app is served from a subdirectory. Empty for root deploys.
    #[serde(default)]
    pub base_path: String,
    /// Where the signed-in session's tokens are persisted
    #[serde(default = "default_credentials_file")]
    pub credentials_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            credentials_file: default_credentials_file(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("yushan-client/{}", env!("CARGO_PKG_VERSION"))
}

fn default_credentials_file() -> PathBuf {
    PathBuf::from("yushan-credentials.json")
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("reading config {}: {e}", path.display())))?;
        let mut config: Config =
            toml::from_str(&contents).map_err(|e| Error::Config(format!("parsing config: {e}")))?;

        if let Ok(url) = std::env::var("YUSHAN_API_URL") {
            config.api.base_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate field constraints shared by file and programmatic construction.
    pub fn validate(&self) -> Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be greater than 0".into()));
        }

        // A non-empty base_path must be an absolute path segment so the
        // redirect target stays well-formed.
        if !self.app.base_path.is_empty() && !self.app.base_path.starts_with('/') {
            return Err(Error::Config(format!(
                "base_path must start with '/', got: {}",
                self.app.base_path
            )));
        }

        Ok(())
    }

    /// Resolve config file path from an explicit arg or YUSHAN_CONFIG env var.
    pub fn resolve_path(explicit: Option<&str>) -> PathBuf {
        if let Some(p) = explicit {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("YUSHAN_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("yushan-client.toml")
    }
}
