//! Configuration file loading and management.
//!
//! Loads configuration from the platform config dir
//! (`~/.config/chansync/config.toml` on Linux).
//!
//! ## Precedence
//!
//! Settings are resolved with the following precedence (highest first):
//! 1. CLI flags
//! 2. Environment variables
//! 3. Config file
//! 4. Built-in defaults
//!
//! ## Environment Variables
//!
//! - `CHANSYNC_GATEWAY_URL`: gateway base URL
//! - `CHANSYNC_GATEWAY_TOKEN`: gateway admin token
//! - `CHANSYNC_GATEWAY_USER`: gateway admin user id (New-Api-User header)
//! - `CHANSYNC_DB`: database file path
//! - `CHANSYNC_TIMEOUT`: HTTP timeout in seconds
//! - `CHANSYNC_CONFIG`: override config file path

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ChansyncError, Result};
use crate::storage::paths::AppPaths;

/// Environment variable for the gateway base URL.
pub const ENV_GATEWAY_URL: &str = "CHANSYNC_GATEWAY_URL";
/// Environment variable for the gateway admin token.
pub const ENV_GATEWAY_TOKEN: &str = "CHANSYNC_GATEWAY_TOKEN";
/// Environment variable for the gateway admin user id.
pub const ENV_GATEWAY_USER: &str = "CHANSYNC_GATEWAY_USER";
/// Environment variable for the database path.
pub const ENV_DB: &str = "CHANSYNC_DB";
/// Environment variable for the HTTP timeout in seconds.
pub const ENV_TIMEOUT: &str = "CHANSYNC_TIMEOUT";
/// Environment variable to override the config file path.
pub const ENV_CONFIG: &str = "CHANSYNC_CONFIG";

/// Default HTTP timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Config File
// =============================================================================

/// On-disk configuration file contents. All fields optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Gateway base URL.
    pub gateway_url: Option<String>,
    /// Gateway admin token.
    pub gateway_token: Option<String>,
    /// Gateway admin user id.
    pub gateway_user: Option<String>,
    /// Database file path.
    pub db_path: Option<PathBuf>,
    /// HTTP timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl ConfigFile {
    /// Load the config file if it exists.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| ChansyncError::Config(format!("invalid config {}: {e}", path.display())))
    }
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Fully resolved configuration after merging CLI, env vars, and the file.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Gateway base URL, if configured.
    pub gateway_url: Option<String>,
    /// Gateway admin token, if configured.
    pub gateway_token: Option<String>,
    /// Gateway admin user id, if configured.
    pub gateway_user: Option<String>,
    /// Database file path.
    pub db_path: PathBuf,
    /// HTTP timeout.
    pub timeout: Duration,
}

impl Settings {
    /// Resolve settings from CLI overrides, environment, and config file.
    ///
    /// # Errors
    /// Returns an error if the config file is invalid or the timeout value
    /// cannot be parsed.
    pub fn resolve(
        cli_gateway_url: Option<&str>,
        cli_db_path: Option<&Path>,
    ) -> Result<Self> {
        let paths = AppPaths::new();
        let config_path = env_var(ENV_CONFIG).map_or_else(|| paths.config_file(), PathBuf::from);
        let file = ConfigFile::load(&config_path)?;

        let gateway_url = cli_gateway_url
            .map(ToString::to_string)
            .or_else(|| env_var(ENV_GATEWAY_URL))
            .or(file.gateway_url)
            .map(|url| url.trim_end_matches('/').to_string());

        let gateway_token = env_var(ENV_GATEWAY_TOKEN).or(file.gateway_token);
        let gateway_user = env_var(ENV_GATEWAY_USER).or(file.gateway_user);

        let db_path = cli_db_path
            .map(Path::to_path_buf)
            .or_else(|| env_var(ENV_DB).map(PathBuf::from))
            .or(file.db_path)
            .unwrap_or_else(|| paths.db_file());

        let timeout_secs = match env_var(ENV_TIMEOUT) {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| ChansyncError::Config(format!("invalid {ENV_TIMEOUT}: {raw}")))?,
            None => file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            gateway_url,
            gateway_token,
            gateway_user,
            db_path,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Gateway URL and token, or an error when either is missing.
    ///
    /// # Errors
    /// Returns [`ChansyncError::GatewayNotConfigured`] when incomplete.
    pub fn gateway(&self) -> Result<(&str, &str)> {
        match (self.gateway_url.as_deref(), self.gateway_token.as_deref()) {
            (Some(url), Some(token)) => Ok((url, token)),
            _ => Err(ChansyncError::GatewayNotConfigured),
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_yields_defaults() {
        let file = ConfigFile::load(Path::new("/nonexistent/chansync/config.toml")).unwrap();
        assert!(file.gateway_url.is_none());
        assert!(file.timeout_secs.is_none());
    }

    #[test]
    fn config_file_parses_known_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "gateway_url = \"https://gw.example.com\"\n\
             gateway_token = \"tok\"\n\
             timeout_secs = 5\n",
        )
        .unwrap();

        let file = ConfigFile::load(&path).unwrap();
        assert_eq!(file.gateway_url.as_deref(), Some("https://gw.example.com"));
        assert_eq!(file.gateway_token.as_deref(), Some("tok"));
        assert_eq!(file.timeout_secs, Some(5));
    }

    #[test]
    fn invalid_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "gateway_url = [1,2,3]").unwrap();
        assert!(ConfigFile::load(&path).is_err());
    }

    #[test]
    fn gateway_requires_url_and_token() {
        let settings = Settings {
            gateway_url: Some("https://gw.example.com".into()),
            gateway_token: None,
            gateway_user: None,
            db_path: PathBuf::from("x.sqlite"),
            timeout: Duration::from_secs(30),
        };
        assert!(settings.gateway().is_err());

        let settings = Settings {
            gateway_token: Some("tok".into()),
            ..settings
        };
        let (url, token) = settings.gateway().unwrap();
        assert_eq!(url, "https://gw.example.com");
        assert_eq!(token, "tok");
    }
}
