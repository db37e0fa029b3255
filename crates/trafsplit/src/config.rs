// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client configuration.
//!
//! Resolved from, in increasing priority: built-in defaults, an optional
//! TOML file, then environment variables.
//!
//! ```toml
//! api_base_url = "https://split.example.com"
//! state_dir = "/var/lib/trafsplit"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable selecting the backend base URL.
pub const ENV_API_BASE_URL: &str = "TRAFSPLIT_API_BASE_URL";

/// Environment variable selecting the local state directory.
pub const ENV_STATE_DIR: &str = "TRAFSPLIT_STATE_DIR";

/// Backend used when nothing else is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL, without the `/api` suffix.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Directory holding the local key-value store (order, token).
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".trafsplit")
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            state_dir: default_state_dir(),
        }
    }
}

impl ClientConfig {
    /// Create a new config builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults (or `file` when given) overridden by the environment.
    pub fn resolve(file: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = base.with_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_BASE_URL).filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(dir) = lookup(ENV_STATE_DIR).filter(|v| !v.is_empty()) {
            self.state_dir = PathBuf::from(dir);
        }
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api_base_url.trim();
        if url.is_empty() {
            return Err(ConfigError::Invalid("api_base_url is empty".into()));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "api_base_url must start with http:// or https:// (got {})",
                url
            )));
        }
        Ok(())
    }

    /// Base URL without trailing slashes.
    pub fn base_url(&self) -> &str {
        self.api_base_url.trim().trim_end_matches('/')
    }
}

/// Config builder for fluent API.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    api_base_url: Option<String>,
    state_dir: Option<PathBuf>,
}

impl ClientConfigBuilder {
    /// Set the backend base URL.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Set the local state directory.
    pub fn state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            api_base_url: self.api_base_url.unwrap_or(defaults.api_base_url),
            state_dir: self.state_dir.unwrap_or(defaults.state_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:8080");
        assert_eq!(config.state_dir, PathBuf::from(".trafsplit"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::builder()
            .api_base_url("https://split.example.com/")
            .state_dir("/tmp/ts")
            .build();
        assert_eq!(config.base_url(), "https://split.example.com");
        assert_eq!(config.state_dir, PathBuf::from("/tmp/ts"));
    }

    #[test]
    fn test_env_overrides() {
        let config = ClientConfig::default().with_env(|key| match key {
            ENV_API_BASE_URL => Some("http://backend:9000".into()),
            ENV_STATE_DIR => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.api_base_url, "http://backend:9000");
        // empty values are ignored
        assert_eq!(config.state_dir, PathBuf::from(".trafsplit"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_base_url = \"https://cfg.example.com\"").unwrap();
        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.api_base_url, "https://cfg.example.com");
        assert_eq!(config.state_dir, PathBuf::from(".trafsplit"));
    }

    #[test]
    fn test_invalid_scheme() {
        let config = ClientConfig::builder().api_base_url("ftp://x").build();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
