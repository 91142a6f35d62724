//! Configuration management for duck-explore.
//!
//! Handles loading configuration from a TOML file and environment
//! variables. The access token is never part of the file.

use crate::auth::{DEFAULT_APP_NAME, DEFAULT_TOKEN_SERVICE_URL};
use crate::engine::EngineBackend;
use crate::error::{ExploreError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable overriding the engine endpoint.
pub const SERVER_URL_ENV_VAR: &str = "MOTHERDUCK_SERVER_URL";

/// Main configuration structure for duck-explore.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Query engine settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Token handoff settings.
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Query engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EngineConfig {
    /// Engine backend: "mock" or "duckdb".
    #[serde(default)]
    pub backend: EngineBackend,

    /// Engine server URL; the engine's own default when unset.
    pub endpoint: Option<String>,

    /// Database to open (`md:` URI or local path). DuckDB backend only.
    pub database: Option<String>,
}

impl EngineConfig {
    /// Applies `MOTHERDUCK_SERVER_URL` when no endpoint is configured.
    pub fn apply_env_defaults(&mut self) {
        if self.endpoint.is_none() {
            self.endpoint = std::env::var(SERVER_URL_ENV_VAR)
                .ok()
                .filter(|v| !v.trim().is_empty());
        }
    }

    /// Checks that a configured endpoint is an absolute URL.
    pub fn validate(&self) -> Result<()> {
        match &self.endpoint {
            Some(endpoint) => validate_endpoint(endpoint),
            None => Ok(()),
        }
    }
}

/// Checks that `endpoint` is an absolute URL.
pub fn validate_endpoint(endpoint: &str) -> Result<()> {
    Url::parse(endpoint)
        .map(|_| ())
        .map_err(|e| ExploreError::config(format!("Invalid endpoint '{endpoint}': {e}")))
}

/// Where to send the user for a token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    #[serde(default = "default_token_service_url")]
    pub token_service_url: String,

    /// Application name shown on the token request page.
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

fn default_token_service_url() -> String {
    DEFAULT_TOKEN_SERVICE_URL.to_string()
}

fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_service_url: default_token_service_url(),
            app_name: default_app_name(),
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("duck-explore")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ExploreError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            ExploreError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })?;
        config.engine.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_parse_valid_config() {
        let toml = r#"
[engine]
backend = "duckdb"
endpoint = "https://api.example.com"
database = "md:sample_data"

[auth]
token_service_url = "https://tokens.example.com"
app_name = "My Explorer"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.engine.backend, EngineBackend::Duckdb);
        assert_eq!(
            config.engine.endpoint.as_deref(),
            Some("https://api.example.com")
        );
        assert_eq!(config.engine.database.as_deref(), Some("md:sample_data"));
        assert_eq!(config.auth.token_service_url, "https://tokens.example.com");
        assert_eq!(config.auth.app_name, "My Explorer");
    }

    #[test]
    fn test_missing_optional_fields() {
        let config: Config = toml::from_str("[engine]\n").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.engine.backend, EngineBackend::Mock);
        assert_eq!(config.auth.token_service_url, DEFAULT_TOKEN_SERVICE_URL);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_file(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[auth]\napp_name = \"Explorer\"").unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.auth.app_name, "Explorer");
        assert_eq!(config.engine.endpoint, None);
    }

    #[test]
    fn test_invalid_toml_names_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine\nbackend = ").unwrap();

        let err = Config::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, ExploreError::Config(_)));
        assert!(err.to_string().contains("Configuration error in"));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine]\nendpoint = \"not a url\"").unwrap();

        let err = Config::load_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid endpoint"));
    }

    #[test]
    fn test_validate_endpoint() {
        assert!(validate_endpoint("https://api.example.com").is_ok());
        let err = validate_endpoint("api.example.com").unwrap_err();
        assert!(err.to_string().contains("Invalid endpoint 'api.example.com'"));
    }

    #[test]
    fn test_explicit_endpoint_wins_over_env() {
        let mut engine = EngineConfig {
            endpoint: Some("https://configured.example.com".to_string()),
            ..Default::default()
        };
        engine.apply_env_defaults();
        assert_eq!(
            engine.endpoint.as_deref(),
            Some("https://configured.example.com")
        );
    }

    #[test]
    fn test_default_path() {
        assert!(Config::default_path().ends_with("duck-explore/config.toml"));
    }
}
