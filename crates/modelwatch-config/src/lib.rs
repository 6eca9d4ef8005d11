//! Configuration schema and endpoint seed catalog.
//!
//! This crate defines the settings the modelwatch crates read at startup:
//!
//! - [`AppConfig`] — Top-level configuration with `server` and `probe` sections
//! - [`ProbePolicy`] — Attempt count, retry delay, and synthetic request parameters
//! - [`ServerConfig`] — Bind address, database path, seed directory
//! - [`ModelCatalog`] — Endpoint records loaded from JSON files for seeding
//!
//! Every field has a default, so an empty JSON object is a valid config.
//!
//! # Loading from JSON
//!
//! ```rust
//! use modelwatch_config::AppConfig;
//!
//! let config = AppConfig::from_json(r#"{ "probe": { "max_attempts": 3 } }"#).unwrap();
//! assert_eq!(config.probe.max_attempts, 3);
//! assert_eq!(config.probe.retry_delay_ms, 3000);
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use modelwatch_core::{MessageRole, ModelEndpoint, ModelEndpointId, TestModelRequest};
use serde::{Deserialize, Serialize};

/// Prompt used by automatic probes.
pub const DEFAULT_TEST_PROMPT: &str = "Hello, this is a test message. Please respond.";

/// Upper bound for a single test request's timeout.
pub const MAX_TIMEOUT_SECS: u64 = 600;

/// Errors that can occur when loading or parsing configurations.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse JSON configuration.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A configuration value is out of range.
    #[error("Invalid config value '{field}': {message}")]
    Validation { field: String, message: String },
}

impl ConfigError {
    /// Creates an IO error with path context.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Retry policy and request parameters for endpoint health probes.
///
/// | Field | Default |
/// |-------|---------|
/// | `max_attempts` | 5 |
/// | `retry_delay_ms` | 3000 |
/// | `temperature` | 0.1 |
/// | `probe_max_tokens` / `probe_timeout_secs` | 20 / 2 |
/// | `manual_max_tokens` / `manual_timeout_secs` | 50 / 3 |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbePolicy {
    /// Attempts per probe sequence.
    pub max_attempts: u32,
    /// Fixed wait between a failed attempt and the next one.
    pub retry_delay_ms: u64,
    /// Prompt sent by automatic probes.
    pub test_prompt: String,
    pub temperature: f32,
    pub probe_max_tokens: u32,
    pub probe_timeout_secs: u64,
    pub manual_max_tokens: u32,
    pub manual_timeout_secs: u64,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay_ms: 3000,
            test_prompt: DEFAULT_TEST_PROMPT.to_string(),
            temperature: 0.1,
            probe_max_tokens: 20,
            probe_timeout_secs: 2,
            manual_max_tokens: 50,
            manual_timeout_secs: 3,
        }
    }
}

impl ProbePolicy {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Builds the request sent on each attempt of an automatic probe.
    pub fn probe_request(&self, model_id: &ModelEndpointId) -> TestModelRequest {
        TestModelRequest {
            model_id: model_id.clone(),
            completion_role: MessageRole::User,
            completion_content: self.test_prompt.clone(),
            temperature: self.temperature,
            max_tokens: self.probe_max_tokens,
            timeout: self.probe_timeout_secs,
        }
    }

    /// Builds the single request of a user-initiated test.
    pub fn manual_request(&self, model_id: &ModelEndpointId, message: &str) -> TestModelRequest {
        TestModelRequest {
            model_id: model_id.clone(),
            completion_role: MessageRole::User,
            completion_content: message.to_string(),
            temperature: self.temperature,
            max_tokens: self.manual_max_tokens,
            timeout: self.manual_timeout_secs,
        }
    }

    /// Checks that the policy can run at least one attempt.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::validation("probe.max_attempts", "must be at least 1"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::validation("probe.temperature", "must be within 0.0..=2.0"));
        }
        for (field, secs) in [
            ("probe.probe_timeout_secs", self.probe_timeout_secs),
            ("probe.manual_timeout_secs", self.manual_timeout_secs),
        ] {
            if !(1..=MAX_TIMEOUT_SECS).contains(&secs) {
                return Err(ConfigError::validation(
                    field,
                    format!("must be within 1..={MAX_TIMEOUT_SECS}"),
                ));
            }
        }
        Ok(())
    }
}

/// HTTP server and storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// SQLite database path for the endpoint registry.
    pub database_url: String,
    /// Directory of endpoint seed files; seeding is skipped if it does not exist.
    pub models_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".into(),
            database_url: "data/models.db".into(),
            models_dir: "models".into(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub probe: ProbePolicy,
}

impl AppConfig {
    /// Loads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::io(path.display().to_string(), e))?;
        Self::from_json(&content)
    }

    /// Parses and validates a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.probe.validate()?;
        Ok(config)
    }

    /// Applies overrides from a key lookup (normally `std::env::var`).
    ///
    /// Recognized keys: `BIND_ADDR`, `DATABASE_URL`, `MODELS_DIR`.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.server.database_url = url;
        }
        if let Some(dir) = lookup("MODELS_DIR") {
            self.server.models_dir = dir;
        }
        self
    }
}

/// Endpoint records loaded from seed files.
#[derive(Debug, Default)]
pub struct ModelCatalog {
    models: BTreeMap<ModelEndpointId, ModelEndpoint>,
}

impl ModelCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads all JSON seed files from a directory.
    ///
    /// Each `.json` file holds either a single [`ModelEndpoint`] or an array of them.
    pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let mut catalog = Self::new();

        let entries = fs::read_dir(dir)
            .map_err(|e| ConfigError::io(dir.display().to_string(), e))?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let content = fs::read_to_string(&path)
                    .map_err(|e| ConfigError::io(path.display().to_string(), e))?;
                catalog.extend_from_json(&content)?;
            }
        }

        Ok(catalog)
    }

    /// Parses one seed document and adds its endpoints.
    pub fn extend_from_json(&mut self, json: &str) -> Result<(), ConfigError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum SeedFile {
            One(ModelEndpoint),
            Many(Vec<ModelEndpoint>),
        }

        let endpoints = match serde_json::from_str(json)? {
            SeedFile::One(endpoint) => vec![endpoint],
            SeedFile::Many(endpoints) => endpoints,
        };
        for endpoint in endpoints {
            self.models.insert(endpoint.model_id.clone(), endpoint);
        }
        Ok(())
    }

    /// Gets a seed by ID.
    pub fn get(&self, id: &ModelEndpointId) -> Option<&ModelEndpoint> {
        self.models.get(id)
    }

    /// Returns all loaded seeds, ordered by id.
    pub fn list(&self) -> Vec<&ModelEndpoint> {
        self.models.values().collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
