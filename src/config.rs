//! Bridge configuration
//!
//! Everything here is static for the lifetime of a connection: it is read
//! once at activation and never reloaded.

use crate::services::virtual_document::syntax_tree_uri;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Backend process configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ServerConfig {
    /// Command to spawn the backend
    pub command: String,

    /// Arguments to pass to the backend
    pub args: Vec<String>,

    /// Working directory for the backend process
    pub cwd: PathBuf,

    /// Passed as `initializationOptions` in the initialize request
    pub initialization_options: Option<serde_json::Value>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: "m".to_string(),
            args: Vec::new(),
            cwd: PathBuf::from("."),
            initialization_options: None,
        }
    }
}

/// Top-level bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,

    /// Language id of documents the commands act on
    pub language_id: String,

    /// URI scheme of real documents synced with the backend
    pub document_scheme: String,

    /// URI scheme of the syntax tree virtual document
    pub virtual_scheme: String,

    /// Delay between an edit and the virtual document invalidation (ms)
    pub invalidation_delay_ms: u64,

    /// Cancel a pending invalidation when a newer edit arrives
    pub coalesce_invalidations: bool,

    /// Discard command responses overtaken by a newer invocation on the same view
    pub drop_stale_responses: bool,

    /// Fail backend requests that take longer than this (ms). No limit when unset.
    pub request_timeout_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            language_id: "rust".to_string(),
            document_scheme: "file".to_string(),
            virtual_scheme: "libsyntax-rust".to_string(),
            invalidation_delay_ms: 10,
            coalesce_invalidations: false,
            drop_stale_responses: false,
            request_timeout_ms: None,
        }
    }
}

impl Config {
    pub fn invalidation_delay(&self) -> Duration {
        Duration::from_millis(self.invalidation_delay_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Check the values that would otherwise fail later at activation
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.command.trim().is_empty() {
            return Err(ConfigError::Validation(
                "server.command must not be empty".to_string(),
            ));
        }
        if self.language_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "language_id must not be empty".to_string(),
            ));
        }
        if syntax_tree_uri(&self.virtual_scheme).is_none() {
            return Err(ConfigError::Validation(format!(
                "virtual_scheme {:?} is not a valid URI scheme",
                self.virtual_scheme
            )));
        }
        Ok(())
    }

    /// JSON Schema describing the config file
    pub fn json_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(Config)).unwrap_or_default()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}
