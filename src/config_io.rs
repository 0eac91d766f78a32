//! Config file loading.
//!
//! Separated from config.rs so the config types stay free of I/O.

use crate::config::{Config, ConfigError};
use std::path::Path;

/// Parse and validate a config from JSON text
pub fn parse_config(text: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(text)?;
    config.validate()?;
    Ok(config)
}

/// Load the config at `path`, falling back to defaults when the file does
/// not exist
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            tracing::debug!("loading config from {}", path.display());
            parse_config(&text)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("no config at {}, using defaults", path.display());
            Ok(Config::default())
        }
        Err(e) => Err(e.into()),
    }
}
