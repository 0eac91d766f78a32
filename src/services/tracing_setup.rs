//! Tracing subscriber setup
//!
//! Shared by embedding hosts and tests. Logs go to a file so they never
//! interleave with the backend's stdio traffic.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Default filter when `RUST_LOG` is unset
const DEFAULT_DIRECTIVE: &str = "syntax_bridge=debug";

/// Install the global subscriber, logging to `log_file_path`.
///
/// Fails if the file cannot be created or a global subscriber is already set.
pub fn init_global(log_file_path: &Path) -> anyhow::Result<()> {
    let log_file = File::create(log_file_path)?;
    build_subscriber(log_file, env_filter()).try_init()?;
    Ok(())
}

/// `RUST_LOG` if set, otherwise debug output for this crate only
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Build the subscriber used by [`init_global`]
pub fn build_subscriber(
    log_file: File,
    filter: EnvFilter,
) -> impl tracing::Subscriber + Send + Sync {
    let fmt_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry().with(fmt_layer).with(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_subscriber_writes_to_file() {
        let log_file = NamedTempFile::new().unwrap();
        let subscriber = build_subscriber(
            log_file.reopen().unwrap(),
            EnvFilter::new("syntax_bridge=debug"),
        );

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!(target: "syntax_bridge::test", "decorations applied");
        });

        let contents = std::fs::read_to_string(log_file.path()).unwrap();
        assert!(contents.contains("DEBUG"));
        assert!(contents.contains("decorations applied"));
    }

    #[test]
    fn test_filter_excludes_other_targets() {
        let log_file = NamedTempFile::new().unwrap();
        let subscriber = build_subscriber(
            log_file.reopen().unwrap(),
            EnvFilter::new("syntax_bridge=warn"),
        );

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!(target: "syntax_bridge::test", "hidden");
            tracing::info!(target: "other_crate", "also hidden");
        });

        let contents = std::fs::read_to_string(log_file.path()).unwrap();
        assert!(!contents.contains("hidden"));
    }
}
