use thiserror::Error;

/// Errors surfaced by the protocol extension client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("language server is not running")]
    NotRunning,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request {method} timed out")]
    Timeout { method: String },

    #[error("server returned error {code}: {message}")]
    Server { code: i64, message: String },

    #[error("invalid payload: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{method} returned {actual} results for {expected} inputs")]
    LengthMismatch {
        method: &'static str,
        expected: usize,
        actual: usize,
    },
}
