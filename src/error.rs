//! Error types for the trigger engine.

/// Top-level error type for the scheduled-trigger engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Caller-supplied input was rejected (empty message, past time,
    /// out-of-range coordinates).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// OS trigger service refused an arm/register call (permission denied,
    /// region slots exhausted, wake-up registration failure).
    #[error("scheduling error: {0}")]
    Scheduling(String),

    /// Store read/write failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything that does not fit the taxonomy above.
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl From<crate::store::StoreError> for EngineError {
    fn from(e: crate::store::StoreError) -> Self {
        Self::Persistence(e.to_string())
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, EngineError>;
