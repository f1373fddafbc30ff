//! Error types for the Society core.

/// Core error type for process-level infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum SocietyError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for Society infrastructure operations.
pub type SocietyResult<T> = Result<T, SocietyError>;
