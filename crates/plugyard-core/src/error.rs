//! Core error types.

/// Errors raised while parsing or checking domain values.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Platform name not recognized.
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    /// Visibility name not recognized.
    #[error("unknown visibility: {0}")]
    UnknownVisibility(String),
}
