//! Error types for progress registration.

/// Result type for progress registration.
pub type Result<T> = std::result::Result<T, ProgressError>;

/// Errors raised synchronously by the progress channel itself.
///
/// Failures of the wrapped work, and failures returned by listeners, are
/// never wrapped in this type: they surface unchanged as the future's
/// rejection reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProgressError {
    /// The handler passed to `register_progress` cannot be invoked
    #[error("Invalid progress handler: {0}")]
    InvalidHandler(String),
}

impl ProgressError {
    pub(crate) fn not_invocable() -> Self {
        ProgressError::InvalidHandler("handler is not invocable".to_string())
    }
}
