use thiserror::Error;

/// Result type for completion operations
pub type Result<T> = std::result::Result<T, CompletionError>;

/// Typed failures of the structured-completion capability
#[derive(Error, Debug, Clone)]
pub enum CompletionError {
    /// The request exceeds the model's context window; callers should choose
    /// a different strategy (e.g. smaller chunks) rather than retry
    #[error("Context window exceeded")]
    ContextLimit,

    /// Rate limiting, timeouts and similar; already retried with backoff
    /// before being reported
    #[error("Transient backend failure: {0}")]
    Transient(String),

    /// The backend answered but the output could not be repaired into the
    /// expected shape
    #[error("Response validation failed: {0}")]
    Validation(String),

    /// Anything else
    #[error("Completion failed: {0}")]
    Unknown(String),
}

impl CompletionError {
    /// Whether retrying the same request may help
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
