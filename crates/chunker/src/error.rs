use thiserror::Error;

/// Result type for splitter operations
pub type Result<T> = std::result::Result<T, SplitterError>;

/// Errors that can occur while splitting or reading chunks
#[derive(Error, Debug)]
pub enum SplitterError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid chunk boundaries
    #[error("Invalid chunk boundaries: start={start}, end={end}")]
    InvalidBoundaries { start: usize, end: usize },
}

impl SplitterError {
    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
