use thiserror::Error;

pub type Result<T> = std::result::Result<T, VectorIndexError>;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },
}
