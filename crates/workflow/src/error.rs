use proposal_vector_index::VectorIndexError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkflowError>;

#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Conversion and the OCR fallback both produced no text; fatal to the run
    #[error("Failed to parse document: {0}")]
    ConversionFailed(String),

    /// The converted document split into zero chunks; fatal to the run
    #[error("No text content found in document")]
    NoContent,

    /// An approval signal arrived for a run that cannot accept it
    #[error("Signal rejected: {0}")]
    SignalRejected(String),

    /// The persisted run is terminal or otherwise cannot continue
    #[error("Run is not resumable: {0}")]
    NotResumable(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A persisted snapshot was written by an incompatible version
    #[error("Snapshot schema version mismatch: found {found}, expected {expected}")]
    SchemaVersion { found: u32, expected: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Vector index error: {0}")]
    Index(#[from] VectorIndexError),
}
