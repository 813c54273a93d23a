use serde::{Deserialize, Serialize};

/// One chunk of document text submitted for indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub text: String,

    /// Page the chunk came from, when layout information is available
    pub page_number: Option<u32>,

    /// Opaque provenance reference, e.g. `file.md:start..end`
    pub source_ref: String,
}

impl IndexedChunk {
    pub fn new(text: impl Into<String>, page_number: Option<u32>, source_ref: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page_number,
            source_ref: source_ref.into(),
        }
    }
}

/// One similarity-search match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub text: String,

    pub page_number: Option<u32>,

    pub source_ref: String,

    /// Cosine distance in `[0, 2]`; 0 is an exact match
    pub distance: f32,
}
