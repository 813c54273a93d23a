//! # Proposal Chunker
//!
//! Byte-range document splitting for the map-reduce analysis pipeline.
//!
//! ## Design
//!
//! Documents can be large enough that carrying their full text through a
//! durable workflow history is prohibitive. The chunker therefore never
//! materializes text eagerly: it emits lightweight [`ChunkDefinition`]
//! byte ranges, and consumers re-open the source file and decode only the
//! slice they need.
//!
//! ```text
//! Markdown file (bytes)
//!     │
//!     ├──> Tentative cut at start + chunk_size
//!     │      └─> Snap back to the last newline in the trailing window
//!     │
//!     ├──> Record [start, end)
//!     │
//!     └──> Next start = end - overlap,
//!          advanced past UTF-8 continuation bytes
//! ```
//!
//! Boundary alignment guarantees that every chunk *starts* on a character
//! boundary; decoding still tolerates stray invalid sequences because the
//! overlap window may cut a multi-byte character elsewhere in the slice.

mod config;
mod error;
mod splitter;
mod types;

pub use config::SplitterConfig;
pub use error::{Result, SplitterError};
pub use splitter::ChunkSplitter;
pub use types::{decode_dropping_invalid, ChunkDefinition};
