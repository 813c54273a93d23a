//! # Proposal Completion
//!
//! The structured-completion capability: given messages and an output
//! schema, return a parsed JSON object or a typed failure.
//!
//! Callers must treat any failure as "no result" and apply their own
//! soft-failure policy; retries, backoff and output repair all live here so
//! pipeline components never retry on their own.
//!
//! ## Failure taxonomy
//!
//! - [`CompletionError::ContextLimit`] - the document slice exceeds the
//!   model's context window; retrying the same request is pointless.
//! - [`CompletionError::Transient`] - rate limiting or timeouts; retried with
//!   exponential backoff before being reported.
//! - [`CompletionError::Validation`] - the backend answered but the output
//!   could not be repaired into JSON even after a self-correction round.
//! - [`CompletionError::Unknown`] - everything else.

mod client;
mod error;
mod repair;
pub mod testing;
mod types;

pub use client::{OpenAiCompatClient, OpenAiCompatConfig};
pub use error::{CompletionError, Result};
pub use repair::{lenient_parse, strip_markdown_fences};
pub use types::{ChatMessage, CompletionRequest, StructuredCompletion};
