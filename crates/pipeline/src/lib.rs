//! # Proposal Pipeline
//!
//! The per-chunk analysis units and per-document reducers of the map-reduce
//! pipeline.
//!
//! ## Data flow
//!
//! ```text
//! ChunkDefinition ──┬──> ExtractionUnit ──────────> ExtractedFacts (partial)
//!                   └──> RequirementAnalysisUnit ─> [RequirementItem]
//!
//! [RequirementItem] ──> ReverseRagRefiner ──> enriched items
//! [ExtractedFacts]  ──> merge_extracted  ───> document facts
//!
//! facts + items ──> ProjectAnalyzer ──> EnrichedFacts (+hour estimates)
//! facts          ──> BudgetEstimator ─> BudgetMatrix (dense)
//! facts + budget ──> ProposalWriter ──> proposal markdown
//! ```
//!
//! Every unit that talks to the completion backend follows the same
//! soft-failure policy: a failed call degrades to the unit's zero value and
//! is logged, so one bad chunk can never abort a whole document run.

mod analyze;
mod budget;
mod extract;
mod proposal;
mod refine;
mod requirements;

pub use analyze::{ProjectAnalyzer, DEFAULT_FEATURE_HOURS, MAX_RAG_CONTEXT_ITEMS, TOOL_ANALYZE};
pub use budget::{BudgetEstimator, TOOL_BUDGET};
pub use extract::{ChunkExtraction, ExtractionUnit, TOOL_EXTRACT};
pub use proposal::{ProposalWriter, TOOL_PROPOSAL};
pub use refine::{ReverseRagRefiner, DEFAULT_MIN_CONFIDENCE};
pub use requirements::{RequirementAnalysisUnit, TOOL_REQUIREMENTS};

use schemars::JsonSchema;
use serde_json::Value;

/// JSON schema of a wire type, rendered for prompt injection.
pub(crate) fn schema_value<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null)
}
