//! # Proposal Facts
//!
//! Domain model for document analysis: extracted facts, requirement items,
//! budget matrices, and the two pure algorithms operating on them.
//!
//! ## Structure
//!
//! - typed model - facts extracted per chunk and merged per document,
//!   requirement items, the dense budget matrix
//! - [`normalize`] - the schema-normalization boundary between raw LLM JSON
//!   and typed domain objects; one pure function per known shape variant
//! - [`merge`] - the deterministic voting/dedup reduction over partial
//!   per-chunk extractions
//!
//! Completion backends return structurally inconsistent JSON (lists where
//! maps are expected, aliased field names, stringified objects). All of that
//! tolerance lives in [`normalize`]; business logic only ever sees the typed
//! model.

mod budget;
pub mod merge;
pub mod normalize;
mod requirement;
mod types;

pub use budget::{BudgetMatrix, BudgetReport, RateCard, RoleEstimate, StageEstimate};
pub use merge::merge_extracted;
pub use requirement::{Importance, RequirementItem, RequirementsReport};
pub use types::{
    AnalysisReport, EnrichedFacts, ExtractedFacts, FeatureCategory, FeatureEstimate, FeatureItem,
    KeyFeatures, RequirementIssue, SourceText, PROJECT_TYPES,
};
