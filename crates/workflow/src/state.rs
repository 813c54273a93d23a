use proposal_chunker::ChunkDefinition;
use proposal_facts::{BudgetMatrix, EnrichedFacts, ExtractedFacts, RateCard, RequirementItem};
use serde::{Deserialize, Serialize};

/// Lifecycle status of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail")]
pub enum RunStatus {
    /// Executing the analysis pipeline
    Processing,

    /// Suspended indefinitely, awaiting the approval signal
    WaitingForHuman,

    /// Approval received; producing the proposal document
    Generating,

    /// Terminal: the proposal is ready
    Completed,

    /// Terminal: structural failure before the approval gate
    Error(String),
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Error(_))
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Processing => write!(f, "PROCESSING"),
            RunStatus::WaitingForHuman => write!(f, "WAITING_FOR_HUMAN"),
            RunStatus::Generating => write!(f, "GENERATING"),
            RunStatus::Completed => write!(f, "COMPLETED"),
            RunStatus::Error(reason) => write!(f, "ERROR: {reason}"),
        }
    }
}

/// The payload the approval signal carries: the human-reviewed facts, the
/// confirmed budget matrix, and the rate card used for pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalPayload {
    pub updated_facts: EnrichedFacts,
    pub budget: BudgetMatrix,
    pub rates: RateCard,
}

/// Persisted progress of the batched map phase. Chunk results accumulate
/// batch by batch so a restart continues at the first unfinished batch
/// instead of re-spending completion calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapProgress {
    /// Chunk definitions, produced once per run
    pub chunks: Vec<ChunkDefinition>,

    /// One partial extraction per processed chunk, in chunk order
    pub partials: Vec<ExtractedFacts>,

    /// Requirement items accumulated across processed chunks
    pub requirements: Vec<RequirementItem>,

    /// Index of the first chunk the next batch starts at
    pub next_batch: usize,

    /// Whether reverse-RAG refinement already ran
    pub refined: bool,
}

/// The externally queryable view of one run. Mutated only by the run's own
/// execution steps and by the approval signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub status: RunStatus,

    /// Merged and analyzer-enriched facts; replaced by the approval payload
    pub extracted_data: Option<EnrichedFacts>,

    /// Terminal result of a completed run
    pub final_proposal: Option<String>,

    /// Approved budget matrix
    pub budget: Option<BudgetMatrix>,

    /// Approved rate card
    pub rates: Option<RateCard>,

    pub suggested_stages: Vec<String>,

    pub suggested_roles: Vec<String>,

    /// Machine-suggested hour matrix shown to the human for review
    pub suggested_hours: Option<BudgetMatrix>,

    pub requirements_analysis: Vec<RequirementItem>,

    pub is_approved: bool,

    /// Human-readable note about the converted source
    pub source_preview: Option<String>,

    /// Approximate document length in bytes
    pub approx_length: usize,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            status: RunStatus::Processing,
            extracted_data: None,
            final_proposal: None,
            budget: None,
            rates: None,
            suggested_stages: Vec::new(),
            suggested_roles: Vec::new(),
            suggested_hours: None,
            requirements_analysis: Vec::new(),
            is_approved: false,
            source_preview: None,
            approx_length: 0,
        }
    }
}
