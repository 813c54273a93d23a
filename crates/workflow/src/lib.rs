//! # Proposal Workflow
//!
//! The durable, signal-driven orchestration state machine tying the analysis
//! pipeline together.
//!
//! ## Lifecycle
//!
//! ```text
//! PROCESSING ──────────────> WAITING_FOR_HUMAN ──> GENERATING ──> COMPLETED
//!     │                            ▲    │
//!     │  convert → split+index     │    └── approval signal
//!     │  → batched map → refine    │        {facts, budget, rates}
//!     │  → merge → analyze         │
//!     │  → budget                  └── true suspension, hours to days
//!     │
//!     └──> ERROR (no convertible text, no chunks)
//! ```
//!
//! ## Durability
//!
//! Every step boundary persists a schema-versioned [`RunSnapshot`] with an
//! atomic tempfile-rename write, including per-batch map progress. A process
//! restart reconstructs the run with [`WorkflowRun::resume`]: mid-map runs
//! continue at the first unfinished batch, runs at the approval gate re-arm
//! it, terminal runs refuse further work. Steps consult the snapshot before
//! doing anything, which makes replay after a crash idempotent.
//!
//! External collaborators (document conversion, OCR, proposal generation,
//! budget persistence) are injected through the traits in [`collab`].

pub mod collab;
mod engine;
mod error;
mod snapshot;
mod state;

pub use collab::{
    BoxError, BudgetSink, CompletionProposalGenerator, ConvertedDocument, DocumentConverter,
    LoggingBudgetSink, NullOcr, OcrEngine, PlainTextConverter, ProposalGenerator,
};
pub use engine::{WorkflowConfig, WorkflowDeps, WorkflowRun};
pub use error::{Result, WorkflowError};
pub use snapshot::{RunSnapshot, SNAPSHOT_FILE, SNAPSHOT_SCHEMA_VERSION};
pub use state::{ApprovalPayload, MapProgress, RunStatus, WorkflowState};
