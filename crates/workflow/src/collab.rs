//! External collaborator seams of the orchestration: document conversion,
//! OCR, proposal generation and budget persistence.
//!
//! Production deployments inject real engines; the implementations bundled
//! here keep the CLI and tests runnable without them.

use async_trait::async_trait;
use proposal_completion::StructuredCompletion;
use proposal_facts::{BudgetMatrix, EnrichedFacts, RateCard};
use proposal_pipeline::ProposalWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result of document conversion: markdown on disk plus optional layout
/// metadata, both addressed by path so large documents never travel through
/// the run snapshot.
#[derive(Debug, Clone)]
pub struct ConvertedDocument {
    pub markdown_path: PathBuf,
    pub layout_path: Option<PathBuf>,
}

/// Converts an uploaded document to markdown.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// `Ok(None)` means the converter ran but produced no usable text; the
    /// orchestrator then falls back to OCR.
    async fn convert(&self, source: &Path)
        -> std::result::Result<Option<ConvertedDocument>, BoxError>;
}

/// Text recognition fallback for documents conversion cannot handle.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, source: &Path) -> std::result::Result<String, BoxError>;
}

/// Produces the final proposal document from approved data.
#[async_trait]
pub trait ProposalGenerator: Send + Sync {
    async fn generate(
        &self,
        facts: &EnrichedFacts,
        budget: &BudgetMatrix,
        rates: &RateCard,
    ) -> std::result::Result<String, BoxError>;
}

/// Best-effort persistence of the approved budget. Failures are logged by
/// the orchestrator and never affect the run status.
#[async_trait]
pub trait BudgetSink: Send + Sync {
    async fn save(
        &self,
        facts: &EnrichedFacts,
        budget: &BudgetMatrix,
    ) -> std::result::Result<(), BoxError>;
}

/// Converter for sources that already are text or markdown: the content is
/// re-encoded as UTF-8 (dropping invalid sequences) into a sibling
/// `*_converted.md` file.
pub struct PlainTextConverter;

#[async_trait]
impl DocumentConverter for PlainTextConverter {
    async fn convert(
        &self,
        source: &Path,
    ) -> std::result::Result<Option<ConvertedDocument>, BoxError> {
        let bytes = tokio::fs::read(source).await?;
        let text = proposal_chunker::decode_dropping_invalid(&bytes);

        if text.trim().is_empty() {
            return Ok(None);
        }

        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        let markdown_path = source.with_file_name(format!("{stem}_converted.md"));
        tokio::fs::write(&markdown_path, text).await?;

        Ok(Some(ConvertedDocument {
            markdown_path,
            layout_path: None,
        }))
    }
}

/// OCR stand-in for deployments without a recognition backend.
pub struct NullOcr;

#[async_trait]
impl OcrEngine for NullOcr {
    async fn recognize(&self, _source: &Path) -> std::result::Result<String, BoxError> {
        Err("no OCR engine configured".into())
    }
}

/// Proposal generation backed by the completion pipeline's writer.
pub struct CompletionProposalGenerator {
    writer: ProposalWriter,
}

impl CompletionProposalGenerator {
    pub fn new(completion: Arc<dyn StructuredCompletion>) -> Self {
        Self {
            writer: ProposalWriter::new(completion),
        }
    }
}

#[async_trait]
impl ProposalGenerator for CompletionProposalGenerator {
    async fn generate(
        &self,
        facts: &EnrichedFacts,
        budget: &BudgetMatrix,
        rates: &RateCard,
    ) -> std::result::Result<String, BoxError> {
        Ok(self.writer.write(facts, budget, rates).await?)
    }
}

/// Budget sink that only records the save in the log.
pub struct LoggingBudgetSink;

#[async_trait]
impl BudgetSink for LoggingBudgetSink {
    async fn save(
        &self,
        facts: &EnrichedFacts,
        budget: &BudgetMatrix,
    ) -> std::result::Result<(), BoxError> {
        log::info!(
            "Budget saved for client '{}': {} total hours",
            facts.facts.client_name.text,
            budget.total_hours()
        );
        Ok(())
    }
}
