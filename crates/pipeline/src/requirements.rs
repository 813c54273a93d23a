use crate::schema_value;
use proposal_chunker::ChunkDefinition;
use proposal_completion::{ChatMessage, CompletionRequest, StructuredCompletion};
use proposal_facts::{normalize, RequirementItem, RequirementsReport};
use std::sync::Arc;

pub const TOOL_REQUIREMENTS: &str = "analyze_requirements";

const SYSTEM_PROMPT: &str = "You are a requirements analyst. Read a fragment of a \
technical requirements document and list the individual requirements it \
contains: functional requirements, non-functional requirements, and risks or \
constraints.\n\n\
For every item provide:\n\
- category: the requirement kind (e.g. Security, Interface, Backend, Business logic)\n\
- summary: a short restatement for a manager\n\
- search_query: an exact or near-exact phrase COPIED from the fragment. Do \
not paraphrase; the phrase is matched against the document with \
nearest-neighbor search, and a paraphrase will miss.\n\
- importance: High, Medium or Low";

/// Produces analyst-level requirement items for one chunk.
///
/// Failure degrades to an empty list; the run's requirement analysis is then
/// simply missing this chunk's findings.
#[derive(Clone)]
pub struct RequirementAnalysisUnit {
    completion: Arc<dyn StructuredCompletion>,
}

impl RequirementAnalysisUnit {
    pub fn new(completion: Arc<dyn StructuredCompletion>) -> Self {
        Self { completion }
    }

    pub async fn analyze(&self, chunk: &ChunkDefinition) -> Vec<RequirementItem> {
        let text = match chunk.read_text().await {
            Ok(text) => text,
            Err(err) => {
                log::warn!(
                    "Chunk {}..{} unreadable, skipping requirement analysis: {err}",
                    chunk.start,
                    chunk.end
                );
                return Vec::new();
            }
        };

        if text.trim().is_empty() {
            return Vec::new();
        }

        let request = CompletionRequest::new(
            TOOL_REQUIREMENTS,
            vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(format!("Requirements document fragment:\n\n{text}")),
            ],
        )
        .with_schema(schema_value::<RequirementsReport>());

        match self.completion.complete(request).await {
            Ok(value) => normalize::requirement_items(&value),
            Err(err) => {
                log::warn!("Requirement analysis failed for chunk, continuing without it: {err}");
                Vec::new()
            }
        }
    }
}
