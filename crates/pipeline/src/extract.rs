use crate::schema_value;
use proposal_chunker::ChunkDefinition;
use proposal_completion::{ChatMessage, CompletionRequest, StructuredCompletion};
use proposal_facts::{normalize, ExtractedFacts, PROJECT_TYPES};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const TOOL_EXTRACT: &str = "extract_chunk";

/// Wire shape of the extraction pass. The leading `reasoning` field makes the
/// model summarize the fragment before committing to structured fields, which
/// measurably reduces placeholder answers.
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ChunkExtraction {
    /// Free-form notes: what the fragment covers, which modules and
    /// technologies appear
    pub reasoning: String,

    #[serde(flatten)]
    pub facts: ExtractedFacts,
}

/// Extracts structured facts from one chunk.
///
/// Failures of any kind degrade to an empty [`ExtractedFacts`]; the merge
/// step treats such partials as contributing nothing.
#[derive(Clone)]
pub struct ExtractionUnit {
    completion: Arc<dyn StructuredCompletion>,
}

impl ExtractionUnit {
    pub fn new(completion: Arc<dyn StructuredCompletion>) -> Self {
        Self { completion }
    }

    pub async fn extract(&self, chunk: &ChunkDefinition) -> ExtractedFacts {
        let text = match chunk.read_text().await {
            Ok(text) => text,
            Err(err) => {
                log::warn!(
                    "Chunk {}..{} unreadable, substituting empty extraction: {err}",
                    chunk.start,
                    chunk.end
                );
                return ExtractedFacts::default();
            }
        };

        if text.trim().is_empty() {
            return ExtractedFacts::default();
        }

        log::info!("Extracting facts from chunk ({} bytes)", text.len());

        let request = CompletionRequest::new(
            TOOL_EXTRACT,
            vec![
                ChatMessage::system(system_prompt()),
                ChatMessage::user(format!("Requirements document fragment:\n\n{text}")),
            ],
        )
        .with_schema(schema_value::<ChunkExtraction>());

        match self.completion.complete(request).await {
            Ok(value) => normalize::extraction(&value),
            Err(err) => {
                log::warn!("Chunk extraction failed, substituting empty result: {err}");
                ExtractedFacts::default()
            }
        }
    }
}

fn system_prompt() -> String {
    format!(
        "You are a careful systems analyst. Read a fragment of a technical \
         requirements document and extract structured facts.\n\n\
         Step 1, reasoning: fill the 'reasoning' field first. Describe in your \
         own words what the fragment covers, which features or modules it \
         names, and whether concrete technologies or goals appear.\n\n\
         Step 2, extraction: fill the remaining fields.\n\
         - client_name: the commissioning company. Use an empty string when \
         the fragment does not name one.\n\
         - project_type: the single best fit among: {}.\n\
         - key_features: split findings into modules, screens, reports, \
         integrations and nfr.\n\n\
         Formatting rule: 'text' fields carry plain text only. Never write \
         placeholders such as \"Unknown\" or \"N/A\"; omit the value instead.",
        PROJECT_TYPES.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proposal_completion::testing::MockCompletion;
    use proposal_completion::CompletionError;
    use serde_json::json;

    async fn chunk_for(content: &str) -> (tempfile::TempDir, ChunkDefinition) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        tokio::fs::write(&path, content).await.unwrap();
        let chunk = ChunkDefinition::new(&path, 0, content.len());
        (dir, chunk)
    }

    #[tokio::test]
    async fn test_extract_normalizes_response() {
        let (_dir, chunk) = chunk_for("The client Acme Corp needs a portal.").await;

        let mock = MockCompletion::new();
        mock.script_ok(
            TOOL_EXTRACT,
            json!({
                "reasoning": "Names the client and a portal.",
                "client_name": "Acme Corp",
                "tech_stack": ["React"],
                "key_features": {"modules": ["Portal"]}
            }),
        );

        let unit = ExtractionUnit::new(Arc::new(mock));
        let facts = unit.extract(&chunk).await;

        assert_eq!(facts.client_name.text, "Acme Corp");
        assert_eq!(facts.tech_stack[0].text, "React");
        assert_eq!(facts.key_features.modules[0].text(), "Portal");
    }

    #[tokio::test]
    async fn test_extract_soft_fails_to_empty() {
        let (_dir, chunk) = chunk_for("Some content.").await;

        let mock = MockCompletion::new();
        mock.script_err(
            TOOL_EXTRACT,
            CompletionError::Transient("backend down".to_string()),
        );

        let unit = ExtractionUnit::new(Arc::new(mock));
        assert_eq!(unit.extract(&chunk).await, ExtractedFacts::default());
    }

    #[tokio::test]
    async fn test_missing_source_is_a_soft_failure() {
        let chunk = ChunkDefinition::new("/nonexistent/doc.md", 0, 100);
        let unit = ExtractionUnit::new(Arc::new(MockCompletion::new()));
        assert_eq!(unit.extract(&chunk).await, ExtractedFacts::default());
    }

    #[tokio::test]
    async fn test_blank_chunk_skips_the_backend() {
        let (_dir, chunk) = chunk_for("   \n\n  ").await;
        let mock = Arc::new(MockCompletion::new());
        let unit = ExtractionUnit::new(mock.clone());

        assert_eq!(unit.extract(&chunk).await, ExtractedFacts::default());
        assert!(mock.calls().is_empty());
    }
}
