use proposal_facts::RequirementItem;
use proposal_vector_index::VectorIndex;
use std::sync::Arc;

/// Minimum confidence a match needs before it is attached to an item.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.3;

/// Reverse-RAG enrichment: each requirement item carries a search query
/// emitted by the analysis pass; the refiner locates the query's source in
/// the document's vector table and attaches the matched excerpt, its page,
/// and a confidence score.
pub struct ReverseRagRefiner {
    index: Arc<VectorIndex>,
    table: String,
    min_confidence: f32,
}

impl ReverseRagRefiner {
    pub fn new(index: Arc<VectorIndex>, table: impl Into<String>) -> Self {
        Self {
            index,
            table: table.into(),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Enrich items in place. A failed lookup leaves its item unenriched and
    /// never aborts the remaining items.
    pub async fn refine(&self, items: Vec<RequirementItem>) -> Vec<RequirementItem> {
        let mut out = Vec::with_capacity(items.len());

        for mut item in items {
            if item.search_query.trim().is_empty() {
                out.push(item);
                continue;
            }

            match self.index.search(&self.table, &item.search_query, 1).await {
                Ok(hits) => {
                    if let Some(hit) = hits.first() {
                        let confidence = (1.0 - hit.distance).clamp(0.0, 1.0);
                        if confidence >= self.min_confidence {
                            item.source_text = Some(hit.text.clone());
                            item.page_number = hit.page_number;
                            item.confidence = Some(confidence);
                        } else {
                            log::debug!(
                                "Match for '{}' below confidence threshold ({confidence:.2})",
                                item.summary
                            );
                        }
                    }
                }
                Err(err) => {
                    log::warn!("Source lookup failed for '{}': {err}", item.summary);
                }
            }

            out.push(item);
        }

        out
    }
}
