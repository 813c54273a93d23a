use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How important a requirement is to the project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Importance {
    High,
    #[default]
    Medium,
    Low,
}

impl Importance {
    /// Lenient parse over the strings completion backends actually emit.
    pub fn parse(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        if lower.starts_with("high") || lower.starts_with("critical") {
            Importance::High
        } else if lower.starts_with("low") || lower.starts_with("minor") {
            Importance::Low
        } else {
            Importance::Medium
        }
    }
}

/// An analyst-level finding, distinct from a raw extracted fact.
///
/// `search_query` must be a verbatim or near-verbatim excerpt from the source
/// chunk: it is later embedded and matched against a vector index of the
/// document, not keyword-searched. The trailing optional fields are filled in
/// by the reverse-RAG refinement step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RequirementItem {
    /// Requirement kind, e.g. "Security", "Interface", "Business logic"
    pub category: String,

    /// Short restatement of the requirement for a manager
    pub summary: String,

    /// Verbatim source excerpt used for nearest-neighbor lookup
    pub search_query: String,

    #[serde(default)]
    pub importance: Importance,

    /// Best-matching source excerpt located by refinement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,

    /// Page the matched excerpt was found on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,

    /// Refinement confidence in `[0, 1]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl RequirementItem {
    pub fn new(
        category: impl Into<String>,
        summary: impl Into<String>,
        search_query: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            summary: summary.into(),
            search_query: search_query.into(),
            importance: Importance::default(),
            source_text: None,
            page_number: None,
            confidence: None,
        }
    }

    /// Whether refinement already attached a source excerpt
    pub fn is_enriched(&self) -> bool {
        self.source_text.is_some()
    }
}

/// Wire shape for the per-chunk requirement analysis pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RequirementsReport {
    #[serde(default)]
    pub items: Vec<RequirementItem>,
}
