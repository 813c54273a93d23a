use crate::schema_value;
use indexmap::IndexMap;
use proposal_completion::{ChatMessage, CompletionRequest, StructuredCompletion};
use proposal_facts::{
    normalize, AnalysisReport, EnrichedFacts, ExtractedFacts, FeatureCategory, RequirementItem,
};
use serde_json::json;
use std::sync::Arc;

pub const TOOL_ANALYZE: &str = "analyze_project";

/// Upper bound on requirement items included in the prompt's context block.
pub const MAX_RAG_CONTEXT_ITEMS: usize = 15;

/// Hours assigned to a feature no estimate could be matched to.
pub const DEFAULT_FEATURE_HOURS: u64 = 5;

const QUOTE_PREVIEW_CHARS: usize = 160;

const SYSTEM_PROMPT: &str = "You are an IT architect. Analyze the aggregated \
project data extracted from a technical requirements document.";

/// Document-level analysis over the merged facts: requirement issues,
/// suggested stages and roles, and per-feature hour estimates mapped back
/// onto the key features.
pub struct ProjectAnalyzer {
    completion: Arc<dyn StructuredCompletion>,
}

impl ProjectAnalyzer {
    pub fn new(completion: Arc<dyn StructuredCompletion>) -> Self {
        Self { completion }
    }

    /// Analyze merged facts. On completion failure the facts pass through
    /// unchanged, with no issues or suggestions added.
    pub async fn analyze(
        &self,
        facts: ExtractedFacts,
        requirements: &[RequirementItem],
    ) -> EnrichedFacts {
        let context = condensed_context(&facts);
        let rag_block = rag_context(requirements);

        let request = CompletionRequest::new(
            TOOL_ANALYZE,
            vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(format!(
                    "Project data extracted from the requirements document:\n\
                     {context}\n{rag_block}\n\
                     Tasks:\n\
                     1. Flag problematic requirements (unclear or contradictory) \
                     in the extracted data.\n\
                     2. Suggest development stages and team roles.\n\
                     3. Estimate hours (4 to 100) for EVERY feature listed under \
                     key_features.\n\n\
                     For requirement_issues, item_text must contain only the \
                     requirement text itself, never serialized objects."
                )),
            ],
        )
        .with_schema(schema_value::<AnalysisReport>());

        match self.completion.complete(request).await {
            Ok(value) => apply_analysis(facts, normalize::analysis_report(&value)),
            Err(err) => {
                log::warn!("Project analysis failed, passing facts through unchanged: {err}");
                EnrichedFacts::from(facts)
            }
        }
    }
}

/// Condensed prompt context: essence, type, goals, stack and feature texts
/// only. Provenance payloads stay out to bound the prompt size.
pub(crate) fn condensed_context(facts: &ExtractedFacts) -> String {
    let texts = |items: &[proposal_facts::SourceText]| -> Vec<String> {
        items.iter().map(|st| st.text.clone()).collect()
    };

    let mut features = serde_json::Map::new();
    for category in FeatureCategory::ALL {
        let names: Vec<String> = facts
            .key_features
            .category(category)
            .iter()
            .map(|f| f.text().to_string())
            .collect();
        features.insert(category.as_str().to_string(), json!(names));
    }

    let value = json!({
        "project_essence": facts.project_essence.text,
        "project_type": facts.project_type.text,
        "business_goals": texts(&facts.business_goals),
        "tech_stack": texts(&facts.tech_stack),
        "key_features": features,
    });

    serde_json::to_string_pretty(&value).unwrap_or_default()
}

/// Requirement items with located source excerpts, rendered as a prompt
/// block. Capped to the first [`MAX_RAG_CONTEXT_ITEMS`] items in list order.
fn rag_context(items: &[RequirementItem]) -> String {
    if items.is_empty() {
        return String::new();
    }

    let mut block = String::from("\nRequirements located in the source document:\n");
    for item in items.iter().take(MAX_RAG_CONTEXT_ITEMS) {
        let page = item
            .page_number
            .map(|p| format!(", page {p}"))
            .unwrap_or_default();
        let proof = item
            .source_text
            .as_deref()
            .map(|t| {
                let preview: String = t.chars().take(QUOTE_PREVIEW_CHARS).collect();
                format!(": \"{preview}\"")
            })
            .unwrap_or_default();
        block.push_str(&format!(
            "- [{}] {}{page}{proof}\n",
            item.category, item.summary
        ));
    }
    block
}

/// Map the analysis report back onto the facts: issues and suggestions are
/// attached as-is; hour estimates are matched to features by exact text
/// first, then by substring containment in either direction (first match in
/// response order wins), defaulting to [`DEFAULT_FEATURE_HOURS`].
fn apply_analysis(mut facts: ExtractedFacts, report: AnalysisReport) -> EnrichedFacts {
    let mut estimates: IndexMap<String, u64> = IndexMap::new();
    for estimate in &report.estimates {
        estimates.insert(estimate.feature_text.clone(), estimate.hours);
    }

    for category in FeatureCategory::ALL {
        let category_name = category.as_str();
        for feature in facts.key_features.category_mut(category) {
            let text = feature.text().to_string();
            let hours = match estimates.get(&text) {
                Some(hours) => *hours,
                None => estimates
                    .iter()
                    .find(|(key, _)| key.contains(text.as_str()) || text.contains(key.as_str()))
                    .map(|(_, hours)| *hours)
                    .unwrap_or(DEFAULT_FEATURE_HOURS),
            };
            feature.estimated_hours = Some(hours);
            feature.category = Some(category_name.to_string());
        }
    }

    EnrichedFacts {
        facts,
        requirement_issues: report.requirement_issues,
        suggested_stages: report.suggested_stages,
        suggested_roles: report.suggested_roles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proposal_completion::testing::MockCompletion;
    use proposal_completion::CompletionError;
    use proposal_facts::FeatureItem;
    use serde_json::json;

    fn facts_with_modules(modules: &[&str]) -> ExtractedFacts {
        let mut facts = ExtractedFacts::default();
        for name in modules {
            facts.key_features.modules.push(FeatureItem::new(*name));
        }
        facts
    }

    #[tokio::test]
    async fn test_estimates_mapped_exact_fuzzy_and_default() {
        let mock = MockCompletion::new();
        mock.script_ok(
            TOOL_ANALYZE,
            json!({
                "requirement_issues": [],
                "suggested_stages": ["Discovery", "Build"],
                "suggested_roles": ["Backend"],
                "estimates": [
                    {"feature_text": "Authentication", "hours": 16},
                    {"feature_text": "Search across documents", "hours": 24}
                ]
            }),
        );

        let analyzer = ProjectAnalyzer::new(Arc::new(mock));
        let facts = facts_with_modules(&["Authentication", "Search", "Audit log"]);
        let enriched = analyzer.analyze(facts, &[]).await;

        let modules = &enriched.facts.key_features.modules;
        // Exact match
        assert_eq!(modules[0].estimated_hours, Some(16));
        // "Search" is contained in "Search across documents"
        assert_eq!(modules[1].estimated_hours, Some(24));
        // No match at all
        assert_eq!(modules[2].estimated_hours, Some(DEFAULT_FEATURE_HOURS));

        assert_eq!(modules[0].category.as_deref(), Some("modules"));
        assert_eq!(enriched.suggested_stages, ["Discovery", "Build"]);
    }

    #[tokio::test]
    async fn test_fuzzy_match_first_in_response_order_wins() {
        let mock = MockCompletion::new();
        mock.script_ok(
            TOOL_ANALYZE,
            json!({
                "estimates": [
                    {"feature_text": "Search UI", "hours": 10},
                    {"feature_text": "Search backend", "hours": 40}
                ]
            }),
        );

        let analyzer = ProjectAnalyzer::new(Arc::new(mock));
        let enriched = analyzer.analyze(facts_with_modules(&["Search"]), &[]).await;

        assert_eq!(
            enriched.facts.key_features.modules[0].estimated_hours,
            Some(10)
        );
    }

    #[tokio::test]
    async fn test_failure_passes_facts_through_unchanged() {
        let mock = MockCompletion::new();
        mock.script_err(TOOL_ANALYZE, CompletionError::ContextLimit);

        let analyzer = ProjectAnalyzer::new(Arc::new(mock));
        let facts = facts_with_modules(&["Authentication"]);
        let enriched = analyzer.analyze(facts.clone(), &[]).await;

        assert_eq!(enriched.facts, facts);
        assert!(enriched.requirement_issues.is_empty());
        assert!(enriched.suggested_stages.is_empty());
    }

    #[test]
    fn test_condensed_context_excludes_provenance() {
        let mut facts = facts_with_modules(&["Portal"]);
        facts.key_features.modules[0].source.source_quote =
            Some("a very long quote that must not reach the prompt".to_string());

        let context = condensed_context(&facts);
        assert!(context.contains("Portal"));
        assert!(!context.contains("very long quote"));
    }

    #[test]
    fn test_rag_context_caps_items() {
        let items: Vec<RequirementItem> = (0..30)
            .map(|i| RequirementItem::new("General", format!("Requirement {i}"), "q"))
            .collect();

        let block = rag_context(&items);
        assert!(block.contains("Requirement 0"));
        assert!(block.contains("Requirement 14"));
        assert!(!block.contains("Requirement 15"));
    }
}
