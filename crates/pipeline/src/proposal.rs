use crate::analyze::condensed_context;
use crate::schema_value;
use proposal_completion::{
    ChatMessage, CompletionError, CompletionRequest, Result, StructuredCompletion,
};
use proposal_facts::{BudgetMatrix, EnrichedFacts, RateCard};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const TOOL_PROPOSAL: &str = "write_proposal";

const SYSTEM_PROMPT: &str = "You are a sales manager at a software company. \
Write a persuasive commercial proposal in Markdown.";

/// Wire shape of the proposal generation pass.
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
struct ProposalDocument {
    /// The full proposal as Markdown
    markdown_content: String,
}

/// Generates the final proposal document from approved facts and budget.
///
/// The budget table is rendered deterministically here and handed to the
/// model verbatim, so the numbers in the proposal always match the approved
/// matrix regardless of what the model does with the surrounding prose.
pub struct ProposalWriter {
    completion: Arc<dyn StructuredCompletion>,
}

impl ProposalWriter {
    pub fn new(completion: Arc<dyn StructuredCompletion>) -> Self {
        Self { completion }
    }

    /// Render the approved budget as a Markdown table with a total cost line.
    /// Zero-hour cells are skipped.
    pub fn render_budget_table(budget: &BudgetMatrix, rates: &RateCard) -> String {
        let mut table = String::from(
            "### Estimated Budget\n\n| Stage | Role | Hours | Rate | Cost |\n|---|---|---|---|---|\n",
        );
        let mut total = 0.0;

        for (stage, row) in &budget.0 {
            for (role, hours) in row {
                if *hours == 0 {
                    continue;
                }
                let rate = rates.get(role).copied().unwrap_or(0.0);
                let cost = *hours as f64 * rate;
                total += cost;
                table.push_str(&format!(
                    "| {stage} | {role} | {hours} | {rate:.0} | {cost:.0} |\n"
                ));
            }
        }

        table.push_str(&format!("\n**Total estimated cost: {total:.0}**\n"));
        table
    }

    pub async fn write(
        &self,
        facts: &EnrichedFacts,
        budget: &BudgetMatrix,
        rates: &RateCard,
    ) -> Result<String> {
        let budget_table = Self::render_budget_table(budget, rates);
        let context = condensed_context(&facts.facts);

        let request = CompletionRequest::new(
            TOOL_PROPOSAL,
            vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(format!(
                    "Project data:\n{context}\n\n\
                     Budget (include this table in the proposal verbatim):\n\
                     {budget_table}\n\n\
                     Write the complete proposal with this structure: \
                     introduction, understanding of the task, proposed \
                     solution (stack and features), work plan, budget (insert \
                     the table), call to action."
                )),
            ],
        )
        .with_schema(schema_value::<ProposalDocument>())
        .with_temperature(0.7);

        let value = self.completion.complete(request).await?;
        let content = value
            .get("markdown_content")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("")
            .to_string();

        if content.trim().is_empty() {
            return Err(CompletionError::Validation(
                "proposal response carried no markdown_content".to_string(),
            ));
        }

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proposal_completion::testing::MockCompletion;
    use proposal_facts::{BudgetReport, RoleEstimate, StageEstimate};
    use serde_json::json;

    fn budget() -> BudgetMatrix {
        let stages = vec!["Build".to_string()];
        let roles = vec!["Backend".to_string(), "Designer".to_string()];
        let report = BudgetReport {
            stages: vec![StageEstimate {
                stage_name: "Build".to_string(),
                role_estimates: vec![RoleEstimate {
                    role_name: "Backend".to_string(),
                    hours: 10,
                }],
            }],
        };
        BudgetMatrix::densify(&stages, &roles, &report)
    }

    fn rates() -> RateCard {
        let mut rates = RateCard::new();
        rates.insert("Backend".to_string(), 100.0);
        rates
    }

    #[test]
    fn test_budget_table_skips_zero_rows_and_totals() {
        let table = ProposalWriter::render_budget_table(&budget(), &rates());

        assert!(table.contains("| Build | Backend | 10 | 100 | 1000 |"));
        assert!(!table.contains("Designer"));
        assert!(table.contains("**Total estimated cost: 1000**"));
    }

    #[tokio::test]
    async fn test_write_returns_generated_markdown() {
        let mock = MockCompletion::new();
        mock.script_ok(
            TOOL_PROPOSAL,
            json!({"markdown_content": "# Proposal\n\nWe will build it."}),
        );

        let writer = ProposalWriter::new(Arc::new(mock));
        let text = writer
            .write(&EnrichedFacts::default(), &budget(), &rates())
            .await
            .unwrap();
        assert_eq!(text, "# Proposal\n\nWe will build it.");
    }

    #[tokio::test]
    async fn test_write_rejects_empty_content() {
        let mock = MockCompletion::new();
        mock.script_ok(TOOL_PROPOSAL, json!({"markdown_content": ""}));

        let writer = ProposalWriter::new(Arc::new(mock));
        let err = writer
            .write(&EnrichedFacts::default(), &budget(), &rates())
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Validation(_)));
    }
}
