use crate::schema_value;
use proposal_completion::{ChatMessage, CompletionRequest, StructuredCompletion};
use proposal_facts::{normalize, BudgetMatrix, BudgetReport, ExtractedFacts};
use std::sync::Arc;

pub const TOOL_BUDGET: &str = "estimate_budget";

const SYSTEM_PROMPT: &str = "You are a project manager. Estimate effort in \
hours for every stage and role of the project. Use ONLY the stages and roles \
you are given.";

/// Produces the dense stage/role hour matrix.
///
/// The completion may answer sparsely or with labels outside the agreed
/// lists; the result is always densified over the input lists, and any
/// failure yields an all-zero matrix so callers never see a sparse one.
pub struct BudgetEstimator {
    completion: Arc<dyn StructuredCompletion>,
}

impl BudgetEstimator {
    pub fn new(completion: Arc<dyn StructuredCompletion>) -> Self {
        Self { completion }
    }

    pub async fn estimate(
        &self,
        facts: &ExtractedFacts,
        stages: &[String],
        roles: &[String],
    ) -> BudgetMatrix {
        let stack: Vec<&str> = facts.tech_stack.iter().map(|st| st.text.as_str()).collect();

        let request = CompletionRequest::new(
            TOOL_BUDGET,
            vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(format!(
                    "Project: {}\nStack: {}\n\nStages: {}\nRoles: {}\n\n\
                     Fill the hour matrix: for EVERY stage in the list give \
                     hours for EVERY role in the list. Use 0 when a role is \
                     not involved in a stage.",
                    facts.project_essence.text,
                    stack.join(", "),
                    stages.join(", "),
                    roles.join(", ")
                )),
            ],
        )
        .with_schema(schema_value::<BudgetReport>());

        match self.completion.complete(request).await {
            Ok(value) => {
                BudgetMatrix::densify(stages, roles, &normalize::budget_report(&value))
            }
            Err(err) => {
                log::warn!("Budget estimation failed, returning zero matrix: {err}");
                BudgetMatrix::zeroed(stages, roles)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proposal_completion::testing::MockCompletion;
    use proposal_completion::CompletionError;
    use serde_json::json;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_sparse_response_is_densified() {
        let mock = MockCompletion::new();
        mock.script_ok(
            TOOL_BUDGET,
            json!({"stages": [
                {"stage_name": "A", "role_estimates": [{"role_name": "X", "hours": 5}]}
            ]}),
        );

        let estimator = BudgetEstimator::new(Arc::new(mock));
        let matrix = estimator
            .estimate(
                &ExtractedFacts::default(),
                &names(&["A", "B"]),
                &names(&["X", "Y"]),
            )
            .await;

        assert_eq!(matrix.hours("A", "X"), Some(5));
        assert_eq!(matrix.hours("A", "Y"), Some(0));
        assert_eq!(matrix.hours("B", "X"), Some(0));
        assert_eq!(matrix.hours("B", "Y"), Some(0));
    }

    #[tokio::test]
    async fn test_failure_yields_zero_matrix() {
        let mock = MockCompletion::new();
        mock.script_err(TOOL_BUDGET, CompletionError::Transient("flaky".to_string()));

        let estimator = BudgetEstimator::new(Arc::new(mock));
        let matrix = estimator
            .estimate(&ExtractedFacts::default(), &names(&["A"]), &names(&["X"]))
            .await;

        assert_eq!(matrix.hours("A", "X"), Some(0));
        assert_eq!(matrix.total_hours(), 0);
    }
}
