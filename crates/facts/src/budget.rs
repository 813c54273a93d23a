use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Hourly rate per role name.
pub type RateCard = IndexMap<String, f64>;

/// Hours estimated for one role within a stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RoleEstimate {
    pub role_name: String,

    #[serde(default)]
    pub hours: u64,
}

/// Hours estimated for every role of one stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StageEstimate {
    pub stage_name: String,

    #[serde(default)]
    pub role_estimates: Vec<RoleEstimate>,
}

/// Wire shape of the budget estimation pass. May cover a partial or entirely
/// different set of stages and roles than requested; [`BudgetMatrix::densify`]
/// reconciles it against the agreed lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BudgetReport {
    #[serde(default)]
    pub stages: Vec<StageEstimate>,
}

/// Dense hour matrix: stage name to role name to hours.
///
/// Always dense over the agreed stage/role lists, with zero for unestimated
/// cells. Iteration order is pinned to the order of the input lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetMatrix(pub IndexMap<String, IndexMap<String, u64>>);

impl BudgetMatrix {
    /// All-zero matrix over the given stage and role lists
    pub fn zeroed(stages: &[String], roles: &[String]) -> Self {
        let mut matrix = IndexMap::with_capacity(stages.len());
        for stage in stages {
            let row: IndexMap<String, u64> = roles.iter().map(|r| (r.clone(), 0)).collect();
            matrix.insert(stage.clone(), row);
        }
        Self(matrix)
    }

    /// Reconcile a (possibly sparse, possibly mislabeled) report against the
    /// agreed stage/role lists: every requested cell is present, missing
    /// cells default to zero, unrequested cells are dropped.
    pub fn densify(stages: &[String], roles: &[String], report: &BudgetReport) -> Self {
        let mut sparse: IndexMap<&str, IndexMap<&str, u64>> = IndexMap::new();
        for stage in &report.stages {
            let row = sparse.entry(stage.stage_name.as_str()).or_default();
            for role in &stage.role_estimates {
                row.insert(role.role_name.as_str(), role.hours);
            }
        }

        let mut matrix = IndexMap::with_capacity(stages.len());
        for stage in stages {
            let mut row = IndexMap::with_capacity(roles.len());
            for role in roles {
                let hours = sparse
                    .get(stage.as_str())
                    .and_then(|r| r.get(role.as_str()))
                    .copied()
                    .unwrap_or(0);
                row.insert(role.clone(), hours);
            }
            matrix.insert(stage.clone(), row);
        }
        Self(matrix)
    }

    /// Hours for a single cell, if the stage and role exist
    pub fn hours(&self, stage: &str, role: &str) -> Option<u64> {
        self.0.get(stage).and_then(|row| row.get(role)).copied()
    }

    /// Sum of all cells
    pub fn total_hours(&self) -> u64 {
        self.0.values().flat_map(|row| row.values()).sum()
    }

    /// Total cost given a rate card; roles without a rate cost nothing
    pub fn total_cost(&self, rates: &RateCard) -> f64 {
        let mut total = 0.0;
        for row in self.0.values() {
            for (role, hours) in row {
                let rate = rates.get(role).copied().unwrap_or(0.0);
                total += *hours as f64 * rate;
            }
        }
        total
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_zeroed_is_dense() {
        let matrix = BudgetMatrix::zeroed(&names(&["A", "B"]), &names(&["X", "Y"]));
        assert_eq!(matrix.hours("A", "X"), Some(0));
        assert_eq!(matrix.hours("B", "Y"), Some(0));
        assert_eq!(matrix.total_hours(), 0);
    }

    #[test]
    fn test_densify_fills_missing_cells() {
        let report = BudgetReport {
            stages: vec![StageEstimate {
                stage_name: "A".to_string(),
                role_estimates: vec![RoleEstimate {
                    role_name: "X".to_string(),
                    hours: 5,
                }],
            }],
        };

        let matrix = BudgetMatrix::densify(&names(&["A", "B"]), &names(&["X", "Y"]), &report);
        assert_eq!(matrix.hours("A", "X"), Some(5));
        assert_eq!(matrix.hours("A", "Y"), Some(0));
        assert_eq!(matrix.hours("B", "X"), Some(0));
        assert_eq!(matrix.hours("B", "Y"), Some(0));
    }

    #[test]
    fn test_densify_drops_unrequested_cells() {
        let report = BudgetReport {
            stages: vec![StageEstimate {
                stage_name: "Surprise".to_string(),
                role_estimates: vec![RoleEstimate {
                    role_name: "X".to_string(),
                    hours: 40,
                }],
            }],
        };

        let matrix = BudgetMatrix::densify(&names(&["A"]), &names(&["X"]), &report);
        assert_eq!(matrix.hours("A", "X"), Some(0));
        assert_eq!(matrix.hours("Surprise", "X"), None);
    }

    #[test]
    fn test_iteration_order_follows_input_lists() {
        let matrix = BudgetMatrix::zeroed(&names(&["Later", "Earlier"]), &names(&["B", "A"]));
        let stages: Vec<&String> = matrix.0.keys().collect();
        assert_eq!(stages, ["Later", "Earlier"]);

        let roles: Vec<&String> = matrix.0["Later"].keys().collect();
        assert_eq!(roles, ["B", "A"]);
    }

    #[test]
    fn test_total_cost_uses_rates() {
        let report = BudgetReport {
            stages: vec![StageEstimate {
                stage_name: "Build".to_string(),
                role_estimates: vec![
                    RoleEstimate {
                        role_name: "Backend".to_string(),
                        hours: 10,
                    },
                    RoleEstimate {
                        role_name: "Unrated".to_string(),
                        hours: 100,
                    },
                ],
            }],
        };
        let matrix = BudgetMatrix::densify(
            &names(&["Build"]),
            &names(&["Backend", "Unrated"]),
            &report,
        );

        let mut rates = RateCard::new();
        rates.insert("Backend".to_string(), 50.0);

        assert_eq!(matrix.total_cost(&rates), 500.0);
    }
}
