use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Closed set of project type labels the extraction prompt offers the model.
pub const PROJECT_TYPES: [&str; 7] = ["Web", "Mobile", "ERP", "CRM", "AI", "Integration", "Other"];

/// The atomic unit of every extracted fact: a normalized claim with optional
/// provenance.
///
/// Absence of a value is represented by omission from the owning collection,
/// never by a placeholder string such as "unknown" or "n/a".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceText {
    /// Normalized claim text
    pub text: String,

    /// Verbatim quote from the source document backing the claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_quote: Option<String>,

    /// Page the quote was found on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
}

impl SourceText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_quote: None,
            page_number: None,
        }
    }

    /// Whether the claim carries no usable text
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A key feature: a sourced claim plus the annotations the project analyzer
/// fills in after merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FeatureItem {
    #[serde(flatten)]
    pub source: SourceText,

    /// Hours assigned by the estimate merge-back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<u64>,

    /// Category name assigned alongside the estimate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl FeatureItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            source: SourceText::new(text),
            estimated_hours: None,
            category: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.source.text
    }
}

impl From<SourceText> for FeatureItem {
    fn from(source: SourceText) -> Self {
        Self {
            source,
            estimated_hours: None,
            category: None,
        }
    }
}

/// The closed set of key-feature categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureCategory {
    Modules,
    Screens,
    Reports,
    Integrations,
    Nfr,
}

impl FeatureCategory {
    pub const ALL: [FeatureCategory; 5] = [
        FeatureCategory::Modules,
        FeatureCategory::Screens,
        FeatureCategory::Reports,
        FeatureCategory::Integrations,
        FeatureCategory::Nfr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureCategory::Modules => "modules",
            FeatureCategory::Screens => "screens",
            FeatureCategory::Reports => "reports",
            FeatureCategory::Integrations => "integrations",
            FeatureCategory::Nfr => "nfr",
        }
    }
}

/// Key features broken down by category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KeyFeatures {
    /// Logical modules of the system
    #[serde(default)]
    pub modules: Vec<FeatureItem>,

    /// UI screens and forms
    #[serde(default)]
    pub screens: Vec<FeatureItem>,

    /// Reports and analytics
    #[serde(default)]
    pub reports: Vec<FeatureItem>,

    /// External integrations
    #[serde(default)]
    pub integrations: Vec<FeatureItem>,

    /// Non-functional requirements
    #[serde(default)]
    pub nfr: Vec<FeatureItem>,
}

impl KeyFeatures {
    pub fn category(&self, category: FeatureCategory) -> &[FeatureItem] {
        match category {
            FeatureCategory::Modules => &self.modules,
            FeatureCategory::Screens => &self.screens,
            FeatureCategory::Reports => &self.reports,
            FeatureCategory::Integrations => &self.integrations,
            FeatureCategory::Nfr => &self.nfr,
        }
    }

    pub fn category_mut(&mut self, category: FeatureCategory) -> &mut Vec<FeatureItem> {
        match category {
            FeatureCategory::Modules => &mut self.modules,
            FeatureCategory::Screens => &mut self.screens,
            FeatureCategory::Reports => &mut self.reports,
            FeatureCategory::Integrations => &mut self.integrations,
            FeatureCategory::Nfr => &mut self.nfr,
        }
    }

    pub fn feature_count(&self) -> usize {
        FeatureCategory::ALL
            .iter()
            .map(|c| self.category(*c).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_count() == 0
    }
}

/// Structured facts extracted from one chunk, later merged into a single
/// per-document instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedFacts {
    /// Name of the commissioning client
    #[serde(default)]
    pub client_name: SourceText,

    /// One-line essence of the project
    #[serde(default)]
    pub project_essence: SourceText,

    /// One of [`PROJECT_TYPES`]
    #[serde(default)]
    pub project_type: SourceText,

    /// Business goals stated in the document
    #[serde(default)]
    pub business_goals: Vec<SourceText>,

    /// Technologies named or implied
    #[serde(default)]
    pub tech_stack: Vec<SourceText>,

    /// Systems the client wants integrated
    #[serde(default)]
    pub client_integrations: Vec<SourceText>,

    /// Functional requirements by category
    #[serde(default)]
    pub key_features: KeyFeatures,
}

impl ExtractedFacts {
    /// Whether nothing at all was extracted
    pub fn is_empty(&self) -> bool {
        self.client_name.is_blank()
            && self.project_essence.is_blank()
            && self.business_goals.is_empty()
            && self.tech_stack.is_empty()
            && self.client_integrations.is_empty()
            && self.key_features.is_empty()
    }
}

/// A problem the analyzer found in the extracted requirements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RequirementIssue {
    /// Issue kind, e.g. "questionable" or "contradictory"
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Facts field the issue refers to
    #[serde(default)]
    pub field: String,

    /// Key-feature category the issue refers to
    #[serde(default)]
    pub category: String,

    /// The requirement text in question
    #[serde(default)]
    pub item_text: String,

    /// Supporting quote, when the model provided one
    #[serde(default)]
    pub source: String,

    /// Why the requirement is problematic
    #[serde(default)]
    pub reason: String,
}

/// One feature-to-hours estimate pair from the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FeatureEstimate {
    /// Feature text the hours apply to
    pub feature_text: String,

    /// Estimated effort in hours
    pub hours: u64,
}

/// Everything the project analyzer returns in one pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisReport {
    #[serde(default)]
    pub requirement_issues: Vec<RequirementIssue>,

    #[serde(default)]
    pub suggested_stages: Vec<String>,

    #[serde(default)]
    pub suggested_roles: Vec<String>,

    #[serde(default)]
    pub estimates: Vec<FeatureEstimate>,
}

/// Merged facts plus the analyzer's additions. This is the long-lived
/// per-document object the human reviews and approves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichedFacts {
    #[serde(flatten)]
    pub facts: ExtractedFacts,

    #[serde(default)]
    pub requirement_issues: Vec<RequirementIssue>,

    #[serde(default)]
    pub suggested_stages: Vec<String>,

    #[serde(default)]
    pub suggested_roles: Vec<String>,
}

impl From<ExtractedFacts> for EnrichedFacts {
    fn from(facts: ExtractedFacts) -> Self {
        Self {
            facts,
            requirement_issues: Vec::new(),
            suggested_stages: Vec::new(),
            suggested_roles: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_source_text_blank() {
        assert!(SourceText::new("").is_blank());
        assert!(SourceText::new("   ").is_blank());
        assert!(!SourceText::new("CRM").is_blank());
    }

    #[test]
    fn test_key_features_category_roundtrip() {
        let mut features = KeyFeatures::default();
        features
            .category_mut(FeatureCategory::Screens)
            .push(FeatureItem::new("Login screen"));

        assert_eq!(features.category(FeatureCategory::Screens).len(), 1);
        assert_eq!(features.feature_count(), 1);
        assert!(!features.is_empty());
    }

    #[test]
    fn test_extracted_facts_empty() {
        let mut facts = ExtractedFacts::default();
        assert!(facts.is_empty());

        facts.tech_stack.push(SourceText::new("Rust"));
        assert!(!facts.is_empty());
    }

    #[test]
    fn test_feature_item_serializes_flat() {
        let item = FeatureItem {
            source: SourceText::new("Offline mode"),
            estimated_hours: Some(8),
            category: Some("modules".to_string()),
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["text"], "Offline mode");
        assert_eq!(value["estimated_hours"], 8);
    }
}
