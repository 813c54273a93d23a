//! Schema-normalization boundary between raw completion JSON and the typed
//! domain model.
//!
//! Completion backends produce structurally inconsistent output: strings
//! where objects are expected, lists where maps are expected, aliased field
//! names ("role" for "role_name"), and occasionally stringified object
//! representations such as `text='...' source='...'`. Each function below
//! handles one known shape variant; callers never inspect raw JSON
//! themselves.

use crate::budget::{BudgetReport, RoleEstimate, StageEstimate};
use crate::requirement::{Importance, RequirementItem};
use crate::types::{
    AnalysisReport, ExtractedFacts, FeatureEstimate, FeatureItem, KeyFeatures, RequirementIssue,
    SourceText,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static REPR_TEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:text|feature)\s*[:=]\s*['"](.*?)['"]"#).expect("valid static regex")
});

/// Recover the payload from stringified object representations like
/// `text='Offline mode' source='...'`, or strip a plain quoted wrapper.
fn clean_repr_string(raw: &str) -> Option<String> {
    if let Some(captures) = REPR_TEXT_RE.captures(raw) {
        return Some(captures[1].to_string());
    }

    let trimmed = raw.trim();
    for quote in ['\'', '"'] {
        if trimmed.len() > 1 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return Some(trimmed[1..trimmed.len() - 1].to_string());
        }
    }

    None
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => clean_repr_string(s).unwrap_or_else(|| s.trim().to_string()),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items.first().map(scalar_text).unwrap_or_default(),
        Value::Object(map) => map
            .get("text")
            .or_else(|| map.get("name"))
            .or_else(|| map.get("value"))
            .map(scalar_text)
            .unwrap_or_default(),
    }
}

fn as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_hours(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f32(value: &Value) -> Option<f32> {
    match value {
        Value::Number(n) => n.as_f64().map(|f| f as f32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// First non-empty string among the given keys of a JSON object.
fn string_field(map: &serde_json::Map<String, Value>, keys: &[&str]) -> String {
    for key in keys {
        if let Some(value) = map.get(*key) {
            let text = scalar_text(value);
            if !text.is_empty() {
                return text;
            }
        }
    }
    String::new()
}

/// Normalize any of the shapes a source-attributed text arrives in.
pub fn source_text(value: &Value) -> SourceText {
    match value {
        Value::Null => SourceText::default(),
        Value::String(s) => {
            SourceText::new(clean_repr_string(s).unwrap_or_else(|| s.trim().to_string()))
        }
        Value::Array(items) => items.first().map(source_text).unwrap_or_default(),
        Value::Object(map) => {
            let text = string_field(map, &["text", "name", "value"]);
            let source_quote = map
                .get("source_quote")
                .or_else(|| map.get("source"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from);
            let page_number = map.get("page_number").and_then(as_u32);
            SourceText {
                text,
                source_quote,
                page_number,
            }
        }
        other => SourceText::new(scalar_text(other)),
    }
}

/// Normalize a list of source-attributed texts. A non-list yields an empty
/// list; blank entries are dropped.
pub fn source_text_list(value: &Value) -> Vec<SourceText> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(source_text)
            .filter(|st| !st.is_blank())
            .collect(),
        _ => Vec::new(),
    }
}

fn feature_list(value: &Value) -> Vec<FeatureItem> {
    source_text_list(value)
        .into_iter()
        .map(FeatureItem::from)
        .collect()
}

/// A feature from the flattened list form the model sometimes emits instead
/// of the categorized map.
fn loose_feature(value: &Value) -> Option<FeatureItem> {
    let text = match value {
        Value::String(s) => clean_repr_string(s).unwrap_or_else(|| s.trim().to_string()),
        Value::Object(map) => {
            let mut text = string_field(map, &["feature", "text"]);
            if text.is_empty() {
                let name = string_field(map, &["name"]);
                let description = string_field(map, &["description"]);
                if !name.is_empty() && !description.is_empty() {
                    text = format!("{name}: {description}");
                } else {
                    text = map
                        .iter()
                        .filter(|(k, _)| {
                            !matches!(
                                k.as_str(),
                                "category" | "source" | "estimated_hours" | "hours"
                            )
                        })
                        .map(|(_, v)| scalar_text(v))
                        .filter(|s| !s.is_empty())
                        .collect::<Vec<_>>()
                        .join(" ");
                }
            }
            text
        }
        _ => String::new(),
    };

    if text.trim().is_empty() {
        None
    } else {
        Some(FeatureItem::new(text))
    }
}

/// Normalize key features: either the expected category map or a flat list
/// of items (which all land in `modules`, the default category).
pub fn key_features(value: &Value) -> KeyFeatures {
    match value {
        Value::Object(map) => KeyFeatures {
            modules: map.get("modules").map(feature_list).unwrap_or_default(),
            screens: map.get("screens").map(feature_list).unwrap_or_default(),
            reports: map.get("reports").map(feature_list).unwrap_or_default(),
            integrations: map
                .get("integrations")
                .map(feature_list)
                .unwrap_or_default(),
            nfr: map.get("nfr").map(feature_list).unwrap_or_default(),
        },
        Value::Array(items) => KeyFeatures {
            modules: items.iter().filter_map(loose_feature).collect(),
            ..KeyFeatures::default()
        },
        _ => KeyFeatures::default(),
    }
}

/// Normalize a whole per-chunk extraction response.
pub fn extraction(value: &Value) -> ExtractedFacts {
    let Value::Object(map) = value else {
        return ExtractedFacts::default();
    };

    let mut facts = ExtractedFacts {
        client_name: map.get("client_name").map(source_text).unwrap_or_default(),
        project_essence: map
            .get("project_essence")
            .map(source_text)
            .unwrap_or_default(),
        project_type: map.get("project_type").map(source_text).unwrap_or_default(),
        business_goals: map
            .get("business_goals")
            .map(source_text_list)
            .unwrap_or_default(),
        tech_stack: map
            .get("tech_stack")
            .map(source_text_list)
            .unwrap_or_default(),
        client_integrations: map
            .get("client_integrations")
            .map(source_text_list)
            .unwrap_or_default(),
        key_features: map.get("key_features").map(key_features).unwrap_or_default(),
    };

    if facts.project_type.is_blank() {
        facts.project_type = SourceText::new("Other");
    }

    facts
}

/// Normalize one requirement item. Items missing both a summary and a search
/// query carry no signal and are dropped.
pub fn requirement_item(value: &Value) -> Option<RequirementItem> {
    let Value::Object(map) = value else {
        return None;
    };

    let summary = string_field(map, &["summary", "text", "description"]);
    let search_query = string_field(map, &["search_query", "query", "quote"]);
    if summary.is_empty() && search_query.is_empty() {
        return None;
    }

    let category = {
        let c = string_field(map, &["category", "type"]);
        if c.is_empty() {
            "General".to_string()
        } else {
            c
        }
    };

    Some(RequirementItem {
        category,
        summary: if summary.is_empty() {
            search_query.clone()
        } else {
            summary
        },
        search_query,
        importance: map
            .get("importance")
            .map(|v| Importance::parse(&scalar_text(v)))
            .unwrap_or_default(),
        source_text: map
            .get("source_text")
            .and_then(Value::as_str)
            .map(String::from),
        page_number: map.get("page_number").and_then(as_u32),
        confidence: map
            .get("confidence")
            .or_else(|| map.get("confidence_score"))
            .and_then(as_f32),
    })
}

/// Normalize a requirement-analysis response: either `{"items": [...]}` or a
/// bare list.
pub fn requirement_items(value: &Value) -> Vec<RequirementItem> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("items") {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    items.iter().filter_map(requirement_item).collect()
}

/// Normalize one requirement issue; a bare string becomes the item text.
pub fn requirement_issue(value: &Value) -> RequirementIssue {
    match value {
        Value::String(s) => RequirementIssue {
            kind: "questionable".to_string(),
            field: "key_features".to_string(),
            category: "general".to_string(),
            item_text: s.trim().to_string(),
            source: String::new(),
            reason: "Extracted as text".to_string(),
        },
        Value::Object(map) => {
            let raw_item_text = string_field(map, &["item_text", "text"]);
            let item_text =
                clean_repr_string(&raw_item_text).unwrap_or(raw_item_text);
            RequirementIssue {
                kind: {
                    let k = string_field(map, &["type", "kind"]);
                    if k.is_empty() {
                        "questionable".to_string()
                    } else {
                        k
                    }
                },
                field: {
                    let f = string_field(map, &["field"]);
                    if f.is_empty() {
                        "key_features".to_string()
                    } else {
                        f
                    }
                },
                category: {
                    let c = string_field(map, &["category"]);
                    if c.is_empty() {
                        "general".to_string()
                    } else {
                        c
                    }
                },
                item_text,
                source: string_field(map, &["source"]),
                reason: string_field(map, &["reason"]),
            }
        }
        _ => RequirementIssue::default(),
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(scalar_text)
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Normalize feature estimates: a list of objects with aliased keys, or a
/// plain `{feature: hours}` map.
pub fn feature_estimates(value: &Value) -> Vec<FeatureEstimate> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                let Value::Object(map) = item else {
                    return None;
                };
                let feature_text = string_field(map, &["feature_text", "feature", "text", "name"]);
                if feature_text.is_empty() {
                    return None;
                }
                let hours = map
                    .get("hours")
                    .or_else(|| map.get("estimate"))
                    .or_else(|| map.get("estimated_hours"))
                    .and_then(as_hours)
                    .unwrap_or(5);
                Some(FeatureEstimate {
                    feature_text,
                    hours,
                })
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .filter(|(k, _)| !k.trim().is_empty())
            .map(|(k, v)| FeatureEstimate {
                feature_text: k.trim().to_string(),
                hours: as_hours(v).unwrap_or(5),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Normalize the project-analysis response.
pub fn analysis_report(value: &Value) -> AnalysisReport {
    let Value::Object(map) = value else {
        return AnalysisReport::default();
    };

    AnalysisReport {
        requirement_issues: match map.get("requirement_issues") {
            Some(Value::Array(items)) => items.iter().map(requirement_issue).collect(),
            _ => Vec::new(),
        },
        suggested_stages: map.get("suggested_stages").map(string_list).unwrap_or_default(),
        suggested_roles: map.get("suggested_roles").map(string_list).unwrap_or_default(),
        estimates: map.get("estimates").map(feature_estimates).unwrap_or_default(),
    }
}

fn role_estimate(value: &Value) -> Option<RoleEstimate> {
    let Value::Object(map) = value else {
        return None;
    };
    let role_name = string_field(map, &["role_name", "role", "name"]);
    if role_name.is_empty() {
        return None;
    }
    Some(RoleEstimate {
        role_name,
        hours: map.get("hours").and_then(as_hours).unwrap_or(0),
    })
}

fn stage_estimate(value: &Value) -> Option<StageEstimate> {
    let Value::Object(map) = value else {
        return None;
    };
    let stage_name = string_field(map, &["stage_name", "name", "stage"]);
    if stage_name.is_empty() {
        return None;
    }
    let roles = match map.get("role_estimates").or_else(|| map.get("roles")) {
        Some(Value::Array(items)) => items.iter().filter_map(role_estimate).collect(),
        _ => Vec::new(),
    };
    Some(StageEstimate {
        stage_name,
        role_estimates: roles,
    })
}

/// Normalize the budget-estimation response: `{"stages": [...]}` or a bare
/// list of stage estimates.
pub fn budget_report(value: &Value) -> BudgetReport {
    let stages = match value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("stages") {
            Some(Value::Array(items)) => items,
            _ => return BudgetReport::default(),
        },
        _ => return BudgetReport::default(),
    };

    BudgetReport {
        stages: stages.iter().filter_map(stage_estimate).collect(),
    }
}
