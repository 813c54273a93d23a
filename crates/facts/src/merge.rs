//! Deterministic reduction of per-chunk extractions into one per-document
//! facts object.
//!
//! The merge is total: malformed or empty partials contribute nothing and
//! never fail the reduction. Given the same input list in the same order the
//! output is identical; there is no randomness and no completion call.

use crate::types::{ExtractedFacts, FeatureCategory, FeatureItem, KeyFeatures, SourceText};
use indexmap::IndexMap;
use std::collections::HashSet;

/// Placeholder client names that must never win a vote.
const CLIENT_NAME_DENY: &[&str] = &[
    "",
    "unknown client",
    "unknown",
    "не указан",
    "нет",
    "n/a",
    "client name",
];

const ESSENCE_DENY: &[&str] = &["", "unknown essence", "n/a"];

const PROJECT_TYPE_DENY: &[&str] = &["", "other", "unknown"];

/// Generic boilerplate openings that get penalized in essence scoring.
const GENERIC_ESSENCE_OPENINGS: &[&str] = &["this document", "данный документ"];

const GENERIC_OPENING_PENALTY: i64 = 50;

fn is_denied(text: &str, deny: &[&str]) -> bool {
    let normalized = text.trim().to_lowercase();
    deny.contains(&normalized.as_str())
}

/// Pick the most frequent normalized text among non-denied candidates,
/// breaking ties by first occurrence. The returned value is the first
/// candidate carrying the winning text, so its provenance survives.
fn best_by_vote<'a, I>(candidates: I, deny: &[&str]) -> Option<SourceText>
where
    I: Iterator<Item = &'a SourceText>,
{
    let valid: Vec<&SourceText> = candidates
        .filter(|st| !is_denied(&st.text, deny))
        .collect();

    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for st in &valid {
        *counts.entry(st.text.trim()).or_insert(0) += 1;
    }

    let mut winner: Option<(&str, usize)> = None;
    for (text, &count) in &counts {
        if winner.map_or(true, |(_, best)| count > best) {
            winner = Some((text, count));
        }
    }
    let winner = winner?.0;

    valid
        .iter()
        .find(|st| st.text.trim() == winner)
        .map(|st| (*st).clone())
}

/// Longer essences score higher; generic document-intro boilerplate is
/// penalized so a short concrete summary can beat it.
fn essence_score(st: &SourceText) -> i64 {
    let trimmed = st.text.trim();
    let mut score = trimmed.len() as i64;
    let lower = trimmed.to_lowercase();
    if GENERIC_ESSENCE_OPENINGS
        .iter()
        .any(|opening| lower.starts_with(opening))
    {
        score -= GENERIC_OPENING_PENALTY;
    }
    score
}

fn best_essence<'a, I>(candidates: I) -> Option<SourceText>
where
    I: Iterator<Item = &'a SourceText>,
{
    let mut best: Option<(&SourceText, i64)> = None;
    for st in candidates.filter(|st| !is_denied(&st.text, ESSENCE_DENY)) {
        let score = essence_score(st);
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((st, score));
        }
    }
    best.map(|(st, _)| st.clone())
}

/// Concatenate lists preserving first-seen order, deduplicating by
/// case-insensitive trimmed text. The first occurrence wins and keeps its
/// provenance fields.
fn dedup_by_text<'a, T, F>(lists: impl IntoIterator<Item = &'a [T]>, text_of: F) -> Vec<T>
where
    T: Clone + 'a,
    F: Fn(&T) -> &str,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();

    for list in lists {
        for item in list {
            let key = text_of(item).trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            if seen.insert(key) {
                merged.push(item.clone());
            }
        }
    }

    merged
}

/// Combine N partial extractions into one document-level facts object.
pub fn merge_extracted(partials: &[ExtractedFacts]) -> ExtractedFacts {
    let mut merged = ExtractedFacts::default();

    if let Some(client) = best_by_vote(
        partials.iter().map(|p| &p.client_name),
        CLIENT_NAME_DENY,
    ) {
        merged.client_name = client;
    }

    if let Some(essence) = best_essence(partials.iter().map(|p| &p.project_essence)) {
        merged.project_essence = essence;
    }

    merged.project_type = best_by_vote(
        partials.iter().map(|p| &p.project_type),
        PROJECT_TYPE_DENY,
    )
    .unwrap_or_else(|| SourceText::new("Other"));

    merged.business_goals = dedup_by_text(
        partials.iter().map(|p| p.business_goals.as_slice()),
        |st: &SourceText| st.text.as_str(),
    );
    merged.tech_stack = dedup_by_text(
        partials.iter().map(|p| p.tech_stack.as_slice()),
        |st: &SourceText| st.text.as_str(),
    );
    merged.client_integrations = dedup_by_text(
        partials.iter().map(|p| p.client_integrations.as_slice()),
        |st: &SourceText| st.text.as_str(),
    );

    let mut features = KeyFeatures::default();
    for category in FeatureCategory::ALL {
        *features.category_mut(category) = dedup_by_text(
            partials.iter().map(|p| p.key_features.category(category)),
            |item: &FeatureItem| item.text(),
        );
    }
    merged.key_features = features;

    log::debug!(
        "Merged {} partial extractions into {} features",
        partials.len(),
        merged.key_features.feature_count()
    );

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn facts_with_client(name: &str) -> ExtractedFacts {
        ExtractedFacts {
            client_name: SourceText::new(name),
            ..ExtractedFacts::default()
        }
    }

    fn facts_with_stack(stack: &[&str]) -> ExtractedFacts {
        ExtractedFacts {
            tech_stack: stack.iter().map(|s| SourceText::new(*s)).collect(),
            ..ExtractedFacts::default()
        }
    }

    #[test]
    fn test_client_name_placeholder_filtering() {
        let partials = vec![
            facts_with_client(""),
            facts_with_client("Unknown"),
            facts_with_client("Acme Corp"),
            facts_with_client("Acme Corp"),
        ];
        let merged = merge_extracted(&partials);
        assert_eq!(merged.client_name.text, "Acme Corp");
    }

    #[test]
    fn test_client_name_vote_tie_breaks_by_first_occurrence() {
        let partials = vec![
            facts_with_client("First Corp"),
            facts_with_client("Second Corp"),
        ];
        let merged = merge_extracted(&partials);
        assert_eq!(merged.client_name.text, "First Corp");
    }

    #[test]
    fn test_vote_winner_keeps_provenance() {
        let sourced = SourceText {
            text: "Acme Corp".to_string(),
            source_quote: Some("for Acme Corp".to_string()),
            page_number: Some(1),
        };
        let partials = vec![
            ExtractedFacts {
                client_name: sourced.clone(),
                ..ExtractedFacts::default()
            },
            facts_with_client("Acme Corp"),
        ];
        let merged = merge_extracted(&partials);
        assert_eq!(merged.client_name, sourced);
    }

    #[test]
    fn test_essence_penalizes_generic_openings() {
        let generic = "This document describes the system in general terms";
        let concrete = "Warehouse management platform for retail";
        let partials = vec![
            ExtractedFacts {
                project_essence: SourceText::new(generic),
                ..ExtractedFacts::default()
            },
            ExtractedFacts {
                project_essence: SourceText::new(concrete),
                ..ExtractedFacts::default()
            },
        ];
        let merged = merge_extracted(&partials);
        assert_eq!(merged.project_essence.text, concrete);
    }

    #[test]
    fn test_project_type_other_never_beats_concrete() {
        let partials = vec![
            ExtractedFacts {
                project_type: SourceText::new("Other"),
                ..ExtractedFacts::default()
            },
            ExtractedFacts {
                project_type: SourceText::new("Other"),
                ..ExtractedFacts::default()
            },
            ExtractedFacts {
                project_type: SourceText::new("ERP"),
                ..ExtractedFacts::default()
            },
        ];
        let merged = merge_extracted(&partials);
        assert_eq!(merged.project_type.text, "ERP");
    }

    #[test]
    fn test_project_type_falls_back_to_other() {
        let merged = merge_extracted(&[ExtractedFacts::default()]);
        assert_eq!(merged.project_type.text, "Other");
    }

    #[test]
    fn test_list_dedup_preserves_order_and_case_of_first() {
        let partials = vec![
            facts_with_stack(&["Python"]),
            facts_with_stack(&["python ", "React"]),
            facts_with_stack(&["REACT", "Postgres"]),
        ];
        let merged = merge_extracted(&partials);
        let stack: Vec<&str> = merged.tech_stack.iter().map(|st| st.text.as_str()).collect();
        assert_eq!(stack, ["Python", "React", "Postgres"]);
    }

    #[test]
    fn test_merge_is_associative_on_list_fields() {
        let a = facts_with_stack(&["Python"]);
        let b = facts_with_stack(&["Python", "React"]);
        let c = facts_with_stack(&["Rust"]);

        let left = merge_extracted(&[merge_extracted(&[a.clone(), b.clone()]), c.clone()]);
        let right = merge_extracted(&[a.clone(), merge_extracted(&[b.clone(), c.clone()])]);
        let flat = merge_extracted(&[a, b, c]);

        assert_eq!(left.tech_stack, flat.tech_stack);
        assert_eq!(right.tech_stack, flat.tech_stack);
    }

    #[test]
    fn test_failed_chunk_contributes_nothing() {
        let partials = vec![
            facts_with_stack(&["Python"]),
            facts_with_stack(&["Python", "React"]),
            ExtractedFacts::default(),
        ];
        let merged = merge_extracted(&partials);
        let stack: Vec<&str> = merged.tech_stack.iter().map(|st| st.text.as_str()).collect();
        assert_eq!(stack, ["Python", "React"]);
    }

    #[test]
    fn test_key_features_merge_per_category() {
        let mut a = ExtractedFacts::default();
        a.key_features.modules.push(FeatureItem::new("Auth"));
        a.key_features.screens.push(FeatureItem::new("Login"));

        let mut b = ExtractedFacts::default();
        b.key_features.modules.push(FeatureItem::new("auth"));
        b.key_features.modules.push(FeatureItem::new("Billing"));

        let merged = merge_extracted(&[a, b]);
        let modules: Vec<&str> = merged
            .key_features
            .modules
            .iter()
            .map(FeatureItem::text)
            .collect();
        assert_eq!(modules, ["Auth", "Billing"]);
        assert_eq!(merged.key_features.screens.len(), 1);
    }

    #[test]
    fn test_merge_of_empty_input() {
        let merged = merge_extracted(&[]);
        assert!(merged.client_name.is_blank());
        assert!(merged.tech_stack.is_empty());
    }
}
