//! Repair of malformed completion output before it is treated as a hard
//! failure: markdown-fence stripping, a plain parse, and a regex fallback
//! that extracts the outermost JSON object from surrounding prose.

use crate::error::{CompletionError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static JSON_OBJECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid static regex"));

/// Strip a surrounding markdown code fence, if any.
pub fn strip_markdown_fences(content: &str) -> &str {
    let mut s = content.trim();
    if s.starts_with("```") {
        s = s
            .trim_start_matches("```json")
            .trim_start_matches("```JSON")
            .trim_start_matches("```");
        if let Some(stripped) = s.trim_end().strip_suffix("```") {
            s = stripped;
        }
    }
    s.trim()
}

/// Parse completion output into JSON, repairing common formatting issues.
pub fn lenient_parse(raw: &str) -> Result<Value> {
    let cleaned = strip_markdown_fences(raw);

    if let Ok(value) = serde_json::from_str(cleaned) {
        return Ok(value);
    }

    // Last resort: the model wrapped the object in explanation text.
    if let Some(found) = JSON_OBJECT_RE.find(cleaned) {
        if let Ok(value) = serde_json::from_str(found.as_str()) {
            return Ok(value);
        }
    }

    let preview: String = cleaned.chars().take(200).collect();
    Err(CompletionError::Validation(format!(
        "unparseable completion output: {preview}"
    )))
}
