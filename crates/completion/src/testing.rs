//! Scripted completion double for deterministic pipeline tests.
//!
//! Responses are scripted per tool name, so tests stay stable no matter how
//! concurrent callers interleave their requests.

use crate::error::{CompletionError, Result};
use crate::types::{CompletionRequest, StructuredCompletion};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// A [`StructuredCompletion`] returning pre-scripted outcomes.
#[derive(Default)]
pub struct MockCompletion {
    scripts: Mutex<HashMap<String, VecDeque<Result<Value>>>>,
    calls: Mutex<Vec<String>>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response for the given tool name
    pub fn script_ok(&self, tool_name: &str, value: Value) {
        self.scripts
            .lock()
            .expect("mock scripts lock")
            .entry(tool_name.to_string())
            .or_default()
            .push_back(Ok(value));
    }

    /// Queue a failure for the given tool name
    pub fn script_err(&self, tool_name: &str, error: CompletionError) {
        self.scripts
            .lock()
            .expect("mock scripts lock")
            .entry(tool_name.to_string())
            .or_default()
            .push_back(Err(error));
    }

    /// Tool names of all requests seen so far, in arrival order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("mock calls lock").clone()
    }
}

#[async_trait]
impl StructuredCompletion for MockCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<Value> {
        self.calls
            .lock()
            .expect("mock calls lock")
            .push(request.tool_name.clone());

        self.scripts
            .lock()
            .expect("mock scripts lock")
            .get_mut(&request.tool_name)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(CompletionError::Unknown(format!(
                    "no scripted response for '{}'",
                    request.tool_name
                )))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_pops_in_order_per_tool() {
        let mock = MockCompletion::new();
        mock.script_ok("extract", json!({"n": 1}));
        mock.script_ok("extract", json!({"n": 2}));
        mock.script_err("analyze", CompletionError::ContextLimit);

        let request = |tool: &str| CompletionRequest::new(tool, vec![ChatMessage::user("x")]);

        assert_eq!(mock.complete(request("extract")).await.unwrap(), json!({"n": 1}));
        assert!(matches!(
            mock.complete(request("analyze")).await.unwrap_err(),
            CompletionError::ContextLimit
        ));
        assert_eq!(mock.complete(request("extract")).await.unwrap(), json!({"n": 2}));

        // Exhausted scripts fail loudly.
        assert!(mock.complete(request("extract")).await.is_err());
        assert_eq!(mock.calls(), ["extract", "analyze", "extract", "extract"]);
    }
}
