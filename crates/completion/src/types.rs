use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// One chat message sent to the completion backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A structured-completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,

    /// JSON schema the output must match; injected into the system prompt
    pub schema: Option<Value>,

    /// Short name identifying the request in logs and test scripts
    pub tool_name: String,

    pub temperature: f32,

    pub max_tokens: u32,

    /// Upper bound on one backend round trip
    pub timeout: Duration,
}

impl CompletionRequest {
    pub fn new(tool_name: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            schema: None,
            tool_name: tool_name.into(),
            temperature: 0.1,
            max_tokens: 8_192,
            timeout: Duration::from_secs(1_200),
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Messages with the schema instruction folded into the system prompt.
    /// A request without a system message gets one prepended.
    pub fn messages_with_schema(&self) -> Vec<ChatMessage> {
        let Some(schema) = &self.schema else {
            return self.messages.clone();
        };

        let rendered = serde_json::to_string_pretty(schema).unwrap_or_default();
        let instruction = format!(
            "\n\nIMPORTANT: Output MUST be a single valid JSON object strictly \
             matching this schema:\n```json\n{rendered}\n```\n\
             Do not write any explanations."
        );

        let mut messages = self.messages.clone();
        match messages.first_mut() {
            Some(first) if first.role == "system" => first.content.push_str(&instruction),
            _ => messages.insert(0, ChatMessage::system(instruction.trim_start().to_string())),
        }
        messages
    }
}

/// The structured-completion capability.
///
/// Implementations own their retry and repair policy; a returned error means
/// the request is exhausted and the caller should substitute its zero value.
#[async_trait]
pub trait StructuredCompletion: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_appended_to_system_message() {
        let request = CompletionRequest::new(
            "extract",
            vec![
                ChatMessage::system("You are an analyst."),
                ChatMessage::user("Analyze this."),
            ],
        )
        .with_schema(json!({"type": "object"}));

        let messages = request.messages_with_schema();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.starts_with("You are an analyst."));
        assert!(messages[0].content.contains("matching this schema"));
    }

    #[test]
    fn test_schema_prepended_without_system_message() {
        let request = CompletionRequest::new("extract", vec![ChatMessage::user("Analyze.")])
            .with_schema(json!({"type": "object"}));

        let messages = request.messages_with_schema();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
    }

    #[test]
    fn test_no_schema_leaves_messages_untouched() {
        let request = CompletionRequest::new("chat", vec![ChatMessage::user("Hi")]);
        assert_eq!(request.messages_with_schema().len(), 1);
    }
}
