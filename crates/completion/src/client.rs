use crate::error::{CompletionError, Result};
use crate::repair;
use crate::types::{ChatMessage, CompletionRequest, StructuredCompletion};
use async_trait::async_trait;
use serde_json::Value;
use std::time::{Duration, Instant};

/// Configuration for an OpenAI-compatible chat-completions backend.
#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    /// Base URL of the API, e.g. `http://llm-server:8000/v1`
    pub base_url: String,

    pub api_key: String,

    pub model: String,

    /// Attempts per request, including the first
    pub max_retries: u32,
}

impl OpenAiCompatConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_retries: 3,
        }
    }
}

/// Completion client for OpenAI-compatible serving endpoints.
///
/// Handles schema injection, transient-error retries with exponential
/// backoff, context-limit detection, and one self-correction round when the
/// output cannot be repaired into JSON.
pub struct OpenAiCompatClient {
    config: OpenAiCompatConfig,
    http: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(config: OpenAiCompatConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| CompletionError::Unknown(format!("HTTP client init failed: {e}")))?;

        log::info!("Completion client initialized for model: {}", config.model);
        Ok(Self { config, http })
    }

    async fn send(&self, messages: &[ChatMessage], request: &CompletionRequest) -> Result<String> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "response_format": {"type": "json_object"},
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status_error(status, &text));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| CompletionError::Validation(format!("malformed response body: {e}")))?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("");
        if content.is_empty() {
            return Err(CompletionError::Validation(
                "empty response from backend".to_string(),
            ));
        }

        Ok(content.to_string())
    }
}

fn classify_transport_error(err: reqwest::Error) -> CompletionError {
    if err.is_timeout() || err.is_connect() {
        CompletionError::Transient(err.to_string())
    } else {
        CompletionError::Unknown(err.to_string())
    }
}

fn classify_status_error(status: reqwest::StatusCode, body: &str) -> CompletionError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return CompletionError::Transient(format!("backend returned {status}"));
    }

    // A 400 usually means the context window was exceeded.
    if status == reqwest::StatusCode::BAD_REQUEST && body.to_lowercase().contains("context") {
        return CompletionError::ContextLimit;
    }

    CompletionError::Unknown(format!("backend returned {status}: {body}"))
}

#[async_trait]
impl StructuredCompletion for OpenAiCompatClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Value> {
        let mut messages = request.messages_with_schema();
        let max_retries = self.config.max_retries.max(1);
        let mut last_error = CompletionError::Unknown("no attempts made".to_string());

        for attempt in 0..max_retries {
            log::info!(
                "Requesting '{}' [attempt {}/{}]",
                request.tool_name,
                attempt + 1,
                max_retries
            );

            let started = Instant::now();
            match self.send(&messages, &request).await {
                Ok(raw) => {
                    log::debug!(
                        "Backend answered '{}' in {:.2}s",
                        request.tool_name,
                        started.elapsed().as_secs_f64()
                    );
                    match repair::lenient_parse(&raw) {
                        Ok(value) => return Ok(value),
                        Err(err) => {
                            log::warn!("Output repair failed for '{}': {err}", request.tool_name);
                            if attempt + 1 < max_retries {
                                // Feed the error back once instead of
                                // appending the whole broken response, which
                                // would grow the context every round.
                                let feedback: String = err.to_string().chars().take(500).collect();
                                messages.push(ChatMessage::user(format!(
                                    "The previous response contained invalid JSON: {feedback}\n\n\
                                     Try again. Return ONLY a valid JSON object without markdown \
                                     fences."
                                )));
                                tokio::time::sleep(Duration::from_secs(1)).await;
                            }
                            last_error = err;
                        }
                    }
                }
                Err(CompletionError::ContextLimit) => {
                    log::error!("Context window exceeded for '{}'", request.tool_name);
                    return Err(CompletionError::ContextLimit);
                }
                Err(err) if err.is_transient() => {
                    let delay = Duration::from_secs(1 << attempt.min(5));
                    log::warn!(
                        "Transient backend failure for '{}': {err}. Retrying in {delay:?}",
                        request.tool_name
                    );
                    if attempt + 1 < max_retries {
                        tokio::time::sleep(delay).await;
                    }
                    last_error = err;
                }
                Err(err) => {
                    log::error!("Backend failure for '{}': {err}", request.tool_name);
                    if attempt + 1 < max_retries {
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                    last_error = err;
                }
            }
        }

        Err(last_error)
    }
}
