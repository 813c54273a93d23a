use anyhow::Context;
use proposal_chunker::SplitterConfig;
use proposal_completion::OpenAiCompatConfig;
use proposal_facts::RateCard;
use proposal_workflow::WorkflowConfig;
use serde::Deserialize;
use std::path::Path;

/// Operator configuration, loaded from an optional TOML file with
/// environment-variable fallbacks for the backend settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub splitter: SplitterConfig,

    /// Chunks processed concurrently per batch
    pub batch_size: usize,

    pub backend: BackendConfig,

    /// Hourly rates per role, used by `run --approve`
    pub rates: RateCard,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            splitter: SplitterConfig::default(),
            batch_size: 1,
            backend: BackendConfig::default(),
            rates: RateCard::new(),
        }
    }
}

impl CliConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn workflow_config(&self) -> WorkflowConfig {
        WorkflowConfig {
            splitter: self.splitter.clone(),
            batch_size: self.batch_size,
            ..WorkflowConfig::default()
        }
    }
}

/// Completion backend settings. Every field falls back to an environment
/// variable so the config file stays optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

impl BackendConfig {
    pub fn resolve(&self) -> anyhow::Result<OpenAiCompatConfig> {
        let base_url = self
            .base_url
            .clone()
            .or_else(|| std::env::var("PROPOSAL_LLM_BASE_URL").ok())
            .context(
                "completion backend not configured: set [backend].base_url or PROPOSAL_LLM_BASE_URL",
            )?;

        let api_key = self
            .api_key
            .clone()
            .or_else(|| std::env::var("PROPOSAL_LLM_API_KEY").ok())
            .unwrap_or_default();

        let model = self
            .model
            .clone()
            .or_else(|| std::env::var("PROPOSAL_LLM_MODEL").ok())
            .unwrap_or_else(|| "qwen2.5-32b-instruct".to_string());

        Ok(OpenAiCompatConfig::new(base_url, api_key, model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_config() {
        let raw = r#"
            batch_size = 3

            [splitter]
            chunk_size = 50000
            overlap = 2000
            newline_window = 800

            [backend]
            base_url = "http://llm:8000/v1"
            model = "test-model"

            [rates]
            Backend = 120.0
            Designer = 90.0
        "#;

        let config: CliConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.batch_size, 3);
        assert_eq!(config.splitter.chunk_size, 50_000);
        assert_eq!(config.backend.model.as_deref(), Some("test-model"));
        assert_eq!(config.rates["Backend"], 120.0);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: CliConfig = toml::from_str("").unwrap();
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.splitter.chunk_size, 12_000);
        assert!(config.rates.is_empty());
    }
}
