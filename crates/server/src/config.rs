//! # Persisted Configuration
//!
//! Server settings stored as JSON under `.askthen/config.json`. Every field is
//! optional; unset fields fall back to the provider defaults in
//! [`askthen_core::models`].

use askthen_core::models::{LlmProvider, ModelConfig};
use askthen_core::orchestrator::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use utoipa::ToSchema;

/// Default location of the config file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = ".askthen/config.json";

/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`]
pub const CONFIG_PATH_ENV: &str = "ASKTHEN_CONFIG";

/// Path of the config file in effect
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, ToSchema)]
pub struct PersistedConfig {
    /// Provider id: openai, openrouter, gemini, grok or deepseek
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vision_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_answer_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_sufficiency_on_followup: Option<bool>,
}

impl PersistedConfig {
    pub async fn load() -> Self {
        Self::load_from(&config_path()).await
    }

    /// Missing or unreadable files yield the default config
    pub async fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match tokio::fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), "Ignoring malformed config: {}", e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to read config: {}", e);
                Self::default()
            }
        }
    }

    pub async fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(path, content).await
    }

    /// Overlay every field `other` sets
    pub fn merge(&mut self, other: PersistedConfig) {
        if other.provider.is_some() {
            self.provider = other.provider;
        }
        if other.model.is_some() {
            self.model = other.model;
        }
        if other.vision_model.is_some() {
            self.vision_model = other.vision_model;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.temperature.is_some() {
            self.temperature = other.temperature;
        }
        if other.request_timeout_secs.is_some() {
            self.request_timeout_secs = other.request_timeout_secs;
        }
        if other.max_answer_tokens.is_some() {
            self.max_answer_tokens = other.max_answer_tokens;
        }
        if other.skip_sufficiency_on_followup.is_some() {
            self.skip_sufficiency_on_followup = other.skip_sufficiency_on_followup;
        }
    }

    /// Resolve against provider defaults. An unknown provider id is an error.
    pub fn model_config(&self) -> anyhow::Result<ModelConfig> {
        let provider = match self.provider.as_deref() {
            Some(id) => LlmProvider::from_id(id)
                .ok_or_else(|| anyhow::anyhow!("unknown provider '{}'", id))?,
            None => LlmProvider::default(),
        };

        let mut config = ModelConfig::for_provider(provider);
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(model) = &self.vision_model {
            config = config.with_vision_model(model.clone());
        }
        if let Some(url) = self.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            config = config.with_base_url(url);
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout_secs = secs;
        }
        Ok(config)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            skip_sufficiency_on_followup: self.skip_sufficiency_on_followup.unwrap_or(false),
            max_answer_tokens: self.max_answer_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overlays_only_set_fields() {
        let mut config = PersistedConfig {
            provider: Some("openai".into()),
            model: Some("gpt-4o-mini".into()),
            ..Default::default()
        };
        config.merge(PersistedConfig {
            model: Some("gpt-4.1-mini".into()),
            skip_sufficiency_on_followup: Some(true),
            ..Default::default()
        });

        assert_eq!(config.provider.as_deref(), Some("openai"));
        assert_eq!(config.model.as_deref(), Some("gpt-4.1-mini"));
        assert_eq!(config.skip_sufficiency_on_followup, Some(true));
    }

    #[test]
    fn test_model_config_uses_provider_defaults() {
        let config = PersistedConfig::default().model_config().unwrap();
        assert_eq!(config.provider, LlmProvider::OpenAI);
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.vision_model, "gpt-4o");
        assert_eq!(config.request_timeout_secs, 60);

        let config = PersistedConfig {
            provider: Some("xai".into()),
            base_url: Some("http://localhost:8000/v1".into()),
            request_timeout_secs: Some(5),
            ..Default::default()
        }
        .model_config()
        .unwrap();
        assert_eq!(config.provider, LlmProvider::Grok);
        assert_eq!(config.effective_base_url(), "http://localhost:8000/v1");
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn test_answer_cap_lands_on_pipeline_config() {
        let config = PersistedConfig {
            max_answer_tokens: Some(400),
            ..Default::default()
        };
        assert_eq!(config.pipeline_config().max_answer_tokens, Some(400));
        assert_eq!(PersistedConfig::default().pipeline_config().max_answer_tokens, None);
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let config = PersistedConfig {
            provider: Some("acme".into()),
            ..Default::default()
        };
        assert!(config.model_config().is_err());
    }

    #[test]
    fn test_empty_json_is_default() {
        let config: PersistedConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PersistedConfig::default());
        assert_eq!(serde_json::to_string(&config).unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = std::env::temp_dir().join(format!("askthen-config-{}", std::process::id()));
        let path = dir.join("config.json");
        let config = PersistedConfig {
            provider: Some("deepseek".into()),
            max_answer_tokens: Some(800),
            ..Default::default()
        };

        config.save_to(&path).await.unwrap();
        assert_eq!(PersistedConfig::load_from(&path).await, config);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_loads_default() {
        let path = std::env::temp_dir().join("askthen-does-not-exist/config.json");
        assert_eq!(PersistedConfig::load_from(&path).await, PersistedConfig::default());
    }
}
