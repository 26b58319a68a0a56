//! # Askthen Models
//!
//! Centralized LLM configuration types for the askthen pipeline.
//! Every supported provider is reached through the OpenAI-compatible
//! chat-completions wire format, so a provider is little more than a
//! default endpoint, an API-key variable and a pair of default models.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::completion::openai::OpenAiCompatClient;
use crate::completion::CompletionClient;

/// Supported LLM providers
///
/// - OpenAI (GPT) - `OPENAI_API_KEY`
/// - OpenRouter (Gateway) - `OPENROUTER_API_KEY`
/// - Gemini (Google, OpenAI-compatible endpoint) - `GEMINI_API_KEY`
/// - Grok (xAI) - `XAI_API_KEY`
/// - DeepSeek - `DEEPSEEK_API_KEY`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    #[serde(rename = "openai")]
    OpenAI,
    OpenRouter,
    Gemini,
    Grok,
    DeepSeek,
}

impl LlmProvider {
    /// Get all available providers
    pub fn all() -> Vec<LlmProvider> {
        vec![
            LlmProvider::OpenAI,
            LlmProvider::OpenRouter,
            LlmProvider::Gemini,
            LlmProvider::Grok,
            LlmProvider::DeepSeek,
        ]
    }

    /// Parse the lowercase identifier used in config files and the API
    pub fn from_id(id: &str) -> Option<LlmProvider> {
        match id.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(LlmProvider::OpenAI),
            "openrouter" => Some(LlmProvider::OpenRouter),
            "gemini" => Some(LlmProvider::Gemini),
            "grok" | "xai" => Some(LlmProvider::Grok),
            "deepseek" => Some(LlmProvider::DeepSeek),
            _ => None,
        }
    }

    /// Lowercase identifier, inverse of [`LlmProvider::from_id`]
    pub fn id(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "openai",
            LlmProvider::OpenRouter => "openrouter",
            LlmProvider::Gemini => "gemini",
            LlmProvider::Grok => "grok",
            LlmProvider::DeepSeek => "deepseek",
        }
    }

    /// Display name for UI
    pub fn display_name(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "OpenAI",
            LlmProvider::OpenRouter => "OpenRouter",
            LlmProvider::Gemini => "Gemini",
            LlmProvider::Grok => "Grok",
            LlmProvider::DeepSeek => "DeepSeek",
        }
    }

    /// Environment variable holding the API key
    pub fn env_var(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
            LlmProvider::Gemini => "GEMINI_API_KEY",
            LlmProvider::Grok => "XAI_API_KEY",
            LlmProvider::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }

    /// Chat-completions endpoint used when no base URL override is configured
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "https://api.openai.com/v1",
            LlmProvider::OpenRouter => "https://openrouter.ai/api/v1",
            LlmProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
            LlmProvider::Grok => "https://api.x.ai/v1",
            LlmProvider::DeepSeek => "https://api.deepseek.com/v1",
        }
    }

    /// Default text model
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "gpt-4o-mini",
            LlmProvider::OpenRouter => "openai/gpt-4o-mini",
            LlmProvider::Gemini => "gemini-2.0-flash",
            LlmProvider::Grok => "grok-2",
            LlmProvider::DeepSeek => "deepseek-chat",
        }
    }

    /// Default vision-capable model
    pub fn default_vision_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "gpt-4o",
            LlmProvider::OpenRouter => "openai/gpt-4o",
            LlmProvider::Gemini => "gemini-2.0-flash",
            LlmProvider::Grok => "grok-2-vision",
            // DeepSeek has no vision endpoint; users must point vision_model elsewhere
            LlmProvider::DeepSeek => "deepseek-chat",
        }
    }

    /// Whether the provider accepts `response_format: json_schema`
    pub fn supports_json_schema(&self) -> bool {
        !matches!(self, LlmProvider::DeepSeek)
    }
}

/// Default per-call timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Configuration for LLM model selection
///
/// ## Example
/// ```rust,ignore
/// use askthen_core::models::{LlmProvider, ModelConfig};
///
/// let config = ModelConfig::with_provider(LlmProvider::OpenRouter, "openai/gpt-4o-mini");
/// let client = config.create_client()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// LLM provider to use
    #[serde(default)]
    pub provider: LlmProvider,
    /// Text model name (e.g., "gpt-4o-mini")
    pub model: String,
    /// Vision model name used for image description
    pub vision_model: String,
    /// Optional base URL override for OpenAI-compatible APIs
    #[serde(default)]
    pub base_url: Option<String>,
    /// Sampling temperature for every call
    #[serde(default)]
    pub temperature: f32,
    /// Per-call timeout; a timeout is reported as a backend failure
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::with_provider(LlmProvider::OpenAI, LlmProvider::OpenAI.default_model())
    }
}

impl ModelConfig {
    /// Create a new model config with default provider (OpenAI)
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_provider(LlmProvider::OpenAI, model)
    }

    /// Create config for a specific provider
    pub fn with_provider(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            vision_model: provider.default_vision_model().to_string(),
            base_url: None,
            temperature: 0.0,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }

    /// Config using the provider's default text and vision models
    pub fn for_provider(provider: LlmProvider) -> Self {
        Self::with_provider(provider, provider.default_model())
    }

    /// Set the vision model
    pub fn with_vision_model(mut self, model: impl Into<String>) -> Self {
        self.vision_model = model.into();
        self
    }

    /// Set base URL (for OpenAI-compatible endpoints)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Base URL in effect, override first
    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    /// Whether the provider's API key variable is present
    pub fn api_key_present(&self) -> bool {
        std::env::var(self.provider.env_var())
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false)
    }

    /// Create a completion client based on the configured provider
    pub fn create_client(&self) -> anyhow::Result<Arc<dyn CompletionClient>> {
        let client = OpenAiCompatClient::from_env(self.clone())?;
        Ok(Arc::new(client))
    }
}
