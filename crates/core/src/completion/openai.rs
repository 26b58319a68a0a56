//! OpenAI-compatible completion client.
//!
//! Speaks the `/chat/completions` wire format shared by OpenAI, OpenRouter,
//! Gemini's compatibility endpoint, xAI and DeepSeek. Text and structured
//! calls use `ModelConfig::model`; image calls use `ModelConfig::vision_model`.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{
    image_marker, CallOptions, CompletionClient, CompletionError, CompletionResult, ImagePayload,
    StructuredSchema,
};
use crate::models::ModelConfig;

/// Longest error body kept in [`CompletionError::Status`]
const MAX_ERROR_BODY: usize = 500;

pub struct OpenAiCompatClient {
    config: ModelConfig,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatClient {
    /// Build a client, reading the API key from the provider's variable
    pub fn from_env(config: ModelConfig) -> CompletionResult<Self> {
        let var = config.provider.env_var();
        let api_key = std::env::var(var)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CompletionError::MissingApiKey(var.to_string()))?;
        Self::new(config, api_key)
    }

    pub fn new(config: ModelConfig, api_key: impl Into<String>) -> CompletionResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CompletionError::Http(e.to_string()))?;
        Ok(Self {
            config,
            api_key: api_key.into(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.effective_base_url().trim_end_matches('/')
        )
    }

    fn base_body(&self, model: &str, content: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "model": model,
            "temperature": self.config.temperature,
            "messages": [{ "role": "user", "content": content }],
        })
    }

    async fn send(&self, body: serde_json::Value) -> CompletionResult<String> {
        tracing::debug!(endpoint = %self.endpoint(), "Sending completion request");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CompletionError::MalformedResponse("response had no content".into()))
    }

    fn map_transport_error(&self, e: reqwest::Error) -> CompletionError {
        if e.is_timeout() {
            CompletionError::Timeout(self.config.request_timeout_secs)
        } else if e.is_decode() {
            CompletionError::MalformedResponse(e.to_string())
        } else {
            CompletionError::Http(e.to_string())
        }
    }
}

/// Content parts for a batched vision call: prompt, then marker + image per input
fn vision_parts(prompt: &str, images: &[ImagePayload]) -> serde_json::Value {
    let mut parts = vec![serde_json::json!({ "type": "text", "text": prompt })];
    for (index, image) in images.iter().enumerate() {
        parts.push(serde_json::json!({ "type": "text", "text": image_marker(index) }));
        parts.push(serde_json::json!({
            "type": "image_url",
            "image_url": { "url": image.data_url() }
        }));
    }
    serde_json::Value::Array(parts)
}

/// Pull a JSON value out of model text, tolerating markdown fences
fn extract_json(content: &str) -> CompletionResult<serde_json::Value> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(unfenced).map_err(|e| CompletionError::MalformedResponse(e.to_string()))
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    async fn generate_text(&self, prompt: &str, options: CallOptions) -> CompletionResult<String> {
        let mut body = self.base_body(&self.config.model, serde_json::json!(prompt));
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        self.send(body).await
    }

    async fn generate_structured(
        &self,
        prompt: &str,
        schema: &StructuredSchema,
    ) -> CompletionResult<serde_json::Value> {
        let body = if self.config.provider.supports_json_schema() {
            let mut body = self.base_body(&self.config.model, serde_json::json!(prompt));
            body["response_format"] = serde_json::json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name,
                    "schema": schema.schema,
                    "strict": false,
                }
            });
            body
        } else {
            let prompt = format!(
                "{}\n\nRespond with a single JSON object matching this JSON schema:\n{}",
                prompt, schema.schema
            );
            let mut body = self.base_body(&self.config.model, serde_json::json!(prompt));
            body["response_format"] = serde_json::json!({ "type": "json_object" });
            body
        };

        let content = self.send(body).await?;
        extract_json(&content)
    }

    async fn describe_image(&self, prompt: &str, image: &ImagePayload) -> CompletionResult<String> {
        let content = serde_json::json!([
            { "type": "text", "text": prompt },
            { "type": "image_url", "image_url": { "url": image.data_url() } }
        ]);
        self.send(self.base_body(&self.config.vision_model, content))
            .await
    }

    async fn describe_images(
        &self,
        prompt: &str,
        images: &[ImagePayload],
    ) -> CompletionResult<String> {
        let body = self.base_body(&self.config.vision_model, vision_parts(prompt, images));
        self.send(body).await
    }
}
