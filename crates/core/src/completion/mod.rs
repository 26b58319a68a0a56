//! # Completion Client
//!
//! The seam between the pipeline and the text/vision generation backend.
//! Skills only ever see [`CompletionClient`]; the HTTP implementation lives in
//! [`openai`] and tests substitute a scripted double.

pub mod openai;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

/// Failure talking to the completion backend.
///
/// The pipeline treats every variant as one opaque "backend failure"; the
/// variants exist for logging and for the boundary's status mapping.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompletionError {
    #[error("missing API key: set {0}")]
    MissingApiKey(String),
    #[error("request to completion backend failed: {0}")]
    Http(String),
    #[error("completion backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion backend timed out after {0}s")]
    Timeout(u64),
    #[error("malformed backend response: {0}")]
    MalformedResponse(String),
    #[error("backend output did not match schema '{schema}': {detail}")]
    SchemaViolation { schema: String, detail: String },
}

impl CompletionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CompletionError::Timeout(_))
    }
}

pub type CompletionResult<T> = Result<T, CompletionError>;

/// Binary image handed to the vision backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    /// MIME type, e.g. `image/jpeg`
    pub media_type: String,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
        }
    }

    /// JPEG payload, the format the upload endpoint produces
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self::new(bytes, "image/jpeg")
    }

    /// `data:` URL accepted by OpenAI-compatible vision endpoints
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, BASE64.encode(&self.bytes))
    }
}

/// Marker placed before the image at `index` (zero-based) in a batched call
pub fn image_marker(index: usize) -> String {
    format!("[Image {}]", index + 1)
}

/// Per-call knobs for free-form generation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Hard cap on generated tokens
    pub max_tokens: Option<u32>,
}

impl CallOptions {
    pub fn capped(max_tokens: u32) -> Self {
        Self {
            max_tokens: Some(max_tokens),
        }
    }
}

/// JSON schema a structured call must conform to
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredSchema {
    pub name: String,
    pub schema: serde_json::Value,
}

impl StructuredSchema {
    pub fn for_type<T: JsonSchema>() -> Self {
        let schema = serde_json::to_value(schemars::schema_for!(T))
            .unwrap_or_else(|_| serde_json::json!({ "type": "object" }));
        Self {
            name: T::schema_name().into_owned(),
            schema,
        }
    }
}

/// Stateless request/response interface to the generation backend.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Free-form text completion
    async fn generate_text(&self, prompt: &str, options: CallOptions) -> CompletionResult<String>;

    /// Completion constrained to `schema`; returns the raw JSON object
    async fn generate_structured(
        &self,
        prompt: &str,
        schema: &StructuredSchema,
    ) -> CompletionResult<serde_json::Value>;

    /// Describe a single image
    async fn describe_image(&self, prompt: &str, image: &ImagePayload) -> CompletionResult<String>;

    /// Describe several images in one call; each image is preceded by its
    /// [`image_marker`] in input order
    async fn describe_images(
        &self,
        prompt: &str,
        images: &[ImagePayload],
    ) -> CompletionResult<String>;
}

/// Run a structured call and deserialize it into `T`.
///
/// Output that fails to deserialize is requested once more before giving up
/// with [`CompletionError::SchemaViolation`]. Backend failures are returned
/// immediately.
pub async fn generate_typed<T>(client: &dyn CompletionClient, prompt: &str) -> CompletionResult<T>
where
    T: DeserializeOwned + JsonSchema,
{
    let schema = StructuredSchema::for_type::<T>();
    let mut detail = String::new();

    for attempt in 1..=2 {
        let value = client.generate_structured(prompt, &schema).await?;
        match serde_json::from_value::<T>(value) {
            Ok(parsed) => return Ok(parsed),
            Err(e) => {
                tracing::warn!(schema = %schema.name, attempt, "Structured output rejected: {}", e);
                detail = e.to_string();
            }
        }
    }

    Err(CompletionError::SchemaViolation {
        schema: schema.name,
        detail,
    })
}
