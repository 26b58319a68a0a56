//! `POST /api/v1/ask`

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use askthen_core::orchestrator::{AskRequest, PipelineResult};

use super::{ApiError, ErrorBody, SharedState};
use crate::imaging::decode_payload;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AskBody {
    /// The question
    pub query: String,
    /// Answers to the previous round's clarifying questions
    #[serde(default)]
    pub clarifications: Option<Vec<String>>,
    /// Single base64 image; used only when `images_base64` is absent or empty
    #[serde(default)]
    pub image_base64: Option<String>,
    /// Base64 images in presentation order
    #[serde(default)]
    pub images_base64: Option<Vec<String>>,
}

impl AskBody {
    fn encoded_images(&self) -> Vec<&str> {
        match &self.images_base64 {
            Some(images) if !images.is_empty() => images.iter().map(String::as_str).collect(),
            _ => self
                .image_base64
                .as_deref()
                .filter(|i| !i.trim().is_empty())
                .into_iter()
                .collect(),
        }
    }

    pub fn into_request(self) -> Result<AskRequest, ApiError> {
        if self.query.trim().is_empty() {
            return Err(ApiError::BadRequest("query must not be empty".into()));
        }
        let images = self
            .encoded_images()
            .into_iter()
            .map(decode_payload)
            .collect::<Result<Vec<_>, _>>()?;

        let mut request = AskRequest::new(self.query).with_images(images);
        request.clarifications = self.clarifications;
        Ok(request)
    }
}

/// Wire shape of a pipeline result
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct AskResponse {
    pub need_clarification: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarification_questions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judge: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<PipelineResult> for AskResponse {
    fn from(result: PipelineResult) -> Self {
        AskResponse {
            need_clarification: result.needs_clarification(),
            clarification_questions: result.questions().map(<[String]>::to_vec),
            role: Some(result.role().to_string()),
            answer: result.answer(),
            judge: result.judge(),
            reason: result.reason().map(str::to_string),
        }
    }
}

/// Ask a question
#[utoipa::path(
    post,
    path = "/api/v1/ask",
    tag = "pipeline",
    request_body = AskBody,
    responses(
        (status = 200, description = "Answer or clarifying questions", body = AskResponse),
        (status = 400, description = "Malformed request or image data", body = ErrorBody),
        (status = 502, description = "Backend failure", body = ErrorBody),
        (status = 503, description = "No backend configured", body = ErrorBody),
        (status = 504, description = "Backend timed out", body = ErrorBody)
    )
)]
pub async fn ask(
    State(state): State<SharedState>,
    Json(body): Json<AskBody>,
) -> Result<Json<AskResponse>, ApiError> {
    let request = body.into_request()?;
    let orchestrator = state.orchestrator().await.ok_or_else(|| {
        ApiError::Unavailable("completion backend is not configured; check the API key".into())
    })?;

    tracing::info!(
        images = request.images.len(),
        followup = request.clarifications.is_some(),
        "Ask request"
    );
    let result = orchestrator.run(request).await?;
    Ok(Json(AskResponse::from(result)))
}
