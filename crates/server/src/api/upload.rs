//! `POST /api/v1/upload-image`

use axum::extract::Multipart;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use super::{ApiError, ErrorBody};
use crate::imaging::{ensure_image_content_type, prepare_upload};

/// Multipart form accepted by the upload endpoint
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// The image file
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    /// JPEG, base64 encoded, ready for `images_base64`
    pub image_base64: String,
    pub filename: Option<String>,
    /// Length of `image_base64` in characters
    pub size: usize,
}

/// Normalize an uploaded image for the ask endpoint
#[utoipa::path(
    post,
    path = "/api/v1/upload-image",
    tag = "images",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Preprocessed image", body = UploadResponse),
        (status = 400, description = "Not an image or unreadable", body = ErrorBody)
    )
)]
pub async fn upload_image(mut multipart: Multipart) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        ensure_image_content_type(field.content_type())?;
        let filename = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        let prepared = tokio::task::spawn_blocking(move || prepare_upload(&bytes))
            .await
            .map_err(|e| ApiError::BadRequest(format!("image processing aborted: {}", e)))??;

        let image_base64 = prepared.to_base64();
        tracing::info!(
            filename = filename.as_deref().unwrap_or("-"),
            width = prepared.width,
            height = prepared.height,
            "Image uploaded"
        );
        return Ok(Json(UploadResponse {
            size: image_base64.len(),
            image_base64,
            filename,
        }));
    }

    Err(ApiError::BadRequest("missing multipart field 'file'".into()))
}
