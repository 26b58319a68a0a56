//! # HTTP API
//!
//! Versioned routes live under `/api/v1`. `/api/ask` and `/api/upload-image`
//! are kept as unversioned aliases for older clients.

pub mod ask;
pub mod meta;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::{OpenApi, ToSchema};

use askthen_core::completion::CompletionClient;
use askthen_core::models::ModelConfig;
use askthen_core::orchestrator::{Orchestrator, PipelineError};
use askthen_core::roles::RoleCatalog;

use crate::config::PersistedConfig;
use crate::imaging::ImagingError;

/// Request bodies carry base64 images, so the default 2 MB limit is too small
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Builds a completion client for a resolved model config
pub type ClientFactory =
    Arc<dyn Fn(&ModelConfig) -> anyhow::Result<Arc<dyn CompletionClient>> + Send + Sync>;

pub struct AppState {
    catalog: Arc<RoleCatalog>,
    /// None until a usable client could be built (e.g. API key missing)
    orchestrator: RwLock<Option<Arc<Orchestrator>>>,
    config: RwLock<PersistedConfig>,
    config_path: PathBuf,
    client_factory: ClientFactory,
    started_at: Instant,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        config: PersistedConfig,
        config_path: PathBuf,
        catalog: Arc<RoleCatalog>,
        client_factory: ClientFactory,
    ) -> Self {
        let orchestrator = match build_orchestrator(&config, &catalog, &client_factory) {
            Ok(orchestrator) => Some(orchestrator),
            Err(e) => {
                tracing::warn!("Pipeline unavailable until configuration is fixed: {:#}", e);
                None
            }
        };
        Self {
            catalog,
            orchestrator: RwLock::new(orchestrator),
            config: RwLock::new(config),
            config_path,
            client_factory,
            started_at: Instant::now(),
        }
    }

    pub fn catalog(&self) -> &RoleCatalog {
        &self.catalog
    }

    pub async fn orchestrator(&self) -> Option<Arc<Orchestrator>> {
        self.orchestrator.read().await.clone()
    }

    pub async fn config(&self) -> PersistedConfig {
        self.config.read().await.clone()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Merge, persist and rebuild the pipeline.
    ///
    /// The config write lock is held throughout so concurrent updates apply
    /// one after another. Returns the merged config and whether the pipeline
    /// is usable with it.
    pub async fn update_config(
        &self,
        updates: PersistedConfig,
    ) -> Result<(PersistedConfig, bool), ApiError> {
        let mut config = self.config.write().await;
        let mut merged = config.clone();
        merged.merge(updates);
        merged
            .model_config()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        if let Err(e) = merged.save_to(&self.config_path).await {
            tracing::warn!(path = %self.config_path.display(), "Failed to save config: {}", e);
        }

        let rebuilt = match build_orchestrator(&merged, &self.catalog, &self.client_factory) {
            Ok(orchestrator) => Some(orchestrator),
            Err(e) => {
                tracing::warn!("Pipeline unavailable after config update: {:#}", e);
                None
            }
        };
        let active = rebuilt.is_some();
        *self.orchestrator.write().await = rebuilt;
        *config = merged.clone();
        Ok((merged, active))
    }
}

fn build_orchestrator(
    config: &PersistedConfig,
    catalog: &Arc<RoleCatalog>,
    client_factory: &ClientFactory,
) -> anyhow::Result<Arc<Orchestrator>> {
    let model_config = config.model_config()?;
    let client = client_factory(&model_config)?;
    let orchestrator =
        Orchestrator::new(client, catalog.clone()).with_config(config.pipeline_config());
    Ok(Arc::new(orchestrator))
}

/// Error body for every non-2xx response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    /// Pipeline stage that failed, for backend errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unavailable(String),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl From<ImagingError> for ApiError {
    fn from(e: ImagingError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, stage) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            ApiError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, None),
            ApiError::Pipeline(e) if e.source.is_timeout() => {
                (StatusCode::GATEWAY_TIMEOUT, Some(e.stage.to_string()))
            }
            ApiError::Pipeline(e) => (StatusCode::BAD_GATEWAY, Some(e.stage.to_string())),
        };
        let body = ErrorBody {
            error: self.to_string(),
            stage,
        };
        (status, Json(body)).into_response()
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Askthen API",
        version = "1.0.0",
        description = "Ask-then-answer pipeline: role routing, clarification, answering and self-review"
    ),
    paths(
        ask::ask,
        upload::upload_image,
        meta::list_roles,
        meta::health,
        meta::get_config,
        meta::update_config
    ),
    components(
        schemas(
            ask::AskBody,
            ask::AskResponse,
            upload::UploadForm,
            upload::UploadResponse,
            meta::RoleInfo,
            meta::RolesResponse,
            meta::HealthResponse,
            meta::ConfigResponse,
            PersistedConfig,
            ErrorBody
        )
    ),
    tags(
        (name = "pipeline", description = "Asking questions"),
        (name = "images", description = "Image preprocessing"),
        (name = "meta", description = "Roles, health and configuration")
    )
)]
pub struct ApiDoc;

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/ask", post(ask::ask))
        .route("/api/v1/upload-image", post(upload::upload_image))
        .route("/api/v1/roles", get(meta::list_roles))
        .route("/api/v1/health", get(meta::health))
        .route(
            "/api/v1/config",
            get(meta::get_config).patch(meta::update_config),
        )
        .route("/api/v1/openapi.json", get(meta::serve_openapi))
        // Unversioned aliases
        .route("/api/ask", post(ask::ask))
        .route("/api/upload-image", post(upload::upload_image))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
