//! Discovery and configuration endpoints.

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use askthen_core::models::LlmProvider;

use super::{ApiDoc, ApiError, ErrorBody, SharedState};
use crate::config::PersistedConfig;

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleInfo {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RolesResponse {
    pub roles: Vec<RoleInfo>,
}

/// List the role catalog
#[utoipa::path(
    get,
    path = "/api/v1/roles",
    tag = "meta",
    responses((status = 200, description = "Role catalog", body = RolesResponse))
)]
pub async fn list_roles(State(state): State<SharedState>) -> Json<RolesResponse> {
    let roles = state
        .catalog()
        .roles()
        .iter()
        .map(|role| RoleInfo {
            id: role.id.clone(),
            name: role.name.clone(),
            description: role.short_description.clone(),
        })
        .collect();
    Json(RolesResponse { roles })
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    /// False while no completion backend could be built
    pub pipeline_ready: bool,
    pub uptime_secs: u64,
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "meta",
    responses((status = 200, description = "Server health", body = HealthResponse))
)]
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        pipeline_ready: state.orchestrator().await.is_some(),
        uptime_secs: state.uptime_secs(),
    })
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigResponse {
    pub config: PersistedConfig,
    /// Whether the pipeline is usable with this config
    pub active: bool,
    /// Provider ids accepted in `config.provider`
    pub providers: Vec<&'static str>,
}

fn config_response(config: PersistedConfig, active: bool) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        config,
        active,
        providers: LlmProvider::all().iter().map(LlmProvider::id).collect(),
    })
}

/// Get current configuration
#[utoipa::path(
    get,
    path = "/api/v1/config",
    tag = "meta",
    responses((status = 200, description = "Current configuration", body = ConfigResponse))
)]
pub async fn get_config(State(state): State<SharedState>) -> Json<ConfigResponse> {
    let active = state.orchestrator().await.is_some();
    config_response(state.config().await, active)
}

/// Update configuration (partial merge)
#[utoipa::path(
    patch,
    path = "/api/v1/config",
    tag = "meta",
    request_body = PersistedConfig,
    responses(
        (status = 200, description = "Updated configuration", body = ConfigResponse),
        (status = 400, description = "Unknown provider", body = ErrorBody)
    )
)]
pub async fn update_config(
    State(state): State<SharedState>,
    Json(updates): Json<PersistedConfig>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let (config, active) = state.update_config(updates).await?;
    Ok(config_response(config, active))
}

pub async fn serve_openapi() -> Response {
    match ApiDoc::openapi().to_json() {
        Ok(document) => (
            [(header::CONTENT_TYPE, "application/json")],
            Body::from(document),
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{json_request, send, state_with};
    use askthen_core::testing::ScriptedClient;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_roles_lists_catalog() {
        let (status, json) = send(state_with(Arc::new(ScriptedClient::new())), get("/api/v1/roles")).await;
        assert_eq!(status, StatusCode::OK);
        let roles = json["roles"].as_array().unwrap();
        assert_eq!(roles.len(), 3);
        assert_eq!(roles[0]["id"], "1");
        assert_eq!(roles[2]["name"], "Counselor");
    }

    #[tokio::test]
    async fn test_health_reports_ready_pipeline() {
        let (status, json) = send(state_with(Arc::new(ScriptedClient::new())), get("/api/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["pipeline_ready"], true);
    }

    #[tokio::test]
    async fn test_config_patch_merges() {
        let state = state_with(Arc::new(ScriptedClient::new()));

        let (status, json) = send(
            state.clone(),
            json_request(
                "PATCH",
                "/api/v1/config",
                serde_json::json!({ "provider": "deepseek", "skip_sufficiency_on_followup": true }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["active"], true);
        assert_eq!(json["config"]["provider"], "deepseek");

        let (_, json) = send(state.clone(), get("/api/v1/config")).await;
        assert_eq!(json["config"]["skip_sufficiency_on_followup"], true);
        assert!(json["providers"].as_array().unwrap().contains(&serde_json::json!("grok")));

        let orchestrator = state.orchestrator().await.unwrap();
        assert!(orchestrator.config().skip_sufficiency_on_followup);
    }

    #[tokio::test]
    async fn test_config_patch_rejects_unknown_provider() {
        let state = state_with(Arc::new(ScriptedClient::new()));
        let (status, _) = send(
            state.clone(),
            json_request("PATCH", "/api/v1/config", serde_json::json!({ "provider": "acme" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(state.config().await.provider.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_config_patches_keep_both_fields() {
        let state = state_with(Arc::new(ScriptedClient::new()));
        let ((first, _), (second, _)) = tokio::join!(
            send(
                state.clone(),
                json_request("PATCH", "/api/v1/config", serde_json::json!({ "model": "gpt-4.1-mini" })),
            ),
            send(
                state.clone(),
                json_request(
                    "PATCH",
                    "/api/v1/config",
                    serde_json::json!({ "skip_sufficiency_on_followup": true }),
                ),
            ),
        );
        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::OK);

        let config = state.config().await;
        assert_eq!(config.model.as_deref(), Some("gpt-4.1-mini"));
        assert_eq!(config.skip_sufficiency_on_followup, Some(true));
        let orchestrator = state.orchestrator().await.unwrap();
        assert!(orchestrator.config().skip_sufficiency_on_followup);
    }

    #[tokio::test]
    async fn test_openapi_lists_ask() {
        let (status, json) = send(state_with(Arc::new(ScriptedClient::new())), get("/api/v1/openapi.json")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["paths"].get("/api/v1/ask").is_some());
    }
}
