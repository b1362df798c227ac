use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: HashMap<String, String>,
}

/// Health check endpoint
///
/// Returns the health status of the API and its dependencies
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Storage is unreachable", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let mut services = HashMap::new();
    let backend = state.storage.backend.as_str();

    let storage_ok = match state.storage.chats.health_check().await {
        Ok(()) => {
            services.insert(backend.to_string(), "connected".to_string());
            true
        }
        Err(e) => {
            tracing::warn!(backend, error = %e, "Storage health check failed");
            services.insert(backend.to_string(), "disconnected".to_string());
            false
        }
    };

    let llm = if state.relay.is_some() {
        "configured"
    } else {
        "missing_api_key"
    };
    services.insert("llm".to_string(), llm.to_string());

    let (status, label) = if storage_ok {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            services,
        }),
    )
}
