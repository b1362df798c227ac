use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{config::ModelInfo, state::AppState};

#[derive(Debug, Serialize, ToSchema)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
    pub default: String,
}

/// Models callers may pass as `modelId`
#[utoipa::path(
    get,
    path = "/api/models",
    responses(
        (status = 200, description = "Model catalog", body = ModelsResponse)
    ),
    security(("bearer" = [])),
    tag = "models"
)]
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    let llm = &state.config.llm;

    let mut models = llm.models.clone();
    if !models.iter().any(|m| m.id == llm.default_model) {
        models.insert(0, ModelInfo::new(&llm.default_model, &llm.default_model));
    }

    Json(ModelsResponse {
        models,
        default: llm.default_model.clone(),
    })
}
