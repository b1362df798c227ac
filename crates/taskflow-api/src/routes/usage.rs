use axum::{extract::State, Extension, Json};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use taskflow_relay::QuotaStatus;
use taskflow_types::local_day;
use utoipa::ToSchema;

use crate::{error::ApiResult, middleware::auth::AuthUser, state::AppState};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    /// `free`, `plus` or `pro`
    pub plan: String,
    pub prompts_used_today: u32,
    /// Absent for unlimited plans
    pub daily_limit: Option<u32>,
    pub remaining: Option<u32>,
}

impl From<QuotaStatus> for UsageResponse {
    fn from(status: QuotaStatus) -> Self {
        Self {
            plan: status.plan.to_string(),
            prompts_used_today: status.prompts_used_today,
            daily_limit: status.daily_limit,
            remaining: status.remaining,
        }
    }
}

/// Today's prompt usage for the caller
#[utoipa::path(
    get,
    path = "/api/usage",
    responses(
        (status = 200, description = "Usage against the daily limit", body = UsageResponse),
        (status = 401, description = "Missing or invalid session")
    ),
    security(("bearer" = [])),
    tag = "usage"
)]
pub async fn get_usage(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<UsageResponse>> {
    let usage = state.storage.chats.get_usage(&user.user_id).await?;
    let status = state.quota.status(&usage, local_day(Utc::now()));

    Ok(Json(status.into()))
}
