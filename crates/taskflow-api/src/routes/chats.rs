use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use taskflow_types::{ChatSummary, ChatTranscript};
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::{ApiError, ApiResult},
    middleware::auth::AuthUser,
    state::AppState,
};

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListChatsQuery {
    /// Maximum number of chats to return (default 20, max 100)
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListChatsResponse {
    #[schema(value_type = Vec<Object>)]
    pub chats: Vec<ChatSummary>,
    pub has_more: bool,
}

/// List the caller's chats, most recently updated first
#[utoipa::path(
    get,
    path = "/api/chats",
    params(ListChatsQuery),
    responses(
        (status = 200, description = "List of chats", body = ListChatsResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Missing or invalid session")
    ),
    security(("bearer" = [])),
    tag = "chats"
)]
pub async fn list_chats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    query: Result<Query<ListChatsQuery>, QueryRejection>,
) -> ApiResult<Json<ListChatsResponse>> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let chats = state.storage.chats.list_chats(&user.user_id, limit).await?;
    let has_more = chats.len() == limit;

    Ok(Json(ListChatsResponse { chats, has_more }))
}

/// Get a specific chat by ID
#[utoipa::path(
    get,
    path = "/api/chats/{chat_id}",
    params(
        ("chat_id" = String, Path, description = "Chat ID")
    ),
    responses(
        (status = 200, description = "Chat transcript"),
        (status = 404, description = "Chat not found")
    ),
    security(("bearer" = [])),
    tag = "chats"
)]
pub async fn get_chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(chat_id): Path<String>,
) -> ApiResult<Json<ChatTranscript>> {
    let chat = state
        .storage
        .chats
        .get_chat(&user.user_id, &chat_id)
        .await?
        .ok_or(ApiError::ChatNotFound(chat_id))?;

    Ok(Json(chat))
}

/// Delete a chat
#[utoipa::path(
    delete,
    path = "/api/chats/{chat_id}",
    params(
        ("chat_id" = String, Path, description = "Chat ID")
    ),
    responses(
        (status = 204, description = "Chat deleted"),
        (status = 404, description = "Chat not found")
    ),
    security(("bearer" = [])),
    tag = "chats"
)]
pub async fn delete_chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(chat_id): Path<String>,
) -> ApiResult<StatusCode> {
    if !state.storage.chats.delete_chat(&user.user_id, &chat_id).await? {
        return Err(ApiError::ChatNotFound(chat_id));
    }

    tracing::info!(user_id = %user.user_id, chat_id = %chat_id, "Chat deleted");
    Ok(StatusCode::NO_CONTENT)
}
