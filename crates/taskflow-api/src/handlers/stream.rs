use axum::{
    extract::{rejection::JsonRejection, State},
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use taskflow_persist::PersistError;
use taskflow_relay::{ChatTurn, RelayError};
use taskflow_types::{ChatMessage, ChatRole};
use tokio_stream::wrappers::ReceiverStream;
use utoipa::ToSchema;

use crate::{
    error::{ApiError, ApiResult},
    middleware::auth::AuthUser,
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestBody {
    /// Full transcript; the last entry must be the new user prompt
    #[schema(value_type = Vec<Object>)]
    pub messages: Vec<ChatMessage>,
    pub model_id: Option<String>,
    /// Existing transcript to append to; a new one is created when absent
    pub chat_id: Option<String>,
}

/// Relay a chat turn and stream the answer as Server-Sent Events
///
/// Each event is a single `data:` line holding a JSON object with a `type`
/// of `content`, `tool_start`, `tool_results`, `done` or `error`.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequestBody,
    responses(
        (status = 200, description = "Streaming response", content_type = "text/event-stream"),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Missing or invalid session"),
        (status = 429, description = "Daily prompt limit reached or upstream rate limited"),
        (status = 500, description = "Assistant not configured")
    ),
    security(("bearer" = [])),
    tag = "chat"
)]
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<ChatRequestBody>, JsonRejection>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let relay = state
        .relay
        .as_ref()
        .ok_or_else(|| ApiError::Config("OPENAI_API_KEY is not set".to_string()))?;

    let Json(req) = payload?;
    validate(&state, &req)?;

    // Unknown chats are rejected before any upstream cost is incurred
    if let Some(chat_id) = &req.chat_id {
        if state
            .storage
            .chats
            .get_chat(&user.user_id, chat_id)
            .await?
            .is_none()
        {
            return Err(RelayError::Persistence(PersistError::ChatNotFound(chat_id.clone())).into());
        }
    }

    let receiver = relay
        .start(ChatTurn {
            user_id: user.user_id,
            messages: req.messages,
            model: req.model_id,
            chat_id: req.chat_id,
        })
        .await?;

    let sse_stream = ReceiverStream::new(receiver).map(|event| Event::default().json_data(event));

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}

fn validate(state: &AppState, req: &ChatRequestBody) -> ApiResult<()> {
    let last = req
        .messages
        .last()
        .ok_or_else(|| ApiError::BadRequest("messages must not be empty".to_string()))?;

    if last.role != ChatRole::User || last.text().trim().is_empty() {
        return Err(ApiError::BadRequest(
            "The last message must be a non-empty user message".to_string(),
        ));
    }

    if let Some(model_id) = &req.model_id {
        if !state.config.llm.is_known_model(model_id) {
            return Err(ApiError::BadRequest(format!("Unknown model: {}", model_id)));
        }
    }

    Ok(())
}
