pub mod chats;
pub mod docs;
pub mod health;
pub mod models;
pub mod usage;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    handlers::stream,
    middleware::{auth, cors, logging},
    state::AppState,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Build the complete application router
///
/// Everything under `/api` except the docs requires a bearer session.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/api/chat", post(stream::chat_stream))
        .route("/api/chats", get(chats::list_chats))
        .route(
            "/api/chats/:chat_id",
            get(chats::get_chat).delete(chats::delete_chat),
        )
        .route("/api/usage", get(usage::get_usage))
        .route("/api/models", get(models::list_models))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(api_routes)
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", docs::ApiDoc::openapi()))
        .layer(middleware::from_fn(logging::log_request))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .layer(cors::build_cors_layer(&state.config.cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
