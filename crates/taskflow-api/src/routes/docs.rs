use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::config::ModelInfo;
use crate::handlers::stream::{self, ChatRequestBody};
use crate::routes::{chats, health, models, usage};

#[derive(OpenApi)]
#[openapi(
    info(title = "TaskFlow Assistant API"),
    paths(
        health::health_check,
        stream::chat_stream,
        chats::list_chats,
        chats::get_chat,
        chats::delete_chat,
        usage::get_usage,
        models::list_models,
    ),
    components(schemas(
        health::HealthResponse,
        ChatRequestBody,
        chats::ListChatsResponse,
        usage::UsageResponse,
        models::ModelsResponse,
        ModelInfo,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Liveness"),
        (name = "chat", description = "Streaming assistant"),
        (name = "chats", description = "Stored transcripts"),
        (name = "usage", description = "Daily prompt quota"),
        (name = "models", description = "Model catalog")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| *p == "/api/chat"));
        assert!(paths.iter().any(|p| *p == "/api/chats/{chat_id}"));
        assert!(doc.components.unwrap().security_schemes.contains_key("bearer"));
    }
}
