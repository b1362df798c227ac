use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use taskflow_llm::{LlmError, ProviderErrorKind};
use taskflow_persist::PersistError;
use taskflow_relay::RelayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Chat not found: {0}")]
    ChatNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),
}

/// Resolved pieces of the JSON error envelope
struct Envelope {
    status: StatusCode,
    kind: &'static str,
    code: String,
    message: String,
    extra: Map<String, Value>,
}

impl Envelope {
    fn new(
        status: StatusCode,
        kind: &'static str,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            kind,
            code: code.into(),
            message: message.into(),
            extra: Map::new(),
        }
    }

    fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "internal_error",
            "Internal server error",
        )
    }
}

fn provider_status(kind: &ProviderErrorKind) -> StatusCode {
    match kind {
        ProviderErrorKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
        ProviderErrorKind::ModelNotFound
        | ProviderErrorKind::ContextTooLong
        | ProviderErrorKind::ToolUseUnsupported => StatusCode::BAD_REQUEST,
        ProviderErrorKind::QuotaExceeded => StatusCode::SERVICE_UNAVAILABLE,
        ProviderErrorKind::Authentication | ProviderErrorKind::Other(_) => StatusCode::BAD_GATEWAY,
    }
}

impl ApiError {
    fn envelope(&self) -> Envelope {
        match self {
            ApiError::Unauthorized(msg) => Envelope::new(
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "invalid_session",
                msg.clone(),
            ),
            ApiError::BadRequest(msg) => Envelope::new(
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_request",
                msg.clone(),
            ),
            ApiError::ChatNotFound(_) => Envelope::new(
                StatusCode::NOT_FOUND,
                "invalid_request_error",
                "chat_not_found",
                "Chat not found",
            ),
            ApiError::Config(msg) => {
                tracing::error!("Config error: {}", msg);
                Envelope::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "configuration_error",
                    "configuration_error",
                    "The assistant is not configured. Please contact support.",
                )
            }
            ApiError::Relay(e) => relay_envelope(e),
            ApiError::Persist(e) => {
                tracing::error!("Persistence error: {}", e);
                Envelope::internal()
            }
        }
    }
}

fn relay_envelope(e: &RelayError) -> Envelope {
    match e {
        RelayError::DailyLimitExceeded(denied) => {
            let mut envelope = Envelope::new(
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_error",
                e.code(),
                e.user_message(),
            );
            envelope.extra.insert("remaining".into(), json!(denied.remaining));
            envelope.extra.insert("plan".into(), json!(denied.plan));
            envelope.extra.insert("dailyLimit".into(), json!(denied.daily_limit));
            envelope
        }
        RelayError::InvalidRequest(msg) => Envelope::new(
            StatusCode::BAD_REQUEST,
            "invalid_request_error",
            e.code(),
            msg.clone(),
        ),
        RelayError::Persistence(PersistError::ChatNotFound(_)) => Envelope::new(
            StatusCode::BAD_REQUEST,
            "invalid_request_error",
            e.code(),
            e.user_message(),
        ),
        RelayError::Upstream(LlmError::Configuration(_)) | RelayError::Configuration(_) => {
            tracing::error!(error = %e, "Relay misconfigured");
            Envelope::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration_error",
                e.code(),
                e.user_message(),
            )
        }
        RelayError::Upstream(LlmError::Provider(provider)) => {
            tracing::error!(
                status = provider.status,
                code = e.code(),
                provider_message = %provider.message,
                "Upstream rejected chat request"
            );
            Envelope::new(provider_status(&provider.kind), "api_error", e.code(), e.user_message())
        }
        RelayError::Upstream(other) => {
            tracing::error!(error = %other, "Upstream request failed");
            Envelope::new(StatusCode::BAD_GATEWAY, "api_error", e.code(), e.user_message())
        }
        RelayError::Persistence(other) => {
            tracing::error!(error = %other, "Persistence error");
            Envelope::internal()
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let Envelope {
            status,
            kind,
            code,
            message,
            extra,
        } = self.envelope();

        let mut error = Map::new();
        error.insert("type".into(), json!(kind));
        error.insert("code".into(), json!(code));
        error.insert("message".into(), json!(message));
        error.extend(extra);

        (status, Json(json!({ "error": error }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use taskflow_llm::ProviderError;
    use taskflow_relay::QuotaDenied;
    use taskflow_types::Plan;

    async fn body(error: ApiError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_daily_limit_envelope() {
        let error = ApiError::Relay(RelayError::DailyLimitExceeded(QuotaDenied {
            plan: Plan::Free,
            daily_limit: 10,
            remaining: 0,
        }));

        let (status, value) = body(error).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(value["error"]["type"], "rate_limit_error");
        assert_eq!(value["error"]["code"], "daily_limit_exceeded");
        assert_eq!(value["error"]["remaining"], 0);
        assert_eq!(value["error"]["plan"], "free");
    }

    #[tokio::test]
    async fn test_upstream_envelope_hides_provider_text() {
        let provider = ProviderError::from_response(
            404,
            r#"{"error":{"message":"The model `gpt-9` does not exist","code":"model_not_found"}}"#,
        );
        let (status, value) = body(ApiError::Relay(RelayError::Upstream(LlmError::Provider(
            provider,
        ))))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["error"]["type"], "api_error");
        assert_eq!(value["error"]["code"], "model_not_found");
        assert!(!value["error"]["message"].as_str().unwrap().contains("gpt-9"));
    }

    #[tokio::test]
    async fn test_internal_errors_are_generic() {
        let (status, value) =
            body(ApiError::Persist(PersistError::Connection("10.0.0.3 refused".into()))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(value["error"]["type"], "internal_error");
        assert!(!value.to_string().contains("10.0.0.3"));
    }

    #[test]
    fn test_provider_status_mapping() {
        assert_eq!(provider_status(&ProviderErrorKind::RateLimit), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(provider_status(&ProviderErrorKind::Authentication), StatusCode::BAD_GATEWAY);
        assert_eq!(
            provider_status(&ProviderErrorKind::QuotaExceeded),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
