use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Provider error ({}): {}", .0.status, .0.message)]
    Provider(ProviderError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;

/// Known upstream failure classes. Anything unrecognised lands in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Authentication,
    RateLimit,
    ModelNotFound,
    ContextTooLong,
    QuotaExceeded,
    ToolUseUnsupported,
    Other(Option<String>),
}

impl ProviderErrorKind {
    /// Stable code exposed to API callers
    pub fn code(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication_error",
            Self::RateLimit => "rate_limit_exceeded",
            Self::ModelNotFound => "model_not_found",
            Self::ContextTooLong => "context_length_exceeded",
            Self::QuotaExceeded => "insufficient_quota",
            Self::ToolUseUnsupported => "tool_use_unsupported",
            Self::Other(_) => "upstream_error",
        }
    }

    /// Message that is safe to show to an end user
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Authentication => {
                "The AI service rejected our credentials. Please try again later."
            }
            Self::RateLimit => {
                "The AI service is receiving too many requests. Please wait a moment and try again."
            }
            Self::ModelNotFound => "The selected AI model is not available. Please choose another model.",
            Self::ContextTooLong => {
                "This conversation is too long for the selected model. Please start a new chat."
            }
            Self::QuotaExceeded => "The AI service quota has been exhausted. Please try again later.",
            Self::ToolUseUnsupported => {
                "The selected AI model does not support task actions. Please choose another model."
            }
            Self::Other(_) => "The AI service returned an error. Please try again.",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "invalid_api_key" | "authentication_error" | "invalid_authentication" => {
                Some(Self::Authentication)
            }
            "rate_limit_exceeded" | "rate_limit_error" => Some(Self::RateLimit),
            "model_not_found" => Some(Self::ModelNotFound),
            "context_length_exceeded" => Some(Self::ContextTooLong),
            "insufficient_quota" | "billing_hard_limit_reached" => Some(Self::QuotaExceeded),
            "tool_use_failed" | "tool_use_not_supported" | "tools_not_supported" => {
                Some(Self::ToolUseUnsupported)
            }
            _ => None,
        }
    }

    fn from_message(message: &str) -> Option<Self> {
        let lower = message.to_lowercase();
        if lower.contains("context length")
            || lower.contains("context_length")
            || lower.contains("maximum context")
            || lower.contains("too many tokens")
        {
            return Some(Self::ContextTooLong);
        }
        if (lower.contains("tool") || lower.contains("function")) && lower.contains("support") {
            return Some(Self::ToolUseUnsupported);
        }
        if lower.contains("quota") {
            return Some(Self::QuotaExceeded);
        }
        None
    }

    fn from_status(status: u16) -> Option<Self> {
        match status {
            401 | 403 => Some(Self::Authentication),
            429 => Some(Self::RateLimit),
            404 => Some(Self::ModelNotFound),
            _ => None,
        }
    }
}

/// Classified non-2xx response from the upstream provider.
///
/// `message` is the provider's raw text and must only be logged.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderError {
    pub status: u16,
    pub kind: ProviderErrorKind,
    pub message: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<Value>,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
}

impl ProviderError {
    /// Classify an OpenAI-compatible `{error:{message,code,type}}` body.
    ///
    /// Precedence: provider code, provider type, a bare 429, message keywords, HTTP status.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);

        let (message, code, error_type) = match parsed {
            Some(err) => {
                let code = match err.code {
                    Some(Value::String(s)) => Some(s),
                    Some(Value::Number(n)) => Some(n.to_string()),
                    _ => None,
                };
                (err.message, code, err.error_type)
            }
            None => (body.to_string(), None, None),
        };

        let kind = code
            .as_deref()
            .and_then(ProviderErrorKind::from_code)
            .or_else(|| error_type.as_deref().and_then(ProviderErrorKind::from_code))
            .or_else(|| (status == 429).then_some(ProviderErrorKind::RateLimit))
            .or_else(|| ProviderErrorKind::from_message(&message))
            .or_else(|| ProviderErrorKind::from_status(status))
            .unwrap_or(ProviderErrorKind::Other(code));

        Self {
            status,
            kind,
            message,
        }
    }

    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }
}
