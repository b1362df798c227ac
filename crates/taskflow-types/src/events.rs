use serde::{Deserialize, Serialize};

use crate::chat::FunctionResult;

/// Event sent to the caller on the chat stream, one per SSE `data:` line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    /// Text token from either phase, forwarded as soon as it arrives
    Content {
        content: String,
    },

    /// The model requested tools; execution is starting
    ToolStart,

    /// Results of the executed tools, sent after the follow-up text
    ToolResults {
        results: Vec<FunctionResult>,
    },

    /// Turn persisted; `duration` is wall-clock seconds
    Done {
        #[serde(rename = "chatId")]
        chat_id: String,
        duration: f64,
    },

    /// Terminal failure with a user-safe message
    Error {
        error: String,
        code: String,
    },
}

impl RelayEvent {
    pub fn content(content: impl Into<String>) -> Self {
        Self::Content {
            content: content.into(),
        }
    }

    pub fn error(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
            code: code.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}
