pub mod types;
pub mod traits;
pub mod error;
pub mod streaming;
pub mod reassembler;
pub mod buffer_utils;
pub mod openai;
pub mod config;

pub use traits::{ChatClient, ChatRequest, ChatOptions, EventStream};

pub use error::{LlmError, ProviderError, ProviderErrorKind, Result};
pub use streaming::StreamEvent;
pub use reassembler::{PartialToolCall, Reassembled, SlotState, StreamReassembler, ToolCallReassembler};
pub use buffer_utils::CircularLineBuffer;
pub use openai::OpenAIClient;
pub use config::{ClientFactory, ProviderConfig};
pub use types::{Message, Tool, ToolCall, ToolChoice, FunctionCall};
