pub mod builder;
pub mod prompt;
pub mod quota;
pub mod relay;
pub mod tools;

pub use builder::RelayBuilder;
pub use prompt::{render_system_prompt, DEFAULT_SYSTEM_PROMPT_TEMPLATE};
pub use quota::{QuotaDenied, QuotaGate, QuotaStatus};
pub use relay::{ChatTurn, Relay, RelayConfig, RelayError};
pub use tools::{FunctionExecutor, TaskTools, ToolError};
