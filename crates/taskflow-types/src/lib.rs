pub mod chat;
pub mod events;
pub mod session;
pub mod task;
pub mod usage;

pub use chat::{derive_title, ChatMessage, ChatRole, ChatSummary, ChatTranscript, FunctionResult};
pub use events::RelayEvent;
pub use session::Session;
pub use task::{NewTask, Task, TaskPriority, TaskStatusFilter};
pub use usage::{local_day, start_of_local_day, can_make_prompt, Plan, PlanLimits, UserUsage};
