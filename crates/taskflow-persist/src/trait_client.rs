use async_trait::async_trait;
use chrono::{DateTime, Utc};
use taskflow_types::{
    ChatMessage, ChatSummary, ChatTranscript, NewTask, Plan, Session, Task, TaskStatusFilter,
    UserUsage,
};

use crate::error::Result;

/// Chat transcripts and per-user usage counters
///
/// Every operation is scoped to `user_id`; a chat owned by someone else
/// behaves as if it did not exist.
#[async_trait]
pub trait PersistenceClient: Send + Sync {
    /// Append to `chat_id`, or start a new transcript when it is `None`.
    /// Returns the chat id the messages were written to.
    async fn append_messages(
        &self,
        user_id: &str,
        messages: Vec<ChatMessage>,
        chat_id: Option<&str>,
    ) -> Result<String>;

    async fn get_chat(&self, user_id: &str, chat_id: &str) -> Result<Option<ChatTranscript>>;

    /// Most recently updated first
    async fn list_chats(&self, user_id: &str, limit: usize) -> Result<Vec<ChatSummary>>;

    /// `true` if a transcript was removed
    async fn delete_chat(&self, user_id: &str, chat_id: &str) -> Result<bool>;

    /// Unknown users are on the free plan with no usage
    async fn get_usage(&self, user_id: &str) -> Result<UserUsage>;

    /// Count one prompt at `now`, resetting first if the stored day has passed
    async fn record_prompt(&self, user_id: &str, now: DateTime<Utc>) -> Result<UserUsage>;

    async fn set_plan(&self, user_id: &str, plan: Plan) -> Result<()>;

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Storage behind the task tools
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, user_id: &str, task: NewTask) -> Result<Task>;

    /// Newest first
    async fn list_tasks(
        &self,
        user_id: &str,
        filter: TaskStatusFilter,
        limit: usize,
    ) -> Result<Vec<Task>>;

    /// `None` when the task does not exist for this user
    async fn complete_task(&self, user_id: &str, task_id: &str) -> Result<Option<Task>>;

    async fn delete_task(&self, user_id: &str, task_id: &str) -> Result<bool>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find_session(&self, token: &str) -> Result<Option<Session>>;
}
