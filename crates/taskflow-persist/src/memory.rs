use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use taskflow_types::{
    ChatMessage, ChatSummary, ChatTranscript, NewTask, Plan, Session, Task,
    TaskStatusFilter, UserUsage,
};
use tokio::sync::RwLock;

use crate::error::{PersistError, Result};
use crate::trait_client::{PersistenceClient, SessionStore, TaskStore};

/// Process-local backend for development and tests
#[derive(Default)]
pub struct MemoryPersistenceClient {
    chats: RwLock<HashMap<String, ChatTranscript>>,
    users: RwLock<HashMap<String, UserUsage>>,
    tasks: RwLock<Vec<Task>>,
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemoryPersistenceClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_session(&self, session: Session) {
        self.sessions
            .write()
            .await
            .insert(session.token.clone(), session);
    }

    /// Overwrite a user's usage record
    pub async fn set_usage(&self, user_id: &str, usage: UserUsage) {
        self.users.write().await.insert(user_id.to_string(), usage);
    }
}

#[async_trait]
impl PersistenceClient for MemoryPersistenceClient {
    async fn append_messages(
        &self,
        user_id: &str,
        messages: Vec<ChatMessage>,
        chat_id: Option<&str>,
    ) -> Result<String> {
        let mut chats = self.chats.write().await;

        match chat_id {
            Some(id) => {
                let chat = chats
                    .get_mut(id)
                    .filter(|c| c.user_id == user_id)
                    .ok_or_else(|| PersistError::ChatNotFound(id.to_string()))?;

                chat.messages.extend(messages);
                chat.updated_at = Utc::now();
                Ok(chat.id.clone())
            }
            None => {
                let chat = ChatTranscript::new(user_id, messages);
                let id = chat.id.clone();
                tracing::debug!(chat_id = %id, title = %chat.title, "Created chat");
                chats.insert(id.clone(), chat);
                Ok(id)
            }
        }
    }

    async fn get_chat(&self, user_id: &str, chat_id: &str) -> Result<Option<ChatTranscript>> {
        Ok(self
            .chats
            .read()
            .await
            .get(chat_id)
            .filter(|c| c.user_id == user_id)
            .cloned())
    }

    async fn list_chats(&self, user_id: &str, limit: usize) -> Result<Vec<ChatSummary>> {
        let chats = self.chats.read().await;
        let mut summaries: Vec<ChatSummary> = chats
            .values()
            .filter(|c| c.user_id == user_id)
            .map(ChatTranscript::summary)
            .collect();

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries.truncate(limit);
        Ok(summaries)
    }

    async fn delete_chat(&self, user_id: &str, chat_id: &str) -> Result<bool> {
        let mut chats = self.chats.write().await;
        let owned = chats.get(chat_id).is_some_and(|c| c.user_id == user_id);
        if owned {
            chats.remove(chat_id);
        }
        Ok(owned)
    }

    async fn get_usage(&self, user_id: &str) -> Result<UserUsage> {
        Ok(self
            .users
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn record_prompt(&self, user_id: &str, now: DateTime<Utc>) -> Result<UserUsage> {
        let mut users = self.users.write().await;
        let usage = users.entry(user_id.to_string()).or_default();
        usage.record_prompt(now);
        Ok(usage.clone())
    }

    async fn set_plan(&self, user_id: &str, plan: Plan) -> Result<()> {
        self.users
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .plan = plan;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for MemoryPersistenceClient {
    async fn create_task(&self, user_id: &str, task: NewTask) -> Result<Task> {
        let task = Task::new(user_id, task);
        self.tasks.write().await.push(task.clone());
        Ok(task)
    }

    async fn list_tasks(
        &self,
        user_id: &str,
        filter: TaskStatusFilter,
        limit: usize,
    ) -> Result<Vec<Task>> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id && filter.matches(t))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn complete_task(&self, user_id: &str, task_id: &str) -> Result<Option<Task>> {
        let mut tasks = self.tasks.write().await;
        Ok(tasks
            .iter_mut()
            .find(|t| t.id == task_id && t.user_id == user_id)
            .map(|task| {
                if !task.completed {
                    task.complete(Utc::now());
                }
                task.clone()
            }))
    }

    async fn delete_task(&self, user_id: &str, task_id: &str) -> Result<bool> {
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|t| !(t.id == task_id && t.user_id == user_id));
        Ok(tasks.len() < before)
    }
}

#[async_trait]
impl SessionStore for MemoryPersistenceClient {
    async fn find_session(&self, token: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(token).cloned())
    }
}
