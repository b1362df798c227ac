use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Client;
use taskflow_types::{
    ChatMessage, ChatSummary, ChatTranscript, NewTask, Plan, Session, Task, TaskStatusFilter,
    UserUsage,
};

use crate::dbs::mongo::models::{MongoChat, MongoTask};
use crate::dbs::mongo::repositories::{
    MongoChatRepository, MongoSessionRepository, MongoTaskRepository, MongoUserRepository,
};
use crate::error::{PersistError, Result};
use crate::trait_client::{PersistenceClient, SessionStore, TaskStore};

pub struct MongoPersistenceClient {
    client: Client,
    database: String,
    chat_repo: MongoChatRepository,
    user_repo: MongoUserRepository,
    task_repo: MongoTaskRepository,
    session_repo: MongoSessionRepository,
}

impl MongoPersistenceClient {
    /// Connect to MongoDB and create client
    pub async fn connect(mongodb_uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(mongodb_uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;

        let this = Self {
            chat_repo: MongoChatRepository::new(&client, database),
            user_repo: MongoUserRepository::new(&client, database),
            task_repo: MongoTaskRepository::new(&client, database),
            session_repo: MongoSessionRepository::new(&client, database),
            database: database.to_string(),
            client,
        };

        this.chat_repo.ensure_indexes().await?;
        this.task_repo.ensure_indexes().await?;

        Ok(this)
    }
}

#[async_trait]
impl PersistenceClient for MongoPersistenceClient {
    async fn append_messages(
        &self,
        user_id: &str,
        messages: Vec<ChatMessage>,
        chat_id: Option<&str>,
    ) -> Result<String> {
        match chat_id {
            Some(id) => {
                let object_id = ObjectId::parse_str(id)
                    .map_err(|_| PersistError::ChatNotFound(id.to_string()))?;

                if !self.chat_repo.push_messages(object_id, user_id, &messages).await? {
                    return Err(PersistError::ChatNotFound(id.to_string()));
                }
                Ok(object_id.to_hex())
            }
            None => {
                let chat = MongoChat::new(user_id, messages);
                self.chat_repo.insert(&chat).await?;
                Ok(chat.id.to_hex())
            }
        }
    }

    async fn get_chat(&self, user_id: &str, chat_id: &str) -> Result<Option<ChatTranscript>> {
        let Ok(object_id) = ObjectId::parse_str(chat_id) else {
            return Ok(None);
        };

        let chat = self.chat_repo.find(object_id, user_id).await?;
        Ok(chat.map(Into::into))
    }

    async fn list_chats(&self, user_id: &str, limit: usize) -> Result<Vec<ChatSummary>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let chats = self.chat_repo.list(user_id, limit).await?;
        Ok(chats.iter().map(MongoChat::summary).collect())
    }

    async fn delete_chat(&self, user_id: &str, chat_id: &str) -> Result<bool> {
        let Ok(object_id) = ObjectId::parse_str(chat_id) else {
            return Ok(false);
        };

        self.chat_repo.delete(object_id, user_id).await
    }

    async fn get_usage(&self, user_id: &str) -> Result<UserUsage> {
        let user = self.user_repo.find(user_id).await?;
        Ok(user.map(Into::into).unwrap_or_default())
    }

    async fn record_prompt(&self, user_id: &str, now: DateTime<Utc>) -> Result<UserUsage> {
        let user = self.user_repo.record_prompt(user_id, now).await?;
        Ok(user.into())
    }

    async fn set_plan(&self, user_id: &str, plan: Plan) -> Result<()> {
        self.user_repo.set_plan(user_id, plan).await
    }

    async fn health_check(&self) -> Result<()> {
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for MongoPersistenceClient {
    async fn create_task(&self, user_id: &str, task: NewTask) -> Result<Task> {
        let task = Task::new(user_id, task);
        self.task_repo.insert(&MongoTask::from(task.clone())).await?;
        Ok(task)
    }

    async fn list_tasks(
        &self,
        user_id: &str,
        filter: TaskStatusFilter,
        limit: usize,
    ) -> Result<Vec<Task>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let tasks = self.task_repo.list(user_id, filter, limit).await?;
        Ok(tasks.into_iter().map(Into::into).collect())
    }

    async fn complete_task(&self, user_id: &str, task_id: &str) -> Result<Option<Task>> {
        let task = self.task_repo.complete(user_id, task_id).await?;
        Ok(task.map(Into::into))
    }

    async fn delete_task(&self, user_id: &str, task_id: &str) -> Result<bool> {
        self.task_repo.delete(user_id, task_id).await
    }
}

#[async_trait]
impl SessionStore for MongoPersistenceClient {
    async fn find_session(&self, token: &str) -> Result<Option<Session>> {
        let session = self.session_repo.find_by_token(token).await?;
        Ok(session.map(Into::into))
    }
}
