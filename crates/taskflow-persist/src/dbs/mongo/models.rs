use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};
use taskflow_types::{
    derive_title, ChatMessage, ChatSummary, ChatTranscript, Plan, Session, Task, TaskPriority,
    UserUsage,
};

/// Document in `chats`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoChat {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub created_at: BsonDateTime,
    pub updated_at: BsonDateTime,
}

impl MongoChat {
    pub fn new(user_id: &str, messages: Vec<ChatMessage>) -> Self {
        let now = BsonDateTime::now();
        Self {
            id: ObjectId::new(),
            user_id: user_id.to_string(),
            title: derive_title(&messages),
            messages,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn summary(&self) -> ChatSummary {
        ChatSummary {
            id: self.id.to_hex(),
            title: self.title.clone(),
            message_count: self.messages.len(),
            created_at: self.created_at.to_chrono(),
            updated_at: self.updated_at.to_chrono(),
        }
    }
}

impl From<MongoChat> for ChatTranscript {
    fn from(chat: MongoChat) -> Self {
        Self {
            id: chat.id.to_hex(),
            user_id: chat.user_id,
            title: chat.title,
            messages: chat.messages,
            created_at: chat.created_at.to_chrono(),
            updated_at: chat.updated_at.to_chrono(),
        }
    }
}

/// Document in `users`, keyed by the external user id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUser {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub plan: Plan,
    #[serde(default)]
    pub prompts_used_today: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_prompt_date: Option<BsonDateTime>,
}

impl From<MongoUser> for UserUsage {
    fn from(user: MongoUser) -> Self {
        Self {
            plan: user.plan,
            prompts_used_today: u32::try_from(user.prompts_used_today).unwrap_or(0),
            last_prompt_date: user.last_prompt_date.map(|d| d.to_chrono()),
        }
    }
}

/// Document in `tasks`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoTask {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<BsonDateTime>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub completed: bool,
    pub created_at: BsonDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<BsonDateTime>,
}

impl From<Task> for MongoTask {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            user_id: task.user_id,
            title: task.title,
            description: task.description,
            due_date: task.due_date.map(BsonDateTime::from_chrono),
            priority: task.priority,
            completed: task.completed,
            created_at: BsonDateTime::from_chrono(task.created_at),
            completed_at: task.completed_at.map(BsonDateTime::from_chrono),
        }
    }
}

impl From<MongoTask> for Task {
    fn from(task: MongoTask) -> Self {
        Self {
            id: task.id,
            user_id: task.user_id,
            title: task.title,
            description: task.description,
            due_date: task.due_date.map(|d| d.to_chrono()),
            priority: task.priority,
            completed: task.completed,
            created_at: task.created_at.to_chrono(),
            completed_at: task.completed_at.map(|d| d.to_chrono()),
        }
    }
}

/// Document in `sessions`, written by the auth provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSession {
    pub token: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<BsonDateTime>,
}

impl From<MongoSession> for Session {
    fn from(session: MongoSession) -> Self {
        Self {
            token: session.token,
            user_id: session.user_id,
            expires_at: session.expires_at.map(|d| d.to_chrono()),
        }
    }
}
