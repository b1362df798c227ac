use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use taskflow_llm::Tool;
use taskflow_persist::{PersistError, TaskStore};
use taskflow_types::{NewTask, TaskPriority, TaskStatusFilter};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown function: {0}")]
    NotFound(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid arguments for {function}: {reason}")]
    InvalidArguments { function: String, reason: String },

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] PersistError),

    #[error("Failed to encode result: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Callable functions the model may request
#[async_trait]
pub trait FunctionExecutor: Send + Sync {
    /// Declarations sent upstream in the `tools` array
    fn definitions(&self) -> Vec<Tool>;

    async fn execute(&self, user_id: &str, name: &str, arguments: Value) -> Result<Value, ToolError>;
}

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 100;

/// Task management functions backed by a [`TaskStore`]
pub struct TaskTools {
    store: Arc<dyn TaskStore>,
}

#[derive(Deserialize)]
struct CreateTaskArgs {
    #[serde(default)]
    title: String,
    description: Option<String>,
    #[serde(rename = "dueDate")]
    due_date: Option<String>,
    priority: Option<TaskPriority>,
}

#[derive(Deserialize)]
struct GetTasksArgs {
    status: Option<TaskStatusFilter>,
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct TaskIdArgs {
    #[serde(rename = "taskId")]
    task_id: String,
}

impl TaskTools {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    async fn create_task(&self, user_id: &str, args: CreateTaskArgs) -> Result<Value, ToolError> {
        let title = args.title.trim();
        if title.is_empty() {
            return Err(ToolError::MissingParameter("title".to_string()));
        }

        let due_date = args
            .due_date
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(parse_due_date)
            .transpose()?;

        let task = self
            .store
            .create_task(
                user_id,
                NewTask {
                    title: title.to_string(),
                    description: args.description.filter(|d| !d.trim().is_empty()),
                    due_date,
                    priority: args.priority.unwrap_or_default(),
                },
            )
            .await?;

        tracing::info!(user_id, task_id = %task.id, "Task created");
        Ok(serde_json::to_value(task)?)
    }

    async fn get_tasks(&self, user_id: &str, args: GetTasksArgs) -> Result<Value, ToolError> {
        let limit = args.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        let tasks = self
            .store
            .list_tasks(user_id, args.status.unwrap_or_default(), limit)
            .await?;

        Ok(serde_json::to_value(tasks)?)
    }

    async fn complete_task(&self, user_id: &str, args: TaskIdArgs) -> Result<Value, ToolError> {
        let task = self
            .store
            .complete_task(user_id, &args.task_id)
            .await?
            .ok_or(ToolError::TaskNotFound(args.task_id))?;

        Ok(serde_json::to_value(task)?)
    }

    async fn delete_task(&self, user_id: &str, args: TaskIdArgs) -> Result<Value, ToolError> {
        if !self.store.delete_task(user_id, &args.task_id).await? {
            return Err(ToolError::TaskNotFound(args.task_id));
        }

        Ok(json!({ "deleted": true, "taskId": args.task_id }))
    }
}

#[async_trait]
impl FunctionExecutor for TaskTools {
    fn definitions(&self) -> Vec<Tool> {
        vec![
            Tool::new(
                "create_task",
                "Create a new task for the user",
                json!({
                    "type": "object",
                    "properties": {
                        "title": { "type": "string", "description": "Short task title" },
                        "description": { "type": "string", "description": "Optional details" },
                        "dueDate": { "type": "string", "description": "Due date as YYYY-MM-DD" },
                        "priority": { "type": "string", "enum": ["low", "medium", "high"] }
                    },
                    "required": ["title"]
                }),
            ),
            Tool::new(
                "get_tasks",
                "List the user's tasks, newest first",
                json!({
                    "type": "object",
                    "properties": {
                        "status": { "type": "string", "enum": ["all", "pending", "completed"] },
                        "limit": { "type": "integer", "minimum": 1, "maximum": MAX_LIST_LIMIT }
                    }
                }),
            ),
            Tool::new(
                "complete_task",
                "Mark a task as completed",
                json!({
                    "type": "object",
                    "properties": {
                        "taskId": { "type": "string", "description": "Id from get_tasks" }
                    },
                    "required": ["taskId"]
                }),
            ),
            Tool::new(
                "delete_task",
                "Delete a task permanently",
                json!({
                    "type": "object",
                    "properties": {
                        "taskId": { "type": "string", "description": "Id from get_tasks" }
                    },
                    "required": ["taskId"]
                }),
            ),
        ]
    }

    async fn execute(&self, user_id: &str, name: &str, arguments: Value) -> Result<Value, ToolError> {
        tracing::debug!(user_id, function = name, "Executing function");

        match name {
            "create_task" => self.create_task(user_id, parse_args(name, arguments)?).await,
            "get_tasks" => self.get_tasks(user_id, parse_args(name, arguments)?).await,
            "complete_task" => self.complete_task(user_id, parse_args(name, arguments)?).await,
            "delete_task" => self.delete_task(user_id, parse_args(name, arguments)?).await,
            other => Err(ToolError::NotFound(other.to_string())),
        }
    }
}

fn parse_args<T: DeserializeOwned>(function: &str, arguments: Value) -> Result<T, ToolError> {
    // Models sometimes send `null` instead of `{}` for argument-less calls
    let arguments = if arguments.is_null() { json!({}) } else { arguments };

    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
        function: function.to_string(),
        reason: e.to_string(),
    })
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC)
fn parse_due_date(raw: &str) -> Result<DateTime<Utc>, ToolError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ToolError::InvalidArguments {
            function: "create_task".to_string(),
            reason: format!("dueDate '{}' is not a valid date", raw),
        })
}
