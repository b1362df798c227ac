use std::sync::Arc;
use std::time::Instant;

use chrono::{Local, Utc};
use futures::StreamExt;
use taskflow_llm::{
    ChatClient, ChatOptions, ChatRequest, EventStream, LlmError, Message, Reassembled,
    StreamReassembler, ToolCall, ToolChoice,
};
use taskflow_persist::{PersistError, PersistenceClient};
use taskflow_types::{local_day, ChatMessage, ChatRole, FunctionResult, RelayEvent};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::prompt::{render_system_prompt, DEFAULT_SYSTEM_PROMPT_TEMPLATE};
use crate::quota::{QuotaDenied, QuotaGate};
use crate::tools::FunctionExecutor;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Daily prompt limit reached on the {} plan", .0.plan)]
    DailyLimitExceeded(QuotaDenied),

    #[error("Upstream error: {0}")]
    Upstream(#[from] LlmError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RelayError {
    /// Stable code sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::DailyLimitExceeded(_) => "daily_limit_exceeded",
            Self::Upstream(LlmError::Provider(e)) => e.kind.code(),
            Self::Upstream(LlmError::Network(_)) => "network_error",
            Self::Upstream(LlmError::Stream(_)) => "stream_error",
            Self::Upstream(LlmError::Serialization(_)) => "upstream_error",
            Self::Upstream(LlmError::Configuration(_)) | Self::Configuration(_) => {
                "configuration_error"
            }
            Self::Persistence(PersistError::ChatNotFound(_)) => "chat_not_found",
            Self::Persistence(_) => "persistence_error",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }

    /// Message that is safe to show to an end user
    pub fn user_message(&self) -> String {
        match self {
            Self::DailyLimitExceeded(denied) => format!(
                "You've used all {} prompts included in the {} plan today. Upgrade your plan or come back tomorrow.",
                denied.daily_limit, denied.plan
            ),
            Self::Upstream(LlmError::Provider(e)) => e.user_message().to_string(),
            Self::Upstream(LlmError::Network(_)) => {
                "Could not reach the AI service. Please try again.".to_string()
            }
            Self::Upstream(LlmError::Stream(_)) => {
                "The AI response was interrupted. Please try again.".to_string()
            }
            Self::Upstream(_) => "The AI service returned an unexpected response.".to_string(),
            Self::Persistence(PersistError::ChatNotFound(_)) => {
                "This chat no longer exists. Please start a new chat.".to_string()
            }
            Self::Persistence(_) => "Your conversation could not be saved.".to_string(),
            Self::InvalidRequest(msg) => msg.clone(),
            Self::Configuration(_) => "The assistant is not configured.".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub default_model: String,
    pub temperature: f32,
    /// May contain `<current_date>`
    pub system_prompt_template: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            default_model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            system_prompt_template: DEFAULT_SYSTEM_PROMPT_TEMPLATE.to_string(),
        }
    }
}

/// One authenticated chat request
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub user_id: String,
    /// Full transcript as sent by the client; the last entry is the new prompt
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub chat_id: Option<String>,
}

/// Two-phase streaming relay.
///
/// Phase 1 streams the model's answer with the function schema declared.
/// If it requested calls, they are executed in order and a single
/// follow-up (Phase 2, no schema) streams the final answer.
#[derive(Clone)]
pub struct Relay {
    client: Arc<dyn ChatClient>,
    executor: Arc<dyn FunctionExecutor>,
    persistence: Arc<dyn PersistenceClient>,
    quota: QuotaGate,
    config: RelayConfig,
}

/// Everything the spawned turn needs
struct TurnContext {
    client: Arc<dyn ChatClient>,
    executor: Arc<dyn FunctionExecutor>,
    persistence: Arc<dyn PersistenceClient>,
    temperature: f32,
    model: String,
    history: Vec<Message>,
    user_id: String,
    chat_id: Option<String>,
    prompt: ChatMessage,
    started: Instant,
}

enum TurnError {
    Relay(RelayError),
    /// The receiver was dropped
    Disconnected,
}

impl From<RelayError> for TurnError {
    fn from(e: RelayError) -> Self {
        Self::Relay(e)
    }
}

impl From<LlmError> for TurnError {
    fn from(e: LlmError) -> Self {
        Self::Relay(e.into())
    }
}

impl From<PersistError> for TurnError {
    fn from(e: PersistError) -> Self {
        Self::Relay(e.into())
    }
}

impl Relay {
    pub(crate) fn new(
        client: Arc<dyn ChatClient>,
        executor: Arc<dyn FunctionExecutor>,
        persistence: Arc<dyn PersistenceClient>,
        quota: QuotaGate,
        config: RelayConfig,
    ) -> Self {
        Self {
            client,
            executor,
            persistence,
            quota,
            config,
        }
    }

    pub fn builder() -> crate::builder::RelayBuilder {
        crate::builder::RelayBuilder::new()
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn quota(&self) -> &QuotaGate {
        &self.quota
    }

    /// Admit the turn and open Phase 1.
    ///
    /// Quota denial and upstream rejection are returned here, before any
    /// event exists. Later failures arrive as one `error` event.
    pub async fn start(&self, turn: ChatTurn) -> Result<mpsc::Receiver<RelayEvent>, RelayError> {
        let started = Instant::now();

        let prompt = turn
            .messages
            .last()
            .filter(|m| m.role == ChatRole::User && !m.text().trim().is_empty())
            .cloned()
            .ok_or_else(|| {
                RelayError::InvalidRequest("The last message must be a non-empty user message".to_string())
            })?;

        let usage = self.persistence.get_usage(&turn.user_id).await?;
        let status = self
            .quota
            .check(&usage, local_day(Utc::now()))
            .map_err(RelayError::DailyLimitExceeded)?;
        tracing::debug!(
            user_id = %turn.user_id,
            plan = %status.plan,
            used = status.prompts_used_today,
            "Quota check passed"
        );

        let model = turn.model.unwrap_or_else(|| self.config.default_model.clone());
        let mut history = Vec::with_capacity(turn.messages.len() + 1);
        history.push(Message::system(render_system_prompt(
            &self.config.system_prompt_template,
            Local::now(),
        )));
        history.extend(turn.messages.iter().filter_map(ChatMessage::to_llm_message));

        let tools = self.executor.definitions();
        let mut options = ChatOptions::new().temperature(self.config.temperature);
        if !tools.is_empty() {
            options = options.tools(tools).tool_choice(ToolChoice::auto());
        }

        tracing::info!(
            user_id = %turn.user_id,
            model = %model,
            messages = history.len(),
            chat_id = ?turn.chat_id,
            "Starting relay"
        );

        let phase1 = self
            .client
            .chat_stream(ChatRequest::new(model.clone(), history.clone()).with_options(options))
            .await?;

        let ctx = TurnContext {
            client: Arc::clone(&self.client),
            executor: Arc::clone(&self.executor),
            persistence: Arc::clone(&self.persistence),
            temperature: self.config.temperature,
            model,
            history,
            user_id: turn.user_id,
            chat_id: turn.chat_id,
            prompt,
            started,
        };

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let user_id = ctx.user_id.clone();
            match Self::run_turn(ctx, phase1, &tx).await {
                Ok(()) => {}
                Err(TurnError::Disconnected) => {
                    tracing::info!(user_id = %user_id, "Client disconnected, relay stopped");
                }
                Err(TurnError::Relay(e)) => {
                    tracing::error!(user_id = %user_id, code = e.code(), error = %e, "Relay failed");
                    let _ = tx.send(RelayEvent::error(e.user_message(), e.code())).await;
                }
            }
        });

        Ok(rx)
    }

    async fn run_turn(
        ctx: TurnContext,
        phase1: EventStream,
        tx: &mpsc::Sender<RelayEvent>,
    ) -> Result<(), TurnError> {
        let first = forward(phase1, tx).await?;
        let mut text = first.text.clone();
        let tool_calls = first.tool_calls.clone();
        let mut results = Vec::new();

        if !tool_calls.is_empty() {
            send(tx, RelayEvent::ToolStart).await?;

            for call in &tool_calls {
                results.push(execute_call(&ctx, call).await);
            }

            let follow_up = follow_up_messages(&ctx.history, first, &results);
            let request = ChatRequest::new(ctx.model.clone(), follow_up)
                .with_options(ChatOptions::new().temperature(ctx.temperature));
            let phase2 = ctx.client.chat_stream(request).await?;
            let second = forward(phase2, tx).await?;

            if !second.tool_calls.is_empty() {
                tracing::warn!(
                    count = second.tool_calls.len(),
                    "Ignoring tool calls requested in follow-up"
                );
            }
            text.push_str(&second.text);

            send(
                tx,
                RelayEvent::ToolResults {
                    results: results.clone(),
                },
            )
            .await?;
        }

        // The upstream cycle completed, so it counts even if saving fails below
        if let Err(e) = ctx.persistence.record_prompt(&ctx.user_id, Utc::now()).await {
            tracing::error!(user_id = %ctx.user_id, error = %e, "Failed to record prompt usage");
        }

        let duration = round_seconds(ctx.started.elapsed().as_secs_f64());
        let now = Utc::now();

        let mut prompt = ctx.prompt;
        prompt.timestamp.get_or_insert(now);

        let reply = ChatMessage {
            role: ChatRole::Assistant,
            content: Some(text),
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            function_results: (!results.is_empty()).then_some(results),
            duration_seconds: Some(duration),
            model_id: Some(ctx.model),
            timestamp: Some(now),
        };

        let chat_id = ctx
            .persistence
            .append_messages(&ctx.user_id, vec![prompt, reply], ctx.chat_id.as_deref())
            .await?;

        tracing::info!(user_id = %ctx.user_id, chat_id = %chat_id, duration, "Relay completed");
        send(tx, RelayEvent::Done { chat_id, duration }).await
    }
}

/// Relay content tokens as they arrive and reassemble the rest
async fn forward(
    mut stream: EventStream,
    tx: &mpsc::Sender<RelayEvent>,
) -> Result<Reassembled, TurnError> {
    let mut reassembler = StreamReassembler::new();

    while let Some(event) = stream.next().await {
        if let Some(token) = reassembler.push(event?) {
            send(tx, RelayEvent::Content { content: token }).await?;
        }
    }

    Ok(reassembler.finish())
}

async fn send(tx: &mpsc::Sender<RelayEvent>, event: RelayEvent) -> Result<(), TurnError> {
    tx.send(event).await.map_err(|_| TurnError::Disconnected)
}

async fn execute_call(ctx: &TurnContext, call: &ToolCall) -> FunctionResult {
    let name = call.function.name.clone();
    let started = Instant::now();

    let outcome = match call.arguments_value() {
        Ok(arguments) => ctx
            .executor
            .execute(&ctx.user_id, &name, arguments)
            .await
            .map_err(|e| e.to_string()),
        Err(e) => Err(format!("Invalid arguments: {}", e)),
    };

    match outcome {
        Ok(result) => {
            tracing::info!(
                function = %name,
                duration_ms = started.elapsed().as_millis() as u64,
                "Function executed"
            );
            FunctionResult::new(name, result)
        }
        Err(message) => {
            tracing::warn!(function = %name, error = %message, "Function failed");
            FunctionResult::error(name, message)
        }
    }
}

/// Phase 2 input: history, the assistant turn with its calls, one tool message per result
fn follow_up_messages(
    history: &[Message],
    first: Reassembled,
    results: &[FunctionResult],
) -> Vec<Message> {
    let mut messages = history.to_vec();
    let answers: Vec<Message> = first
        .tool_calls
        .iter()
        .zip(results)
        .map(|(call, result)| Message::tool_result(call.id.clone(), result.result.to_string()))
        .collect();

    messages.push(Message::assistant_with_tools(first.text, first.tool_calls));
    messages.extend(answers);
    messages
}

fn round_seconds(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}
