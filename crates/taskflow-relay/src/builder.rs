use std::sync::Arc;

use taskflow_llm::ChatClient;
use taskflow_persist::PersistenceClient;
use taskflow_types::PlanLimits;

use crate::quota::QuotaGate;
use crate::relay::{Relay, RelayConfig, RelayError};
use crate::tools::FunctionExecutor;

/// Builder for constructing a Relay from its collaborators
pub struct RelayBuilder {
    chat_client: Option<Arc<dyn ChatClient>>,
    executor: Option<Arc<dyn FunctionExecutor>>,
    persistence: Option<Arc<dyn PersistenceClient>>,
    limits: PlanLimits,
    config: RelayConfig,
}

impl RelayBuilder {
    pub fn new() -> Self {
        Self {
            chat_client: None,
            executor: None,
            persistence: None,
            limits: PlanLimits::default(),
            config: RelayConfig::default(),
        }
    }

    pub fn chat_client(mut self, client: Arc<dyn ChatClient>) -> Self {
        self.chat_client = Some(client);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn FunctionExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn persistence(mut self, client: Arc<dyn PersistenceClient>) -> Self {
        self.persistence = Some(client);
        self
    }

    pub fn plan_limits(mut self, limits: PlanLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Relay, RelayError> {
        let chat_client = self
            .chat_client
            .ok_or_else(|| RelayError::Configuration("chat client is required".to_string()))?;
        let executor = self
            .executor
            .ok_or_else(|| RelayError::Configuration("function executor is required".to_string()))?;
        let persistence = self
            .persistence
            .ok_or_else(|| RelayError::Configuration("persistence client is required".to_string()))?;

        Ok(Relay::new(
            chat_client,
            executor,
            persistence,
            QuotaGate::new(self.limits),
            self.config,
        ))
    }
}

impl Default for RelayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
