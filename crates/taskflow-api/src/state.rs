use std::sync::Arc;

use taskflow_persist::Storage;
use taskflow_relay::{QuotaGate, Relay};

use crate::config::Config;

/// Shared application state passed to all handlers
///
/// `relay` is `None` when no LLM API key is configured; chat requests then
/// fail with a configuration error while the rest of the API keeps working.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Storage,
    pub relay: Option<Relay>,
    pub quota: QuotaGate,
}

impl AppState {
    pub fn new(config: Config, storage: Storage, relay: Option<Relay>) -> Self {
        let quota = QuotaGate::new(config.quota.into());
        Self {
            config: Arc::new(config),
            storage,
            relay,
            quota,
        }
    }
}
