use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use taskflow_api::{build_router, config::Config, state::AppState};
use taskflow_llm::{ClientFactory, ProviderConfig};
use taskflow_persist::StorageBuilder;
use taskflow_relay::{Relay, RelayConfig, TaskTools};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting TaskFlow API server");
    tracing::info!("Config loaded: {}:{}", config.server.host, config.server.port);

    tracing::info!(backend = config.storage.backend.as_str(), "Initializing storage");
    let mut storage = StorageBuilder::new()
        .backend(config.storage.backend)
        .database(&config.mongodb.database);
    if let Some(uri) = &config.mongodb_uri {
        storage = storage.mongodb_uri(uri);
    }
    let storage = storage.build().await?;

    let relay = match &config.openai_api_key {
        Some(api_key) => {
            let mut provider = ProviderConfig::openai(api_key);
            if let Some(base_url) = &config.llm.base_url {
                provider = provider.with_base_url(base_url);
            }
            tracing::info!(base_url = provider.base_url(), "Initializing LLM client");
            let chat_client = ClientFactory::create_chat_client(provider)?;

            let relay = Relay::builder()
                .chat_client(chat_client)
                .executor(Arc::new(TaskTools::new(storage.tasks.clone())))
                .persistence(storage.chats.clone())
                .plan_limits(config.quota.into())
                .config(RelayConfig {
                    default_model: config.llm.default_model.clone(),
                    temperature: config.llm.temperature,
                    ..RelayConfig::default()
                })
                .build()?;
            Some(relay)
        }
        None => {
            tracing::warn!("OPENAI_API_KEY is not set; chat requests will fail until it is configured");
            None
        }
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, storage, relay));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);
    tracing::info!("API docs: http://{}/api/docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
