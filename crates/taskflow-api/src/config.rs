use config::{Config as ConfigLoader, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use taskflow_persist::StorageBackend;
use taskflow_types::PlanLimits;
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub mongodb: MongoDbConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub logging: LoggingConfig,

    // Secrets (from ENV only)
    #[serde(skip)]
    pub mongodb_uri: Option<String>,
    #[serde(skip)]
    pub openai_api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoDbConfig {
    pub database: String,
}

impl Default for MongoDbConfig {
    fn default() -> Self {
        Self {
            database: "taskflow".to_string(),
        }
    }
}

/// A model callers may select with `modelId`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible endpoint; the provider default when unset
    #[serde(default)]
    pub base_url: Option<String>,
    pub default_model: String,
    #[serde(default)]
    pub models: Vec<ModelInfo>,
    pub temperature: f32,
}

impl LlmConfig {
    /// The default model is always selectable, even when not listed
    pub fn is_known_model(&self, id: &str) -> bool {
        id == self.default_model || self.models.iter().any(|m| m.id == id)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            default_model: "gpt-4o-mini".to_string(),
            models: vec![
                ModelInfo::new("gpt-4o-mini", "GPT-4o mini"),
                ModelInfo::new("gpt-4o", "GPT-4o"),
            ],
            temperature: 0.7,
        }
    }
}

/// Daily prompt limits; `pro` is always unlimited
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QuotaConfig {
    pub free: u32,
    pub plus: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        let limits = PlanLimits::default();
        Self {
            free: limits.free,
            plus: limits.plus,
        }
    }
}

impl From<QuotaConfig> for PlanLimits {
    fn from(config: QuotaConfig) -> Self {
        Self {
            free: config.free,
            plus: config.plus,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Environment variables that override a single config key
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("SERVER_HOST", "server.host"),
    ("SERVER_PORT", "server.port"),
    ("STORAGE_BACKEND", "storage.backend"),
    ("MONGODB_DATABASE", "mongodb.database"),
    ("LLM_BASE_URL", "llm.base_url"),
    ("LLM_DEFAULT_MODEL", "llm.default_model"),
    ("LLM_TEMPERATURE", "llm.temperature"),
    ("QUOTA_FREE", "quota.free"),
    ("QUOTA_PLUS", "quota.plus"),
    ("LOG_LEVEL", "logging.level"),
    ("LOG_FORMAT", "logging.format"),
];

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. Environment variables (SERVER_, MONGODB_, LLM_, LOG_, QUOTA_, STORAGE_ prefixes)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::load`] with an injectable variable lookup
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = lookup("ENV").unwrap_or_else(|| "dev".to_string());
        let dir = lookup("CONFIG_DIR").unwrap_or_else(|| "config".to_string());

        let mut builder = ConfigLoader::builder()
            .add_source(File::with_name(&format!("{}/default", dir)).required(false))
            .add_source(File::with_name(&format!("{}/{}", dir, env)).required(false));

        for (var, key) in ENV_OVERRIDES {
            builder = builder.set_override_option(*key, lookup(var))?;
        }

        let mut cfg: Config = builder.build()?.try_deserialize()?;

        // Secrets are never read from files
        cfg.openai_api_key = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty());
        cfg.mongodb_uri = lookup("MONGODB_URI").filter(|u| !u.trim().is_empty());

        if cfg.storage.backend == StorageBackend::Mongodb && cfg.mongodb_uri.is_none() {
            return Err(ConfigError::Message(
                "MONGODB_URI environment variable is required for the mongodb backend".to_string(),
            ));
        }

        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        ConfigLoader::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()
    }
}
