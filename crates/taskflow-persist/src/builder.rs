use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{PersistError, Result};
use crate::memory::MemoryPersistenceClient;
use crate::trait_client::{PersistenceClient, SessionStore, TaskStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Mongodb,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Mongodb => "mongodb",
        }
    }
}

/// The three stores, usually backed by one connection
#[derive(Clone)]
pub struct Storage {
    pub backend: StorageBackend,
    pub chats: Arc<dyn PersistenceClient>,
    pub tasks: Arc<dyn TaskStore>,
    pub sessions: Arc<dyn SessionStore>,
}

impl Storage {
    pub fn memory(client: Arc<MemoryPersistenceClient>) -> Self {
        Self {
            backend: StorageBackend::Memory,
            chats: client.clone(),
            tasks: client.clone(),
            sessions: client,
        }
    }
}

pub struct StorageBuilder {
    backend: StorageBackend,
    mongodb_uri: Option<String>,
    database: Option<String>,
}

impl StorageBuilder {
    pub fn new() -> Self {
        Self {
            backend: StorageBackend::default(),
            mongodb_uri: None,
            database: None,
        }
    }

    pub fn backend(mut self, backend: StorageBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn mongodb_uri(mut self, uri: impl Into<String>) -> Self {
        self.mongodb_uri = Some(uri.into());
        self
    }

    pub fn database(mut self, db: impl Into<String>) -> Self {
        self.database = Some(db.into());
        self
    }

    pub async fn build(self) -> Result<Storage> {
        match self.backend {
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on restart");
                Ok(Storage::memory(Arc::new(MemoryPersistenceClient::new())))
            }
            StorageBackend::Mongodb => self.build_mongodb().await,
        }
    }

    #[cfg(feature = "mongodb")]
    async fn build_mongodb(self) -> Result<Storage> {
        let mongodb_uri = self
            .mongodb_uri
            .ok_or_else(|| PersistError::Configuration("mongodb_uri is required".to_string()))?;
        let database = self
            .database
            .ok_or_else(|| PersistError::Configuration("database is required".to_string()))?;

        let client =
            Arc::new(crate::dbs::mongo::MongoPersistenceClient::connect(&mongodb_uri, &database).await?);
        tracing::info!(database = %database, "Connected to MongoDB");

        Ok(Storage {
            backend: StorageBackend::Mongodb,
            chats: client.clone(),
            tasks: client.clone(),
            sessions: client,
        })
    }

    #[cfg(not(feature = "mongodb"))]
    async fn build_mongodb(self) -> Result<Storage> {
        Err(PersistError::Configuration(
            "storage backend 'mongodb' requires the `mongodb` feature".to_string(),
        ))
    }
}

impl Default for StorageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_shares_state() {
        let storage = StorageBuilder::new().build().await.unwrap();
        assert_eq!(storage.backend, StorageBackend::Memory);

        let id = storage
            .chats
            .append_messages("u1", vec![taskflow_types::ChatMessage::user("hi")], None)
            .await
            .unwrap();
        assert!(storage.chats.get_chat("u1", &id).await.unwrap().is_some());
    }

    #[cfg(not(feature = "mongodb"))]
    #[tokio::test]
    async fn test_mongodb_requires_feature() {
        let result = StorageBuilder::new()
            .backend(StorageBackend::Mongodb)
            .mongodb_uri("mongodb://localhost:27017")
            .database("taskflow")
            .build()
            .await;
        assert!(matches!(result, Err(PersistError::Configuration(_))));
    }

    #[test]
    fn test_backend_serde() {
        let backend: StorageBackend = serde_json::from_str("\"mongodb\"").unwrap();
        assert_eq!(backend, StorageBackend::Mongodb);
    }
}
