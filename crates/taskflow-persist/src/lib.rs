pub mod builder;
pub mod error;
pub mod memory;
pub mod trait_client;

#[cfg(feature = "mongodb")]
pub mod dbs;

pub use builder::{Storage, StorageBackend, StorageBuilder};
pub use error::{PersistError, Result};
pub use memory::MemoryPersistenceClient;
pub use trait_client::{PersistenceClient, SessionStore, TaskStore};

#[cfg(feature = "mongodb")]
pub use dbs::mongo::MongoPersistenceClient;
