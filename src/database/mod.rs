//! Local durable storage of mining records.

pub mod file_store;
pub mod memory_store;
pub mod mining_state_store;

use std::fmt::Debug;

pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use mining_state_store::MiningStateStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage i/o failed for `{key}`: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not serialize record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("stored record under `{key}` is corrupt: {reason}")]
    Corrupt { key: String, reason: String },
}

/// String key-value storage that survives process restarts.
///
/// Values are opaque strings; interpreting them is up to the caller.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync + Debug {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
    async fn keys(&self) -> Result<Vec<String>, StoreError>;
}
