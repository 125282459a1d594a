use std::collections::BTreeMap;

use super::KeyValueStore;
use super::StoreError;
use crate::locks::tokio::AtomicRw;

/// Process-local store. Clones share the same map, which lets tests play the
/// part of a restarted process by building a new engine over the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: AtomicRw<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: AtomicRw::from((BTreeMap::new(), "memory_store")),
        }
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock(|e| e.get(key).cloned()).await)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries
            .lock_mut(|e| e.insert(key.to_string(), value))
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock_mut(|e| e.remove(key)).await;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.lock(|e| e.keys().cloned().collect()).await)
    }
}
