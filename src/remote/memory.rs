use std::collections::HashMap;
use std::time::Duration;

use super::ProfileRow;
use super::ProfileUpdate;
use super::RemoteError;
use super::RemoteProfileService;
use crate::locks::tokio::AtomicRw;

#[derive(Debug, Default)]
struct Inner {
    rows: HashMap<String, ProfileRow>,
    latency: Duration,
    offline: bool,
    updates: Vec<(String, ProfileUpdate)>,
}

/// In-process stand-in for the remote profile service, with adjustable
/// latency and an offline switch. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryProfileService {
    inner: AtomicRw<Inner>,
}

impl MemoryProfileService {
    pub async fn insert(&self, user_id: &str, row: ProfileRow) {
        self.inner
            .lock_mut(|i| i.rows.insert(user_id.to_string(), row))
            .await;
    }

    pub async fn row(&self, user_id: &str) -> Option<ProfileRow> {
        self.inner.lock(|i| i.rows.get(user_id).cloned()).await
    }

    pub async fn set_latency(&self, latency: Duration) {
        self.inner.lock_mut(|i| i.latency = latency).await;
    }

    pub async fn set_online(&self, online: bool) {
        self.inner.lock_mut(|i| i.offline = !online).await;
    }

    /// Every update received so far, oldest first.
    pub async fn updates(&self) -> Vec<(String, ProfileUpdate)> {
        self.inner.lock(|i| i.updates.clone()).await
    }

    async fn round_trip(&self) -> Result<(), RemoteError> {
        let (latency, offline) = self.inner.lock(|i| (i.latency, i.offline)).await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if offline {
            return Err(RemoteError::Unavailable("offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RemoteProfileService for MemoryProfileService {
    async fn get(&self, user_id: &str) -> Result<Option<ProfileRow>, RemoteError> {
        self.round_trip().await?;
        Ok(self.row(user_id).await)
    }

    async fn update(&self, user_id: &str, update: ProfileUpdate) -> Result<(), RemoteError> {
        self.round_trip().await?;
        self.inner
            .lock_mut(|i| {
                let row = i.rows.entry(user_id.to_string()).or_default();
                update.apply_to(row);
                i.updates.push((user_id.to_string(), update));
            })
            .await;
        Ok(())
    }
}
