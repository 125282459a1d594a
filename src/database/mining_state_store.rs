use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use super::KeyValueStore;
use super::StoreError;
use crate::models::coins::Coins;
use crate::models::state::mining_state::MiningParams;
use crate::models::state::mining_state::MiningState;
use crate::models::timestamp::Timestamp;

/// Prefix shared by every record key. On its own it is the global key that
/// holds the most recently saved record of any user.
pub const KEY_PREFIX: &str = "fcMinerUserData";
pub const KEY_VERSION: &str = "v1.0";

/// Versioned per-user key, e.g. `fcMinerUserData_alice_v1.0`.
pub fn user_key(user_id: &str) -> String {
    format!("{KEY_PREFIX}_{user_id}_{KEY_VERSION}")
}

fn key_for(user_id: Option<&str>) -> String {
    user_id.map_or_else(|| KEY_PREFIX.to_string(), user_key)
}

/// Typed access to [`MiningState`] records on top of a [`KeyValueStore`].
#[derive(Debug, Clone)]
pub struct MiningStateStore {
    inner: Arc<dyn KeyValueStore>,
}

impl MiningStateStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }

    /// Load the record of `user_id`, or the global record when anonymous.
    ///
    /// A user without a versioned record inherits the global one, but only if
    /// that record belongs to them; it is then migrated to the versioned key.
    /// Corrupt records are deleted and reported as absent.
    pub async fn load(&self, user_id: Option<&str>) -> Option<MiningState> {
        let key = key_for(user_id);
        if let Some(state) = self.read(&key).await {
            return Some(state);
        }

        let user_id = user_id?;
        let legacy = self.read(KEY_PREFIX).await?;
        if legacy.user_id.as_deref() != Some(user_id) {
            debug!("global record belongs to another user; not migrating");
            return None;
        }

        match self.write_key(&key, &legacy).await {
            Ok(()) => debug!("migrated global record to {key}"),
            Err(e) => warn!("could not migrate global record to {key}: {e}"),
        }
        Some(legacy)
    }

    /// Balance currently on disk for `user_id`, without side effects.
    pub async fn stored_balance(&self, user_id: Option<&str>) -> Option<Coins> {
        self.stored_balance_at(user_id)
            .await
            .map(|(balance, _)| balance)
    }

    /// Balance currently on disk for `user_id` and when it was written,
    /// without side effects.
    pub async fn stored_balance_at(&self, user_id: Option<&str>) -> Option<(Coins, Timestamp)> {
        let key = key_for(user_id);
        let raw = self.inner.get(&key).await.ok()??;
        decode(&key, &raw)
            .ok()
            .map(|state| (state.balance, state.last_saved))
    }

    /// Write the record under its user's key and mirror it to the global key.
    pub async fn save(&self, state: &MiningState) -> Result<(), StoreError> {
        let value = serde_json::to_string(state)?;
        if let Some(user_id) = state.user_id.as_deref() {
            self.inner.set(&user_key(user_id), value.clone()).await?;
        }
        self.inner.set(KEY_PREFIX, value).await
    }

    /// Remove the global record, or every record when `all_users` is set.
    pub async fn clear(&self, all_users: bool) -> Result<(), StoreError> {
        if !all_users {
            return self.inner.delete(KEY_PREFIX).await;
        }
        for key in self.inner.keys().await? {
            if key.starts_with(KEY_PREFIX) {
                self.inner.delete(&key).await?;
            }
        }
        Ok(())
    }

    async fn read(&self, key: &str) -> Option<MiningState> {
        let raw = match self.inner.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("could not read {key}: {e}");
                return None;
            }
        };

        match decode(key, &raw) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("discarding corrupt record: {e}");
                if let Err(e) = self.inner.delete(key).await {
                    warn!("could not delete corrupt record under {key}: {e}");
                }
                None
            }
        }
    }

    async fn write_key(&self, key: &str, state: &MiningState) -> Result<(), StoreError> {
        self.inner.set(key, serde_json::to_string(state)?).await
    }
}

fn decode(key: &str, raw: &str) -> Result<MiningState, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        key: key.to_string(),
        reason,
    };
    let mut state: MiningState = serde_json::from_str(raw).map_err(|e| corrupt(e.to_string()))?;
    if !MiningParams::is_valid_period(state.mining_period) {
        return Err(corrupt(format!(
            "mining period of {} seconds",
            state.mining_period
        )));
    }
    state.normalize();
    Ok(state)
}
