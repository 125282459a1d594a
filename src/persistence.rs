//! Coalescing writer between the live [`MiningState`] and the local store.

use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::database::MiningStateStore;
use crate::models::state::mining_state::MiningState;
use crate::models::state::mining_state::PersistFingerprint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum PersistOutcome {
    Written,
    /// Nothing that matters changed since the last successful write.
    Unchanged,
    /// The write failed; the next flush retries with whatever is current.
    Failed,
}

/// Remembers what was last written so unchanged states are not written
/// again. A failed write leaves the scheduler dirty.
#[derive(Debug, Default)]
pub struct PersistenceScheduler {
    last_written: Option<PersistFingerprint>,
    dirty: bool,
    consecutive_failures: u32,
}

impl PersistenceScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn needs_write(&self, state: &MiningState) -> bool {
        self.dirty || self.last_written.as_ref() != Some(&state.fingerprint())
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Forget the last write, e.g. after switching users.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Write `state` if it differs from the last write, or unconditionally
    /// with `force`. Never returns an error: failures are logged.
    pub async fn persist(
        &mut self,
        store: &MiningStateStore,
        state: &MiningState,
        force: bool,
    ) -> PersistOutcome {
        if !force && !self.needs_write(state) {
            return PersistOutcome::Unchanged;
        }

        match store.save(state).await {
            Ok(()) => {
                self.last_written = Some(state.fingerprint());
                self.dirty = false;
                if self.consecutive_failures > 0 {
                    debug!(
                        "local store write recovered after {} failures",
                        self.consecutive_failures
                    );
                }
                self.consecutive_failures = 0;
                PersistOutcome::Written
            }
            Err(e) => {
                self.dirty = true;
                self.consecutive_failures += 1;
                if self.consecutive_failures == 1 {
                    warn!("local store write failed, will retry: {e}");
                } else {
                    error!(
                        "local store write failed {} times in a row: {e}",
                        self.consecutive_failures
                    );
                }
                PersistOutcome::Failed
            }
        }
    }
}
