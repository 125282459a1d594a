use tracing::info;
use tracing::instrument;

use super::MiningEngine;
use crate::models::coins::Coins;
use crate::models::state::accrual::accrue;
use crate::remote::ProfileUpdate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    #[error("mining requires a signed-in user")]
    NotAuthenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ControlOutcome {
    Started,
    Stopped,
    /// Already in the requested state; nothing was changed.
    Unchanged,
}

impl MiningEngine {
    /// Begin a mining session of the configured length.
    ///
    /// Idempotent while a session is running. The new session is written to the
    /// local store before this returns.
    #[instrument(skip(self))]
    pub async fn start_mining(&self) -> Result<ControlOutcome, ControlError> {
        let user_id = self
            .session
            .lock(|s| s.user_id().map(str::to_owned))
            .await
            .ok_or(ControlError::NotAuthenticated)?;

        let now = self.clock.now();
        let period = self.config.params.period_secs;
        let started = {
            let rates = self.rates.lock_guard().await;
            let mut state = self.state.lock_guard_mut().await;
            if state.mining_active {
                None
            } else {
                state.user_id = Some(user_id);
                state.mining_rate = rates.effective_rate(&self.config.rates, &state.boosts, now);
                state.begin_session(period, now);
                Some(state.clone())
            }
        };

        let Some(state) = started else {
            return Ok(ControlOutcome::Unchanged);
        };
        info!(
            "mining started at rate {}, ends {}",
            state.mining_rate,
            state
                .mining_end_time
                .map(|t| t.standard_format())
                .unwrap_or_default()
        );

        self.flush().await;
        self.push_remote(ProfileUpdate::mining_fields(&state, now))
            .await;
        Ok(ControlOutcome::Started)
    }

    /// End the running session early.
    ///
    /// Cycles already due are credited first; only the partial cycle in
    /// progress is forfeited.
    #[instrument(skip(self))]
    pub async fn stop_mining(&self) -> ControlOutcome {
        let now = self.clock.now();
        let user_id = self.state.lock(|s| s.user_id.clone()).await;
        let stored = self.store.stored_balance_at(user_id.as_deref()).await;

        let stopped = {
            let mut state = self.state.lock_guard_mut().await;
            if !state.mining_active {
                None
            } else {
                let stored_balance = super::newer_stored_balance(stored, &state);
                let accrual = accrue(&state, now, stored_balance, &self.config.params);
                if accrual.changed_state() {
                    *state = accrual.state;
                }
                // Accrual may have completed the session on its own.
                if state.mining_active {
                    state.end_session();
                    state.accrued_at = now;
                }
                Some(state.clone())
            }
        };

        let Some(state) = stopped else {
            return ControlOutcome::Unchanged;
        };
        info!("mining stopped, balance {}", state.balance);

        self.flush().await;
        self.push_remote(ProfileUpdate::mining_fields(&state, now))
            .await;
        ControlOutcome::Stopped
    }

    /// Add `amount` to the balance outside of mining, e.g. a referral or task
    /// reward. Written through immediately.
    #[instrument(skip(self))]
    pub async fn credit_bonus(&self, amount: Coins) -> Coins {
        let balance = self
            .state
            .lock_mut(|s| {
                s.balance += amount;
                s.balance
            })
            .await;
        info!("credited bonus {amount}, balance {balance}");

        self.flush().await;
        self.push_remote(ProfileUpdate::balance(balance, self.clock.now()))
            .await;
        balance
    }
}
