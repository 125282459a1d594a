use tracing::debug;
use tracing::instrument;
use tracing::warn;

use super::MiningEngine;
use crate::models::coins::Coins;
use crate::models::state::reconcile::merge;
use crate::models::state::reconcile::RemoteProfileSnapshot;
use crate::models::state::reconcile::Resolution;
use crate::remote::fetch_with_timeout;
use crate::remote::ProfileUpdate;
use crate::remote::RemoteFetch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum SyncMode {
    /// Right after sign-in. The merge result is applied as-is.
    Login,
    /// Background poll. Applied only if it raises the balance, or on an
    /// anti-cheat override.
    Periodic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied {
        resolution: Resolution,
        balance: Coins,
    },
    /// The merge would not have raised the balance; nothing changed.
    Stale,
    /// The remote has no profile for this user yet.
    NoRemoteData,
    /// No remote configured, nobody signed in, or the remote failed or timed
    /// out. Local state carries on alone.
    Unavailable,
    /// A periodic reconciliation was already running.
    InFlight,
}

impl MiningEngine {
    /// Pull the remote profile and merge it into the live state.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, mode: SyncMode) -> ReconcileOutcome {
        let _in_flight = match mode {
            SyncMode::Login => None,
            SyncMode::Periodic => match self.sync_flight.try_enter() {
                Some(guard) => Some(guard),
                None => {
                    debug!("periodic reconciliation already in flight");
                    return ReconcileOutcome::InFlight;
                }
            },
        };

        let outcome = self.reconcile_inner(mode).await;
        debug!("reconciliation outcome: {outcome:?}");
        outcome
    }

    async fn reconcile_inner(&self, mode: SyncMode) -> ReconcileOutcome {
        let Some(remote) = self.remote.clone() else {
            return ReconcileOutcome::Unavailable;
        };
        let Some(user_id) = self.session.lock(|s| s.user_id().map(str::to_owned)).await else {
            return ReconcileOutcome::Unavailable;
        };

        // Progress this process could not push earlier is its own, not a
        // fabricated balance; send it before comparing.
        if self.is_remote_behind() {
            debug!("remote is behind local progress; pushing before fetch");
            let state = self.snapshot().await;
            self.push_remote(ProfileUpdate::mining_fields(&state, self.clock.now()))
                .await;
        }

        let row = match fetch_with_timeout(&*remote, &user_id, self.config.remote_timeout).await {
            RemoteFetch::Found(row) => row,
            RemoteFetch::Missing => {
                // Seed the remote with what we have so it can be compared next
                // time.
                let state = self.snapshot().await;
                self.push_remote(ProfileUpdate::mining_fields(&state, self.clock.now()))
                    .await;
                return ReconcileOutcome::NoRemoteData;
            }
            RemoteFetch::Unavailable(e) => {
                debug!("remote profile unavailable: {e}");
                return ReconcileOutcome::Unavailable;
            }
        };
        let snapshot = RemoteProfileSnapshot::from(&row);
        let now = self.clock.now();

        let applied = {
            let mut rates = self.rates.lock_guard_mut().await;
            let mut state = self.state.lock_guard_mut().await;
            let Some(merged) = merge(Some(&*state), Some(&snapshot), &self.config.params) else {
                return ReconcileOutcome::Unavailable;
            };

            if merged.resolution == Resolution::AntiCheatOverride {
                warn!(
                    local = %state.balance,
                    remote = %merged.state.balance,
                    "anti-cheat override: local balance replaced by remote"
                );
            }

            let raises_balance = merged.state.balance > state.balance;
            let apply = match mode {
                SyncMode::Login => true,
                SyncMode::Periodic => {
                    raises_balance || merged.resolution == Resolution::AntiCheatOverride
                }
            };
            if !apply {
                return ReconcileOutcome::Stale;
            }

            *state = merged.state;
            if let Some(rate) = snapshot.mining_rate {
                rates.reported_rate = Some(rate);
            }
            if let Some(referral_count) = snapshot.referral_count {
                rates.referral_count = referral_count;
            }
            state.mining_rate = rates.effective_rate(&self.config.rates, &state.boosts, now);
            (merged.resolution, state.balance)
        };
        let (resolution, balance) = applied;

        self.flush().await;

        let remote_balance = snapshot.balance.unwrap_or_default();
        if balance > remote_balance {
            debug!("local balance {balance} ahead of remote {remote_balance}; pushing");
            self.push_remote(ProfileUpdate::balance(balance, now)).await;
        }

        ReconcileOutcome::Applied {
            resolution,
            balance,
        }
    }
}
