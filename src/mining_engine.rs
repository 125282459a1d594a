//! The live mining engine: one user's [`MiningState`] plus everything that
//! reads and writes it.
//!
//! All writers (the accrual tick, the control surface, reconciliation and
//! bonus credits) go through the same state lock. Persistence always takes the
//! scheduler lock before reading the state, so writes reach the store in the
//! order the state changed.

pub mod control;
pub mod reconciliation;

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::config_models::engine_config::EngineConfig;
use crate::database::KeyValueStore;
use crate::database::MiningStateStore;
use crate::locks::tokio::AtomicMutex;
use crate::locks::tokio::AtomicRw;
use crate::locks::SingleFlight;
use crate::macros::fn_name;
use crate::macros::log_slow_scope;
use crate::models::clock::Clock;
use crate::models::coins::Coins;
use crate::models::state::accrual::accrue;
use crate::models::state::accrual::AccrualEffect;
use crate::models::state::mining_rate::active_boosts;
use crate::models::state::mining_rate::Boost;
use crate::models::state::mining_rate::prune_expired;
use crate::models::state::mining_rate::RateComposition;
use crate::models::state::mining_rate::Upgrade;
use crate::models::state::mining_state::MiningState;
use crate::models::state::session::Session;
use crate::models::timestamp::Timestamp;
use crate::persistence::PersistOutcome;
use crate::persistence::PersistenceScheduler;
use crate::remote::fetch::update_with_timeout;
use crate::remote::ProfileUpdate;
use crate::remote::RemoteProfileService;

pub use control::ControlError;
pub use control::ControlOutcome;
pub use reconciliation::ReconcileOutcome;
pub use reconciliation::SyncMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another tick was still running.
    Dropped,
    Processed {
        effect: AccrualEffect,
        credited: Coins,
    },
}

#[derive(Debug, Clone)]
pub struct MiningEngine {
    state: AtomicRw<MiningState>,
    rates: AtomicRw<RateComposition>,
    session: AtomicRw<Session>,
    store: MiningStateStore,
    scheduler: AtomicMutex<PersistenceScheduler>,
    remote: Option<Arc<dyn RemoteProfileService>>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    tick_flight: SingleFlight,
    sync_flight: SingleFlight,

    /// Set when a push to the remote failed, so the remote may lag behind
    /// progress made by this process. Cleared on load.
    remote_behind: Arc<AtomicBool>,
}

impl MiningEngine {
    pub fn new(config: EngineConfig, store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: AtomicRw::from((MiningState::default(), "mining_state")),
            rates: AtomicRw::from((RateComposition::default(), "rate_composition")),
            session: AtomicRw::from((Session::Anonymous, "session")),
            store: MiningStateStore::new(store),
            scheduler: AtomicMutex::from((PersistenceScheduler::new(), "persistence")),
            remote: None,
            clock,
            config,
            tick_flight: SingleFlight::default(),
            sync_flight: SingleFlight::default(),
            remote_behind: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Reconcile with, and post session changes to, `remote`.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteProfileService>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &MiningStateStore {
        &self.store
    }

    pub async fn snapshot(&self) -> MiningState {
        self.state.lock(|s| s.clone()).await
    }

    pub async fn session(&self) -> Session {
        self.session.lock(|s| s.clone()).await
    }

    pub async fn rate_composition(&self) -> RateComposition {
        self.rates.lock(|r| r.clone()).await
    }

    /// Replace the live state with the stored record of `session`'s user, or a
    /// fresh one if there is none.
    #[instrument(skip(self))]
    pub async fn load(&self, session: Session) -> MiningState {
        let now = self.clock.now();
        let user_id = session.user_id().map(str::to_owned);
        let stored = self.store.load(user_id.as_deref()).await;

        let mut rates = self.rates.lock_guard_mut().await;
        let mut state = match stored {
            Some(mut state) => {
                // The stored rate includes whatever boosts ran when it was
                // written; keep only its standing part.
                if !state.mining_rate.is_zero() {
                    let boosted = active_boosts(&state.boosts, state.last_saved);
                    rates.reported_rate = Some(state.mining_rate.saturating_sub(boosted));
                }
                if state.user_id.is_none() {
                    state.user_id = user_id;
                }
                state
            }
            None => MiningState::new(
                user_id,
                &self.config.params,
                rates.standing_rate(&self.config.rates),
                now,
            ),
        };
        prune_expired(&mut state.boosts, now);
        state.mining_rate = rates.effective_rate(&self.config.rates, &state.boosts, now);

        // Lock order: rates, state, session.
        let mut live = self.state.lock_guard_mut().await;
        *live = state.clone();
        *self.session.lock_guard_mut().await = session;
        drop(live);
        drop(rates);

        self.scheduler.lock_mut(|s| s.reset()).await;
        self.remote_behind.store(false, Ordering::SeqCst);
        info!(
            "loaded mining state: balance {}, rate {}, active {}",
            state.balance, state.mining_rate, state.mining_active
        );
        state
    }

    /// Switch to `user_id`: flush the current user, load theirs, reconcile.
    #[instrument(skip(self))]
    pub async fn login(&self, user_id: &str) -> ReconcileOutcome {
        self.flush().await;
        self.load(Session::authenticated(user_id)).await;
        self.reconcile(SyncMode::Login).await
    }

    pub async fn logout(&self) {
        self.flush().await;
        self.load(Session::Anonymous).await;
    }

    /// One accrual step at the clock's current time.
    ///
    /// A tick that arrives while another is running is dropped, not queued.
    /// The next tick catches up from absolute timestamps.
    pub async fn tick(&self) -> TickOutcome {
        let Some(_in_flight) = self.tick_flight.try_enter() else {
            debug!("tick dropped: previous tick still in flight");
            return TickOutcome::Dropped;
        };
        log_slow_scope!(fn_name!());

        let now = self.clock.now();
        let user_id = self.state.lock(|s| s.user_id.clone()).await;
        let stored = self.store.stored_balance_at(user_id.as_deref()).await;
        let params = self.config.params;
        let schedule = self.config.rates;

        let (accrual, state) = {
            let rates = self.rates.lock_guard().await;
            let mut state = self.state.lock_guard_mut().await;
            let stored_balance = newer_stored_balance(stored, &state);
            let accrual = accrue(&state, now, stored_balance, &params);
            if accrual.changed_state() {
                *state = accrual.state.clone();
            }
            if prune_expired(&mut state.boosts, now) {
                state.mining_rate = rates.effective_rate(&schedule, &state.boosts, now);
                debug!("boost expired, mining rate now {}", state.mining_rate);
            }
            (accrual, state.clone())
        };

        match accrual.effect {
            AccrualEffect::Completed { cycles } => info!(
                "mining session complete: {cycles} final cycles credited {}, balance {}",
                accrual.credited, state.balance
            ),
            AccrualEffect::Advanced { cycles, kind } if cycles > 0 => debug!(
                "credited {} for {cycles} cycles ({kind}), balance {}",
                accrual.credited, state.balance
            ),
            _ => {}
        }

        self.persist(false).await;

        if let AccrualEffect::Completed { .. } = accrual.effect {
            self.push_remote(ProfileUpdate::mining_fields(&state, now))
                .await;
        } else if !accrual.credited.is_zero() {
            self.push_remote(ProfileUpdate::balance(state.balance, now))
                .await;
        }

        TickOutcome::Processed {
            effect: accrual.effect,
            credited: accrual.credited,
        }
    }

    /// Write the live state if it changed since the last write.
    pub async fn safety_flush(&self) -> PersistOutcome {
        self.persist(false).await
    }

    /// Write the live state unconditionally.
    pub async fn flush(&self) -> PersistOutcome {
        self.persist(true).await
    }

    /// Every write stamps `last_saved` on the live state, so it always tells
    /// when the local record was last written.
    async fn persist(&self, force: bool) -> PersistOutcome {
        let mut scheduler = self.scheduler.lock_guard_mut().await;
        let now = self.clock.now();
        let state = {
            let mut state = self.state.lock_guard_mut().await;
            if force || scheduler.needs_write(&state) {
                state.last_saved = state.last_saved.max(now);
            }
            state.clone()
        };
        scheduler.persist(&self.store, &state, force).await
    }

    /// Add a time-limited bonus to the mining rate. Returns the new rate.
    #[instrument(skip(self))]
    pub async fn activate_boost(&self, amount: Coins, duration: Timestamp) -> Coins {
        let now = self.clock.now();
        let rate = self
            .update_rate(|_, boosts| {
                boosts.push(Boost {
                    amount,
                    end_time: now + duration,
                });
            })
            .await;
        info!("boost of {amount} active until {}", (now + duration).standard_format());
        self.flush().await;
        rate
    }

    pub async fn set_referral_count(&self, referral_count: u32) -> Coins {
        let rate = self
            .update_rate(|rates, _| {
                rates.referral_count = referral_count;
                rates.reported_rate = None;
            })
            .await;
        self.flush().await;
        rate
    }

    pub async fn set_upgrades(&self, upgrades: Vec<Upgrade>) -> Coins {
        let rate = self
            .update_rate(|rates, _| {
                rates.upgrades = upgrades;
                rates.reported_rate = None;
            })
            .await;
        self.flush().await;
        rate
    }

    async fn update_rate<F>(&self, f: F) -> Coins
    where
        F: FnOnce(&mut RateComposition, &mut Vec<Boost>),
    {
        let now = self.clock.now();
        let mut rates = self.rates.lock_guard_mut().await;
        let mut state = self.state.lock_guard_mut().await;
        f(&mut rates, &mut state.boosts);
        prune_expired(&mut state.boosts, now);
        state.mining_rate = rates.effective_rate(&self.config.rates, &state.boosts, now);
        state.mining_rate
    }

    /// Best-effort update of the remote profile of the signed-in user.
    async fn push_remote(&self, update: ProfileUpdate) {
        let Some(remote) = self.remote.as_deref() else {
            return;
        };
        let Some(user_id) = self.session.lock(|s| s.user_id().map(str::to_owned)).await else {
            return;
        };
        match update_with_timeout(remote, &user_id, update, self.config.remote_timeout).await {
            Ok(()) => self.remote_behind.store(false, Ordering::SeqCst),
            Err(e) => {
                warn!("could not update remote profile: {e}");
                self.remote_behind.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Whether the remote may be missing progress made by this process.
    pub fn is_remote_behind(&self) -> bool {
        self.remote_behind.load(Ordering::SeqCst)
    }
}

/// The stored balance, but only if the record on disk was written after the
/// live state was last saved, i.e. by another writer. A balance the live state
/// has since replaced, such as a tampered one, never comes back from disk.
fn newer_stored_balance(stored: Option<(Coins, Timestamp)>, live: &MiningState) -> Option<Coins> {
    stored
        .filter(|&(_, written)| written > live.last_saved)
        .map(|(balance, _)| balance)
}
