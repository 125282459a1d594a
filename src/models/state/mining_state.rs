use num_traits::Zero;
use serde::Deserialize;
use serde::Serialize;

use crate::models::coins::Coins;
use crate::models::state::mining_rate::Boost;
use crate::models::timestamp::Timestamp;

/// Fixed shape of a mining session: its total length and the sub-interval
/// after which one reward increment is credited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningParams {
    pub period_secs: u64,
    pub cycle_secs: u64,
}

impl MiningParams {
    pub const DEFAULT_PERIOD_SECS: u64 = 6 * 60 * 60;
    pub const DEFAULT_CYCLE_SECS: u64 = 180;

    /// Longest session a record may describe. Anything longer is corrupt.
    pub const MAX_PERIOD_SECS: u64 = 7 * 24 * 60 * 60;

    pub fn is_valid_period(period_secs: u64) -> bool {
        (1..=Self::MAX_PERIOD_SECS).contains(&period_secs)
    }

    /// Number of whole reward cycles in a session of `period_secs`.
    pub fn cycles_per_session(&self, period_secs: u64) -> u64 {
        period_secs / self.cycle_secs.max(1)
    }
}

impl Default for MiningParams {
    fn default() -> Self {
        Self {
            period_secs: Self::DEFAULT_PERIOD_SECS,
            cycle_secs: Self::DEFAULT_CYCLE_SECS,
        }
    }
}

/// The live mining record of one user. This is exactly what gets written to
/// the local store, in camelCase so records stay readable by older clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MiningState {
    pub user_id: Option<String>,
    pub balance: Coins,
    pub mining_rate: Coins,
    pub mining_active: bool,

    /// Session length in seconds, fixed when the session starts.
    pub mining_period: u64,

    /// Seconds left in the current session, `0..=mining_period`.
    pub mining_time: u64,

    /// Absolute end of the running session. When set, `mining_time` is
    /// derived from it rather than counted down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mining_end_time: Option<Timestamp>,

    /// Reward credited so far in the current session.
    pub mining_session: Coins,

    /// Whole cycles of the current session already added to `balance`.
    pub cycles_credited: u64,

    /// When the record was last written to the local store. Compared with the
    /// remote profile's own stamp on reconciliation.
    pub last_saved: Timestamp,

    /// How far the running session has been accrued. Records written before
    /// this field existed fall back to `last_saved`.
    pub accrued_at: Timestamp,

    /// Time-limited rate bonuses, already included in `mining_rate` while
    /// they run.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub boosts: Vec<Boost>,
}

impl Default for MiningState {
    fn default() -> Self {
        let params = MiningParams::default();
        Self {
            user_id: None,
            balance: Coins::ZERO,
            mining_rate: Coins::ZERO,
            mining_active: false,
            mining_period: params.period_secs,
            mining_time: params.period_secs,
            mining_end_time: None,
            mining_session: Coins::ZERO,
            cycles_credited: 0,
            last_saved: Timestamp::default(),
            accrued_at: Timestamp::default(),
            boosts: vec![],
        }
    }
}

/// The fields whose change makes a state worth writing again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistFingerprint {
    balance: Coins,
    mining_active: bool,
    mining_time: u64,
    mining_session: Coins,
    mining_end_time: Option<Timestamp>,
}

impl MiningState {
    /// Fresh, inactive state for a first launch.
    pub fn new(
        user_id: Option<String>,
        params: &MiningParams,
        mining_rate: Coins,
        now: Timestamp,
    ) -> Self {
        Self {
            user_id,
            mining_rate,
            mining_period: params.period_secs,
            mining_time: params.period_secs,
            last_saved: now,
            accrued_at: now,
            ..Default::default()
        }
    }

    /// Share of the current session that has elapsed, in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        if !self.mining_active || self.mining_period == 0 {
            return 0.0;
        }
        let elapsed = self.mining_period.saturating_sub(self.mining_time);
        elapsed as f64 / self.mining_period as f64
    }

    pub fn fingerprint(&self) -> PersistFingerprint {
        PersistFingerprint {
            balance: self.balance,
            mining_active: self.mining_active,
            mining_time: self.mining_time,
            mining_session: self.mining_session,
            mining_end_time: self.mining_end_time,
        }
    }

    /// Begin a session ending `mining_period` seconds after `now`.
    pub fn begin_session(&mut self, period_secs: u64, now: Timestamp) {
        self.mining_active = true;
        self.mining_period = period_secs;
        self.mining_time = period_secs;
        self.mining_session = Coins::ZERO;
        self.cycles_credited = 0;
        self.mining_end_time = Some(now + Timestamp::seconds(period_secs));
        self.last_saved = now;
        self.accrued_at = now;
    }

    /// Back to idle. Balance is carried forward, everything session-scoped is
    /// zeroed.
    pub fn end_session(&mut self) {
        self.mining_active = false;
        self.mining_time = self.mining_period;
        self.mining_session = Coins::ZERO;
        self.cycles_credited = 0;
        self.mining_end_time = None;
    }

    /// Repair fields a foreign writer may have left out of range.
    pub fn normalize(&mut self) {
        if self.accrued_at.is_zero() {
            self.accrued_at = self.last_saved;
        }
        self.mining_time = self.mining_time.min(self.mining_period);
        if !self.mining_active {
            self.mining_end_time = None;
        }
    }
}
