use serde::Deserialize;
use serde::Serialize;

use crate::models::coins::Coins;
use crate::models::timestamp::Timestamp;

/// The rate every user starts from, plus how much referrals add to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateSchedule {
    pub base: Coins,
    pub referral_bonus: Coins,
    pub referral_bonus_cap: Coins,
}

impl Default for RateSchedule {
    fn default() -> Self {
        Self {
            base: Coins::from_micro(3_000),
            referral_bonus: Coins::from_micro(100),
            referral_bonus_cap: Coins::from_micro(1_000),
        }
    }
}

/// A purchased upgrade and the rate it adds at its current level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upgrade {
    pub id: String,
    pub level: u32,
    pub rate_bonus: Coins,
}

/// Time-limited additive rate bonus, active while `now < end_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boost {
    pub amount: Coins,
    pub end_time: Timestamp,
}

impl Boost {
    pub const DEFAULT_AMOUNT: Coins = Coins::from_micro(5_000);
    pub const DEFAULT_DURATION: Timestamp = Timestamp::hours(1);

    pub fn is_active(&self, now: Timestamp) -> bool {
        now < self.end_time
    }
}

/// Sum of the boosts in `boosts` still running at `now`.
pub fn active_boosts(boosts: &[Boost], now: Timestamp) -> Coins {
    boosts
        .iter()
        .filter(|b| b.is_active(now))
        .map(|b| b.amount)
        .sum()
}

/// Drop boosts that ran out. Returns true if any were dropped.
pub fn prune_expired(boosts: &mut Vec<Boost>, now: Timestamp) -> bool {
    let before = boosts.len();
    boosts.retain(|b| b.is_active(now));
    boosts.len() != before
}

/// What the rate is built from, apart from boosts (which travel with the
/// mining record).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateComposition {
    pub referral_count: u32,
    pub upgrades: Vec<Upgrade>,

    /// Rate last reported by the remote profile or found in the stored
    /// record. It already includes referrals and upgrades and takes their
    /// place until either changes locally.
    pub reported_rate: Option<Coins>,
}

impl RateComposition {
    fn referral_part(&self, schedule: &RateSchedule) -> Coins {
        schedule
            .referral_bonus
            .scalar_mul(u64::from(self.referral_count))
            .min(schedule.referral_bonus_cap)
    }

    fn upgrade_part(&self) -> Coins {
        self.upgrades.iter().map(|u| u.rate_bonus).sum()
    }

    /// The rate without boosts.
    pub fn standing_rate(&self, schedule: &RateSchedule) -> Coins {
        self.reported_rate.unwrap_or_else(|| {
            schedule.base + self.referral_part(schedule) + self.upgrade_part()
        })
    }

    pub fn effective_rate(&self, schedule: &RateSchedule, boosts: &[Boost], now: Timestamp) -> Coins {
        self.standing_rate(schedule) + active_boosts(boosts, now)
    }
}
