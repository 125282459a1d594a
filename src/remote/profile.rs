use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::models::coins::Coins;
use crate::models::state::mining_state::MiningParams;
use crate::models::state::mining_state::MiningState;
use crate::models::state::reconcile::RemoteProfileSnapshot;
use crate::models::timestamp::Timestamp;

/// A row of the remote `profiles` table, as it comes over the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileRow {
    pub balance: Option<f64>,
    pub mining_rate: Option<f64>,
    pub mining_active: Option<bool>,
    pub mining_time: Option<i64>,
    pub mining_period: Option<i64>,
    pub mining_session: Option<f64>,
    pub mining_start_time: Option<i64>,
    pub mining_end_time: Option<i64>,
    pub progress: Option<f64>,
    pub last_saved: Option<i64>,
    pub referral_count: Option<i64>,
}

fn amount(field: &str, value: Option<f64>) -> Option<Coins> {
    let value = value?;
    match Coins::try_from(value) {
        Ok(coins) => Some(coins),
        Err(e) => {
            warn!("ignoring remote {field} {value}: {e}");
            None
        }
    }
}

fn non_negative(value: Option<i64>) -> Option<u64> {
    value.and_then(|v| u64::try_from(v).ok())
}

impl From<&ProfileRow> for RemoteProfileSnapshot {
    fn from(row: &ProfileRow) -> Self {
        Self {
            balance: amount("balance", row.balance),
            mining_rate: amount("mining_rate", row.mining_rate),
            mining_active: row.mining_active,
            mining_time: non_negative(row.mining_time),
            mining_period: non_negative(row.mining_period)
                .filter(|&period| MiningParams::is_valid_period(period)),
            mining_session: amount("mining_session", row.mining_session),
            mining_end_time: non_negative(row.mining_end_time).map(Timestamp),
            last_saved: non_negative(row.last_saved).map(Timestamp),
            referral_count: row
                .referral_count
                .and_then(|c| u32::try_from(c).ok()),
        }
    }
}

impl From<ProfileRow> for RemoteProfileSnapshot {
    fn from(row: ProfileRow) -> Self {
        Self::from(&row)
    }
}

/// Partial update of a profile row. Fields left `None` are not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mining_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mining_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mining_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mining_period: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mining_session: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mining_start_time: Option<i64>,

    /// `Some(None)` clears the end time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mining_end_time: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_saved: Option<i64>,
}

fn wire_time(t: Timestamp) -> i64 {
    i64::try_from(t.to_millis()).unwrap_or(i64::MAX)
}

fn wire_secs(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}

impl ProfileUpdate {
    /// Only the balance, stamped with `now`.
    pub fn balance(balance: Coins, now: Timestamp) -> Self {
        Self {
            balance: Some(balance.to_f64()),
            last_saved: Some(wire_time(now)),
            ..Default::default()
        }
    }

    /// The session fields of `state`, as sent when mining starts or stops.
    pub fn mining_fields(state: &MiningState, now: Timestamp) -> Self {
        let start_time = state
            .mining_end_time
            .map(|end| wire_time(end - Timestamp::seconds(state.mining_period)));
        Self {
            balance: Some(state.balance.to_f64()),
            mining_active: Some(state.mining_active),
            mining_time: Some(wire_secs(state.mining_time)),
            mining_period: Some(wire_secs(state.mining_period)),
            mining_session: Some(state.mining_session.to_f64()),
            mining_start_time: start_time,
            mining_end_time: Some(state.mining_end_time.map(wire_time)),
            progress: Some(state.progress()),
            last_saved: Some(wire_time(now)),
            ..Default::default()
        }
    }

    /// Write the set fields into `row`.
    pub fn apply_to(&self, row: &mut ProfileRow) {
        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(value) = self.$field { row.$field = Some(value); })*
            };
        }
        set!(
            balance,
            mining_rate,
            mining_active,
            mining_time,
            mining_period,
            mining_session,
            mining_start_time,
            progress,
            last_saved
        );
        if let Some(end_time) = self.mining_end_time {
            row.mining_end_time = end_time;
        }
    }
}
