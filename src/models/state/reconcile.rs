//! Merging the local record with the authoritative remote profile.

use crate::models::coins::Coins;
use crate::models::state::mining_state::MiningParams;
use crate::models::state::mining_state::MiningState;
use crate::models::timestamp::Timestamp;

/// What the remote profile says about a user. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteProfileSnapshot {
    pub balance: Option<Coins>,
    pub mining_rate: Option<Coins>,
    pub mining_active: Option<bool>,
    pub mining_time: Option<u64>,
    pub mining_period: Option<u64>,
    pub mining_session: Option<Coins>,
    pub mining_end_time: Option<Timestamp>,
    pub last_saved: Option<Timestamp>,
    pub referral_count: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Resolution {
    /// No remote data: local is authoritative.
    LocalOnly,
    /// No local data: remote taken as-is.
    AdoptedRemote,
    /// Local balance looked fabricated; remote balance forced.
    AntiCheatOverride,
    /// Remote was saved after local; remote balance taken.
    RemoteNewer,
    /// Higher of the two balances kept.
    HigherBalance,
}

#[derive(Debug, Clone)]
pub struct Merged {
    pub state: MiningState,
    pub resolution: Resolution,
}

const SUSPICIOUS_MARGIN: Coins = Coins::new(10);
const SUSPICIOUS_LOCAL_FLOOR: Coins = Coins::new(1000);
const SUSPICIOUS_REMOTE_CEILING: Coins = Coins::new(100);

/// True if `local` is implausibly far ahead of `remote`: more than 1.5 times
/// it, more than 10 above it, or above 1000 while remote is below 100.
pub fn is_suspicious(local: Coins, remote: Coins) -> bool {
    let more_than_half_again = u128::from(local.to_micro()) * 2 > u128::from(remote.to_micro()) * 3;
    let beyond_margin = local > remote + SUSPICIOUS_MARGIN;
    let implausible_jump = local > SUSPICIOUS_LOCAL_FLOOR && remote < SUSPICIOUS_REMOTE_CEILING;
    more_than_half_again || beyond_margin || implausible_jump
}

/// Merge the local record with the remote one. `None` only if neither exists.
///
/// Balance is resolved in order: anti-cheat, then the more recently saved
/// side, then the higher balance. The rate prefers remote. The session fields
/// (active flag, end time, countdown) stay local, because the local timer is
/// what drives them.
pub fn merge(
    local: Option<&MiningState>,
    remote: Option<&RemoteProfileSnapshot>,
    params: &MiningParams,
) -> Option<Merged> {
    match (local, remote) {
        (None, None) => None,
        (Some(local), None) => Some(Merged {
            state: local.clone(),
            resolution: Resolution::LocalOnly,
        }),
        (None, Some(remote)) => Some(Merged {
            state: adopt(remote, params),
            resolution: Resolution::AdoptedRemote,
        }),
        (Some(local), Some(remote)) => Some(merge_both(local, remote)),
    }
}

fn merge_both(local: &MiningState, remote: &RemoteProfileSnapshot) -> Merged {
    let remote_saved = remote.last_saved.unwrap_or_default();

    let (balance, resolution) = match remote.balance {
        // A profile that never recorded a balance has nothing to compare.
        None => (local.balance, Resolution::HigherBalance),
        Some(remote_balance) if is_suspicious(local.balance, remote_balance) => {
            (remote_balance, Resolution::AntiCheatOverride)
        }
        Some(remote_balance) if remote_saved > local.last_saved => {
            (remote_balance, Resolution::RemoteNewer)
        }
        Some(remote_balance) => (local.balance.max(remote_balance), Resolution::HigherBalance),
    };

    let state = MiningState {
        balance,
        mining_rate: remote.mining_rate.unwrap_or(local.mining_rate),
        last_saved: local.last_saved.max(remote_saved),
        ..local.clone()
    };
    Merged { state, resolution }
}

fn adopt(remote: &RemoteProfileSnapshot, params: &MiningParams) -> MiningState {
    let period = remote
        .mining_period
        .filter(|&period| MiningParams::is_valid_period(period))
        .unwrap_or(params.period_secs);
    let last_saved = remote.last_saved.unwrap_or_default();
    let mining_active = remote.mining_active.unwrap_or(false);
    let mut state = MiningState {
        user_id: None,
        balance: remote.balance.unwrap_or_default(),
        mining_rate: remote.mining_rate.unwrap_or_default(),
        mining_active,
        mining_period: period,
        mining_time: remote.mining_time.unwrap_or(period),
        mining_end_time: remote.mining_end_time,
        mining_session: remote.mining_session.unwrap_or_default(),
        cycles_credited: 0,
        last_saved,
        accrued_at: last_saved,
        boosts: vec![],
    };
    state.normalize();
    if state.mining_active {
        state.cycles_credited = params.cycles_per_session(period - state.mining_time);
    }
    state
}

#[cfg(test)]
mod test {
    use proptest::prop_assert;
    use proptest::prop_assume;
    use test_strategy::proptest;

    use super::*;

    fn local(balance: Coins, last_saved: Timestamp) -> MiningState {
        MiningState {
            user_id: Some("u1".to_string()),
            balance,
            mining_rate: Coins::from_micro(3_000),
            last_saved,
            ..Default::default()
        }
    }

    fn remote(balance: Coins, last_saved: Timestamp) -> RemoteProfileSnapshot {
        RemoteProfileSnapshot {
            balance: Some(balance),
            last_saved: Some(last_saved),
            ..Default::default()
        }
    }

    #[test]
    fn suspicion_thresholds() {
        // 1.5 times
        assert!(!is_suspicious(Coins::from_micro(15_000_000), Coins::new(10)));
        assert!(is_suspicious(Coins::from_micro(15_000_001), Coins::new(10)));
        // plus ten
        assert!(!is_suspicious(Coins::new(110), Coins::new(100)));
        assert!(is_suspicious(Coins::from_micro(110_000_001), Coins::new(100)));
        // large local, tiny remote
        assert!(is_suspicious(Coins::from_micro(1_000_000_001), Coins::from_micro(99_999_999)));
        assert!(!is_suspicious(Coins::ZERO, Coins::ZERO));
    }

    #[test]
    fn fabricated_local_balance_is_replaced() {
        let merged = merge(
            Some(&local(Coins::new(2000), Timestamp::seconds(100))),
            Some(&remote(Coins::new(50), Timestamp::seconds(1))),
            &MiningParams::default(),
        )
        .unwrap();
        assert_eq!(Resolution::AntiCheatOverride, merged.resolution);
        assert_eq!(Coins::new(50), merged.state.balance);
    }

    #[test]
    fn newer_remote_wins_even_if_lower() {
        let merged = merge(
            Some(&local(Coins::new(12), Timestamp::seconds(100))),
            Some(&remote(Coins::new(11), Timestamp::seconds(200))),
            &MiningParams::default(),
        )
        .unwrap();
        assert_eq!(Resolution::RemoteNewer, merged.resolution);
        assert_eq!(Coins::new(11), merged.state.balance);
        assert_eq!(Timestamp::seconds(200), merged.state.last_saved);
    }

    #[test]
    fn unsynced_local_progress_is_kept() {
        let merged = merge(
            Some(&local(Coins::new(12), Timestamp::seconds(300))),
            Some(&remote(Coins::new(11), Timestamp::seconds(200))),
            &MiningParams::default(),
        )
        .unwrap();
        assert_eq!(Resolution::HigherBalance, merged.resolution);
        assert_eq!(Coins::new(12), merged.state.balance);
        assert_eq!(Timestamp::seconds(300), merged.state.last_saved);
    }

    #[test]
    fn rate_prefers_remote() {
        let mut snapshot = remote(Coins::new(1), Timestamp::seconds(1));
        snapshot.mining_rate = Some(Coins::from_micro(4_100));
        let merged = merge(
            Some(&local(Coins::new(1), Timestamp::seconds(2))),
            Some(&snapshot),
            &MiningParams::default(),
        )
        .unwrap();
        assert_eq!(Coins::from_micro(4_100), merged.state.mining_rate);
    }

    #[test]
    fn missing_sides() {
        let params = MiningParams::default();
        assert!(merge(None, None, &params).is_none());

        let only_local = local(Coins::new(3), Timestamp::seconds(9));
        let merged = merge(Some(&only_local), None, &params).unwrap();
        assert_eq!(Resolution::LocalOnly, merged.resolution);
        assert_eq!(only_local, merged.state);

        let snapshot = RemoteProfileSnapshot {
            balance: Some(Coins::new(7)),
            mining_active: Some(true),
            mining_time: Some(99_999),
            mining_end_time: Some(Timestamp::hours(2)),
            ..Default::default()
        };
        let merged = merge(None, Some(&snapshot), &params).unwrap();
        assert_eq!(Resolution::AdoptedRemote, merged.resolution);
        assert_eq!(Coins::new(7), merged.state.balance);
        assert_eq!(params.period_secs, merged.state.mining_time);
        assert_eq!(0, merged.state.cycles_credited);
    }

    #[test]
    fn adopted_session_does_not_repay_past_cycles() {
        let params = MiningParams::default();
        let snapshot = RemoteProfileSnapshot {
            mining_active: Some(true),
            mining_time: Some(params.period_secs - 600),
            mining_end_time: Some(Timestamp::hours(2)),
            ..Default::default()
        };
        let merged = merge(None, Some(&snapshot), &params).unwrap();
        assert_eq!(3, merged.state.cycles_credited);
    }

    #[test]
    fn adopted_session_with_impossible_length_uses_configured_one() {
        let params = MiningParams::default();
        let snapshot = RemoteProfileSnapshot {
            mining_active: Some(true),
            mining_period: Some(u64::MAX),
            mining_time: Some(u64::MAX),
            last_saved: Some(Timestamp::hours(1)),
            ..Default::default()
        };
        let merged = merge(None, Some(&snapshot), &params).unwrap();
        assert_eq!(params.period_secs, merged.state.mining_period);
        assert_eq!(params.period_secs, merged.state.mining_time);
        assert_eq!(Timestamp::hours(1), merged.state.accrued_at);
    }

    #[proptest]
    fn merge_never_regresses_balance(
        #[strategy(0u64..5_000_000_000)] remote_micro: u64,
        #[strategy(-5_000_000_000i64..10_000_000)] local_offset: i64,
        #[strategy(0u64..1_000_000)] local_saved: u64,
        #[strategy(0u64..1_000_000)] saved_gap: u64,
    ) {
        let local_micro = remote_micro.saturating_add_signed(local_offset);
        let (local_balance, remote_balance) =
            (Coins::from_micro(local_micro), Coins::from_micro(remote_micro));
        prop_assume!(!is_suspicious(local_balance, remote_balance));
        let remote_saved = local_saved.saturating_sub(saved_gap);

        let merged = merge(
            Some(&local(local_balance, Timestamp(local_saved))),
            Some(&remote(remote_balance, Timestamp(remote_saved))),
            &MiningParams::default(),
        )
        .unwrap();
        prop_assert!(merged.state.balance >= local_balance);
    }
}
