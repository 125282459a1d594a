//! Pure accrual step: `(previous state, now) -> (next state, credited reward)`.
//!
//! Rewards are only ever credited in whole cycles. Each session keeps a
//! ledger of how many of its cycles were already paid out
//! (`cycles_credited`), and every step pays exactly the cycles that became
//! due since. A step can therefore be repeated, skipped or delayed by hours
//! without paying a cycle twice or losing one.

use crate::models::coins::Coins;
use crate::models::state::mining_state::MiningParams;
use crate::models::state::mining_state::MiningState;
use crate::models::timestamp::Timestamp;

/// How a step credited its reward, if it credited one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum CreditKind {
    /// Less than one cycle since the previous step, no boundary crossed.
    None,
    /// A cycle boundary was crossed in the normal cadence.
    Boundary,
    /// A cycle or more elapsed since the previous step, e.g. after the process
    /// was suspended. All due cycles are paid in one batch.
    CatchUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccrualEffect {
    Inactive,

    /// Less than a whole second since the last step.
    NoTimeElapsed,

    Advanced { cycles: u64, kind: CreditKind },

    /// The session ran out. Remaining due cycles were paid and the state
    /// reset to idle.
    Completed { cycles: u64 },
}

#[derive(Debug, Clone)]
pub struct Accrual {
    pub state: MiningState,
    pub credited: Coins,
    pub effect: AccrualEffect,
}

impl Accrual {
    fn unchanged(previous: &MiningState, effect: AccrualEffect) -> Self {
        Self {
            state: previous.clone(),
            credited: Coins::ZERO,
            effect,
        }
    }

    pub fn changed_state(&self) -> bool {
        matches!(
            self.effect,
            AccrualEffect::Advanced { .. } | AccrualEffect::Completed { .. }
        )
    }
}

/// Advance `previous` to `now`.
///
/// `stored_balance` is the balance currently in the local store. When
/// anything is credited, the larger of it and the in-memory balance is used as
/// the base, so a concurrent writer's newer value is never clobbered.
pub fn accrue(
    previous: &MiningState,
    now: Timestamp,
    stored_balance: Option<Coins>,
    params: &MiningParams,
) -> Accrual {
    if !previous.mining_active {
        return Accrual::unchanged(previous, AccrualEffect::Inactive);
    }

    match previous.mining_end_time {
        Some(end_time) => accrue_until_end_time(previous, end_time, now, stored_balance, params),
        None => accrue_by_countdown(previous, now, stored_balance, params),
    }
}

fn accrue_until_end_time(
    previous: &MiningState,
    end_time: Timestamp,
    now: Timestamp,
    stored_balance: Option<Coins>,
    params: &MiningParams,
) -> Accrual {
    let period = previous.mining_period;
    let remaining = end_time
        .whole_seconds_since(now)
        .min(period);

    if remaining == 0 {
        return complete(previous, now, stored_balance, params);
    }

    let elapsed = now.whole_seconds_since(previous.accrued_at);
    if elapsed == 0 {
        return Accrual::unchanged(previous, AccrualEffect::NoTimeElapsed);
    }

    // Counted in milliseconds, so a boundary is never reported early because
    // `remaining` was rounded down.
    let session_elapsed_ms =
        Timestamp::seconds(period).to_millis().saturating_sub((end_time - now).to_millis());
    let cycles_due = (session_elapsed_ms / Timestamp::seconds(params.cycle_secs.max(1)).to_millis())
        .min(params.cycles_per_session(period));

    let mut next = previous.clone();
    next.mining_time = remaining;
    next.accrued_at = previous.accrued_at + Timestamp::seconds(elapsed);
    credit_due(next, cycles_due, elapsed, stored_balance, params)
}

/// Degraded mode for records without an absolute end time: count down by the
/// whole seconds elapsed since the last step.
fn accrue_by_countdown(
    previous: &MiningState,
    now: Timestamp,
    stored_balance: Option<Coins>,
    params: &MiningParams,
) -> Accrual {
    let elapsed = now.whole_seconds_since(previous.accrued_at);
    if elapsed == 0 {
        return Accrual::unchanged(previous, AccrualEffect::NoTimeElapsed);
    }

    let remaining = previous.mining_time.saturating_sub(elapsed);
    if remaining == 0 {
        return complete(previous, now, stored_balance, params);
    }

    let period = previous.mining_period;
    let cycles_due = params.cycles_per_session(period.saturating_sub(remaining));

    let mut next = previous.clone();
    next.mining_time = remaining;
    next.accrued_at = previous.accrued_at + Timestamp::seconds(elapsed);
    credit_due(next, cycles_due, elapsed, stored_balance, params)
}

fn credit_due(
    mut next: MiningState,
    cycles_due: u64,
    elapsed_secs: u64,
    stored_balance: Option<Coins>,
    params: &MiningParams,
) -> Accrual {
    let cycles = cycles_due.saturating_sub(next.cycles_credited);
    let kind = if cycles == 0 {
        CreditKind::None
    } else if elapsed_secs >= params.cycle_secs {
        CreditKind::CatchUp
    } else {
        CreditKind::Boundary
    };

    let credited = pay(&mut next, cycles, stored_balance);
    Accrual {
        state: next,
        credited,
        effect: AccrualEffect::Advanced { cycles, kind },
    }
}

fn complete(
    previous: &MiningState,
    now: Timestamp,
    stored_balance: Option<Coins>,
    params: &MiningParams,
) -> Accrual {
    let mut next = previous.clone();
    let cycles = params
        .cycles_per_session(previous.mining_period)
        .saturating_sub(previous.cycles_credited);
    let credited = pay(&mut next, cycles, stored_balance);

    next.end_session();
    next.accrued_at = now;
    Accrual {
        state: next,
        credited,
        effect: AccrualEffect::Completed { cycles },
    }
}

fn pay(state: &mut MiningState, cycles: u64, stored_balance: Option<Coins>) -> Coins {
    if cycles == 0 {
        return Coins::ZERO;
    }
    let reward = state.mining_rate.scalar_mul(cycles);
    let base = stored_balance.map_or(state.balance, |stored| stored.max(state.balance));
    state.balance = base + reward;
    state.mining_session += reward;
    state.cycles_credited += cycles;
    reward
}

#[cfg(test)]
mod test {
    use proptest::collection::vec;
    use proptest::prop_assert;
    use proptest::prop_assert_eq;
    use test_strategy::proptest;

    use super::*;

    const RATE: Coins = Coins::from_micro(3_000);

    fn params() -> MiningParams {
        MiningParams::default()
    }

    fn started_at(start: Timestamp) -> MiningState {
        let mut state = MiningState::new(None, &params(), RATE, start);
        state.begin_session(params().period_secs, start);
        state
    }

    fn run(mut state: MiningState, times: &[Timestamp]) -> (MiningState, Coins) {
        let mut total = Coins::ZERO;
        for now in times {
            let step = accrue(&state, *now, None, &params());
            total += step.credited;
            state = step.state;
        }
        (state, total)
    }

    #[test]
    fn inactive_state_is_left_alone() {
        let state = MiningState::new(None, &params(), RATE, Timestamp::seconds(0));
        let step = accrue(&state, Timestamp::hours(5), None, &params());
        assert_eq!(AccrualEffect::Inactive, step.effect);
        assert_eq!(state, step.state);
    }

    #[test]
    fn sub_second_ticks_are_no_ops() {
        let start = Timestamp::seconds(1_000);
        let state = started_at(start);
        let step = accrue(&state, start + Timestamp::millis(999), None, &params());
        assert_eq!(AccrualEffect::NoTimeElapsed, step.effect);
        assert_eq!(state, step.state);
    }

    #[test]
    fn one_cycle_credits_one_rate_increment() {
        let start = Timestamp::seconds(1_000);
        let ticks: Vec<_> = (1..=180).map(|s| start + Timestamp::seconds(s)).collect();
        let (state, total) = run(started_at(start), &ticks);
        assert_eq!(RATE, total);
        assert_eq!(RATE, state.balance);
        assert_eq!(RATE, state.mining_session);
        assert_eq!(21_600 - 180, state.mining_time);
    }

    #[test]
    fn boundary_is_not_credited_early() {
        let start = Timestamp::seconds(1_000);
        let state = started_at(start);
        let step = accrue(&state, start + Timestamp::millis(179_500), None, &params());
        assert_eq!(Coins::ZERO, step.credited);

        let step = accrue(&step.state, start + Timestamp::seconds(180), None, &params());
        assert_eq!(
            AccrualEffect::Advanced {
                cycles: 1,
                kind: CreditKind::Boundary
            },
            step.effect
        );
    }

    #[test]
    fn long_absence_is_batch_credited() {
        let start = Timestamp::seconds(1_000);
        let step = accrue(
            &started_at(start),
            start + Timestamp::seconds(180 * 7 + 90),
            None,
            &params(),
        );
        assert_eq!(
            AccrualEffect::Advanced {
                cycles: 7,
                kind: CreditKind::CatchUp
            },
            step.effect
        );
        assert_eq!(RATE.scalar_mul(7), step.credited);
    }

    #[test]
    fn completion_pays_only_outstanding_cycles() {
        let start = Timestamp::seconds(1_000);
        let (halfway, _) = run(started_at(start), &[start + Timestamp::hours(3)]);
        assert_eq!(60, halfway.cycles_credited);

        let step = accrue(&halfway, start + Timestamp::hours(9), None, &params());
        assert_eq!(AccrualEffect::Completed { cycles: 60 }, step.effect);
        assert_eq!(Coins::from_micro(360_000), step.state.balance);
        assert!(!step.state.mining_active);
        assert_eq!(21_600, step.state.mining_time);
        assert_eq!(Coins::ZERO, step.state.mining_session);
        assert_eq!(None, step.state.mining_end_time);
    }

    #[test]
    fn stored_balance_is_used_as_credit_base() {
        let start = Timestamp::seconds(1_000);
        let state = started_at(start);
        let step = accrue(
            &state,
            start + Timestamp::seconds(180),
            Some(Coins::new(5)),
            &params(),
        );
        assert_eq!(Coins::new(5) + RATE, step.state.balance);

        // Nothing credited, nothing merged.
        let step = accrue(
            &state,
            start + Timestamp::seconds(10),
            Some(Coins::new(5)),
            &params(),
        );
        assert_eq!(Coins::ZERO, step.state.balance);
    }

    #[test]
    fn countdown_mode_uses_same_crediting() {
        let start = Timestamp::seconds(1_000);
        let mut state = started_at(start);
        state.mining_end_time = None;

        let step = accrue(&state, start + Timestamp::seconds(180 * 10), None, &params());
        assert_eq!(RATE.scalar_mul(10), step.credited);
        assert_eq!(21_600 - 1_800, step.state.mining_time);

        let step = accrue(&step.state, start + Timestamp::hours(7), None, &params());
        assert_eq!(AccrualEffect::Completed { cycles: 110 }, step.effect);
        assert_eq!(Coins::from_micro(360_000), step.state.balance);
    }

    #[test]
    fn clock_stepping_backwards_credits_nothing() {
        let start = Timestamp::seconds(10_000);
        let (state, _) = run(started_at(start), &[start + Timestamp::seconds(400)]);
        let step = accrue(&state, start, None, &params());
        assert_eq!(AccrualEffect::NoTimeElapsed, step.effect);
        assert_eq!(state.balance, step.state.balance);
    }

    #[proptest]
    fn balance_never_decreases(
        #[strategy(vec(0u64..2_000_000, 1..40))] steps_ms: Vec<u64>,
        #[strategy(0u64..1_000_000_000)] initial_micro: u64,
    ) {
        let start = Timestamp::seconds(1_000);
        let mut state = started_at(start);
        state.balance = Coins::from_micro(initial_micro);
        let mut now = start;
        for step_ms in steps_ms {
            now = now + Timestamp::millis(step_ms);
            let next = accrue(&state, now, None, &params()).state;
            prop_assert!(next.balance >= state.balance);
            state = next;
        }
    }

    #[proptest]
    fn repeated_ticks_after_restart_do_not_double_credit(
        #[strategy(1u64..21_600_000)] offset_ms: u64,
        #[strategy(1usize..10)] extra_ticks: usize,
    ) {
        let start = Timestamp::seconds(1_000);
        let reloaded = started_at(start);
        let now = start + Timestamp::millis(offset_ms);

        let once = accrue(&reloaded, now, None, &params()).state;
        let mut repeated = once.clone();
        for _ in 0..extra_ticks {
            repeated = accrue(&repeated, now, None, &params()).state;
        }
        prop_assert_eq!(once, repeated);
    }

    #[proptest]
    fn k_cycles_credit_k_increments(#[strategy(proptest::sample::select(vec![0u64, 1, 2, 10]))] k: u64) {
        let start = Timestamp::seconds(1_000);
        let now = start + Timestamp::seconds(k * params().cycle_secs);
        let step = accrue(&started_at(start), now, None, &params());
        prop_assert_eq!(RATE.scalar_mul(k), step.state.balance);
    }
}
