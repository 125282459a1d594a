mod common;

use std::sync::Arc;
use std::time::Duration;

use assert2::check;
use assert2::let_assert;
use common::logging::tracing_logger;
use common::Device;
use common::START;
use fcminer_core::database::MiningStateStore;
use fcminer_core::mining_engine::ReconcileOutcome;
use fcminer_core::mining_engine::SyncMode;
use fcminer_core::mining_engine::TickOutcome;
use fcminer_core::mining_loop::MiningLoop;
use fcminer_core::models::coins::Coins;
use fcminer_core::models::state::accrual::AccrualEffect;
use fcminer_core::models::state::accrual::CreditKind;
use fcminer_core::models::state::mining_state::MiningState;
use fcminer_core::models::state::reconcile::Resolution;
use fcminer_core::models::state::session::Session;
use fcminer_core::models::timestamp::Timestamp;
use fcminer_core::remote::ProfileRow;

fn profile(balance: f64, last_saved: Timestamp) -> ProfileRow {
    ProfileRow {
        balance: Some(balance),
        last_saved: Some(last_saved.to_millis() as i64),
        ..Default::default()
    }
}

#[tokio::test]
async fn one_cycle_credits_the_base_rate() {
    let device = Device::new();
    device.engine.load(Session::authenticated("alice")).await;
    device.engine.start_mining().await.unwrap();

    device.clock.advance(Timestamp::seconds(179));
    device.engine.tick().await;
    check!(device.engine.snapshot().await.balance == Coins::ZERO);

    device.clock.advance(Timestamp::seconds(1));
    let_assert!(TickOutcome::Processed { effect, credited } = device.engine.tick().await);
    check!(credited == Coins::from_micro(3_000));
    check!(
        effect
            == AccrualEffect::Advanced {
                cycles: 1,
                kind: CreditKind::Boundary
            }
    );
}

#[tokio::test]
async fn full_session_credits_every_cycle_and_stops() {
    let device = Device::new();
    device.engine.load(Session::authenticated("alice")).await;
    device.engine.start_mining().await.unwrap();

    device.clock.advance(Timestamp::hours(6));
    let_assert!(TickOutcome::Processed { effect, credited } = device.engine.tick().await);
    check!(effect == AccrualEffect::Completed { cycles: 120 });
    check!(credited == Coins::from_micro(360_000));

    let state = device.engine.snapshot().await;
    check!(!state.mining_active);
    check!(state.mining_time == 21_600);
    check!(state.mining_session == Coins::ZERO);

    // The completed session reached the remote too.
    let row = device.remote.row("alice").await.unwrap();
    check!(row.mining_active == Some(false));
    check!(row.balance == Some(0.36));
}

#[tokio::test]
async fn offline_gap_is_caught_up_in_one_step() {
    let device = Device::new();
    device.engine.load(Session::authenticated("alice")).await;
    device.engine.start_mining().await.unwrap();

    device.clock.advance(Timestamp::hours(2) + Timestamp::seconds(100));
    let_assert!(TickOutcome::Processed { effect, credited } = device.engine.tick().await);
    check!(
        effect
            == AccrualEffect::Advanced {
                cycles: 40,
                kind: CreditKind::CatchUp
            }
    );
    check!(credited == Coins::from_micro(120_000));
}

#[tokio::test]
async fn restart_after_session_end_pays_only_outstanding_cycles() {
    tracing_logger();
    let mut device = Device::new();
    device.engine.load(Session::authenticated("alice")).await;
    device.engine.start_mining().await.unwrap();

    device.clock.advance(Timestamp::hours(1));
    device.engine.tick().await;
    check!(device.engine.snapshot().await.balance == Coins::from_micro(60_000));

    // Closed without a flush, reopened three hours after the session ended.
    device.restart();
    device.clock.set(START + Timestamp::hours(9));
    let loaded = device.engine.load(Session::authenticated("alice")).await;
    check!(loaded.mining_active);

    let_assert!(TickOutcome::Processed { effect, .. } = device.engine.tick().await);
    check!(effect == AccrualEffect::Completed { cycles: 100 });

    let state = device.engine.snapshot().await;
    check!(state.balance == Coins::from_micro(360_000));
    check!(!state.mining_active);
    check!(state.mining_time == 21_600);
}

#[tokio::test]
async fn fabricated_local_balance_is_overridden_at_login() {
    tracing_logger();
    let device = Device::new();
    let tampered = MiningState {
        user_id: Some("alice".to_string()),
        balance: Coins::new(2000),
        last_saved: START,
        ..Default::default()
    };
    MiningStateStore::new(Arc::new(device.store.clone()))
        .save(&tampered)
        .await
        .unwrap();
    device
        .remote
        .insert("alice", profile(50.0, START - Timestamp::days(1)))
        .await;

    let outcome = device.engine.login("alice").await;
    check!(
        outcome
            == ReconcileOutcome::Applied {
                resolution: Resolution::AntiCheatOverride,
                balance: Coins::new(50),
            }
    );
    check!(device.engine.store().stored_balance(Some("alice")).await == Some(Coins::new(50)));
}

#[tokio::test]
async fn honest_offline_progress_survives_periodic_sync() {
    let device = Device::new();
    device
        .remote
        .insert("alice", profile(0.0, START - Timestamp::days(1)))
        .await;
    device.engine.login("alice").await;
    device.engine.start_mining().await.unwrap();

    // Remote goes dark while a whole session is mined.
    device.remote.set_online(false).await;
    device.clock.advance(Timestamp::hours(6));
    device.engine.tick().await;
    let mined = device.engine.snapshot().await.balance;
    check!(mined == Coins::from_micro(360_000));

    // The remote still says 0; a periodic sync must not take the coins away.
    check!(device.engine.is_remote_behind());
    device.remote.set_online(true).await;
    check!(device.engine.reconcile(SyncMode::Periodic).await == ReconcileOutcome::Stale);
    check!(device.engine.snapshot().await.balance == mined);
    check!(device.remote.row("alice").await.unwrap().balance == Some(0.36));
}

#[tokio::test]
async fn mining_requires_a_signed_in_user() {
    let device = Device::new();
    device.engine.load(Session::Anonymous).await;
    check!(device.engine.start_mining().await.is_err());
    check!(!device.engine.snapshot().await.mining_active);
}

#[tokio::test(start_paused = true)]
async fn loop_shutdown_leaves_a_loadable_record() {
    let mut device = Device::new();
    device.engine.login("alice").await;
    device.engine.start_mining().await.unwrap();

    let handle = MiningLoop::start(device.engine.clone());
    for _ in 0..3 {
        device.clock.advance(Timestamp::seconds(180));
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    handle.shutdown().await.unwrap();

    device.restart();
    let state = device.engine.load(Session::authenticated("alice")).await;
    check!(state.balance == Coins::from_micro(9_000));
    check!(state.mining_active);
    check!(state.mining_end_time == Some(START + Timestamp::hours(6)));
}
