//! The driver loop: runs the accrual tick, the safety flush and periodic
//! reconciliation on their own timers until told to stop.

use std::time::Duration;

use tokio::select;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::task::JoinHandle;
use tokio::time;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;

use crate::macros::fn_name;
use crate::macros::log_slow_scope;
use crate::mining_engine::MiningEngine;
use crate::mining_engine::SyncMode;

const COMMAND_CHANNEL_CAPACITY: usize = 4;

/// Grace period for in-flight tick and sync tasks at shutdown.
const TASK_GRACE_PERIOD: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCommand {
    Shutdown,
}

#[derive(Debug)]
pub struct MiningLoop {
    engine: MiningEngine,
    command_rx: mpsc::Receiver<LoopCommand>,
    task_handles: Vec<JoinHandle<()>>,
}

/// Owner side of a running [`MiningLoop`]. Dropping it stops the loop too.
#[derive(Debug)]
pub struct MiningLoopHandle {
    command_tx: mpsc::Sender<LoopCommand>,
    join_handle: JoinHandle<()>,
}

impl MiningLoopHandle {
    /// Stop the loop and wait until the final flush has been written.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        // A closed channel means the loop is already on its way out.
        let _ = self.command_tx.send(LoopCommand::Shutdown).await;
        self.join_handle.await
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }
}

impl MiningLoop {
    /// Spawn the loop for `engine` onto the current runtime.
    pub fn start(engine: MiningEngine) -> MiningLoopHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let mining_loop = Self {
            engine,
            command_rx,
            task_handles: vec![],
        };
        let join_handle = tokio::spawn(mining_loop.run());
        MiningLoopHandle {
            command_tx,
            join_handle,
        }
    }

    async fn run(mut self) {
        let config = *self.engine.config();

        // The first tick runs right away so a restart catches up immediately.
        let tick_timer = time::sleep(Duration::ZERO);
        tokio::pin!(tick_timer);

        let flush_timer = time::sleep(config.flush_interval);
        tokio::pin!(flush_timer);

        let sync_timer = time::sleep(config.sync_interval);
        tokio::pin!(sync_timer);

        info!(
            "mining loop started: tick every {}, flush every {}, sync every {}",
            humantime::format_duration(config.tick_interval),
            humantime::format_duration(config.flush_interval),
            humantime::format_duration(config.sync_interval),
        );

        loop {
            select! {
                command = self.command_rx.recv() => {
                    match command {
                        Some(LoopCommand::Shutdown) => info!("mining loop received shutdown"),
                        None => info!("mining loop handle dropped"),
                    }
                    break;
                }

                _ = &mut tick_timer => {
                    // Overlapping ticks are dropped by the engine itself.
                    let engine = self.engine.clone();
                    self.spawn_task(async move {
                        engine.tick().await;
                    });
                    tick_timer.as_mut().reset(Instant::now() + config.tick_interval);
                }

                _ = &mut flush_timer => {
                    log_slow_scope!(fn_name!() + "::select::flush_timer");
                    self.engine.safety_flush().await;
                    flush_timer.as_mut().reset(Instant::now() + config.flush_interval);
                }

                _ = &mut sync_timer => {
                    debug!("Timer: remote reconciliation");
                    let engine = self.engine.clone();
                    self.spawn_task(async move {
                        engine.reconcile(SyncMode::Periodic).await;
                    });
                    sync_timer.as_mut().reset(Instant::now() + config.sync_interval);
                }
            }
        }

        self.graceful_shutdown().await;
    }

    fn spawn_task(&mut self, task: impl std::future::Future<Output = ()> + Send + 'static) {
        self.task_handles.retain(|handle| !handle.is_finished());
        self.task_handles.push(tokio::spawn(task));
    }

    async fn graceful_shutdown(self) {
        info!("mining loop shutting down");

        let Self {
            engine,
            task_handles,
            ..
        } = self;

        // Let running ticks finish; they only ever move the state forward.
        let pending = futures::future::join_all(task_handles);
        if time::timeout(TASK_GRACE_PERIOD, pending).await.is_err() {
            debug!("abandoning tasks still running after {TASK_GRACE_PERIOD:?}");
        }

        let outcome = engine.flush().await;
        info!("final flush: {outcome}");
    }
}
