// If code coverage tool `cargo-llvm-cov` is running with the nightly toolchain,
// enable the unstable “coverage” attribute. This allows using the annotation
// `#[coverage(off)]` to explicitly exclude test modules from coverage.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config_models;
pub mod database;
pub mod locks;
pub(crate) mod macros;
pub mod mining_engine;
pub mod mining_loop;
pub mod models;
pub mod persistence;
pub mod remote;


use std::env;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use config_models::cli_args;
use tokio::time::Instant;
use tracing::info;
use tracing::warn;

use crate::config_models::data_directory::DataDirectory;
use crate::config_models::engine_config::EngineConfig;
use crate::database::FileStore;
use crate::mining_engine::ControlError;
use crate::mining_engine::MiningEngine;
use crate::mining_loop::MiningLoop;
use crate::models::clock::SystemClock;
use crate::models::state::session::Session;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Seconds a scope may take before `log_slow_scope!` reports it.
const DEFAULT_SLOW_SCOPE_THRESHOLD: f64 = 0.001;

/// Load the local record, run the mining loop and keep it running until
/// Ctrl+C. The state is flushed on the way out.
pub async fn initialize(cli_args: cli_args::Args) -> Result<()> {
    info!("Starting fcminer {VERSION}.");

    let config = EngineConfig::try_from(&cli_args)?;

    let data_directory = DataDirectory::get(cli_args.data_dir.clone())?;
    DataDirectory::create_dir_if_not_exists(&data_directory.root_dir_path())?;
    info!("Data directory is {}", data_directory);

    let store = FileStore::open(data_directory.store_dir_path())
        .await
        .context("Could not open the local store")?;
    let engine = MiningEngine::new(config, Arc::new(store), Arc::new(SystemClock));

    let session = cli_args
        .user_id
        .as_deref()
        .map_or(Session::Anonymous, Session::authenticated);
    engine.load(session).await;

    if cli_args.start {
        match engine.start_mining().await {
            Ok(outcome) => info!("start requested: {outcome}"),
            Err(e @ ControlError::NotAuthenticated) => {
                warn!("not starting a session: {e}. Pass --user-id to mine.");
            }
        }
    }

    let handle = MiningLoop::start(engine.clone());

    tokio::signal::ctrl_c()
        .await
        .context("Could not listen for Ctrl+C")?;
    info!("Detected Ctrl+c signal.");

    handle.shutdown().await?;
    let state = engine.snapshot().await;
    info!(
        "Shut down with balance {}, mining {}",
        state.balance,
        if state.mining_active { "active" } else { "idle" }
    );
    Ok(())
}

/// Logs the time spent in a scope when it is dropped, if that time is at
/// least the threshold.
#[derive(Debug, Clone)]
pub struct ScopeDurationLogger<'a> {
    start: Instant,
    description: &'a str,
    log_slow_fn_threshold: Option<f64>,
    location: &'static std::panic::Location<'static>,
}

impl<'a> ScopeDurationLogger<'a> {
    #[track_caller]
    pub fn new(description: &'a str, log_slow_fn_threshold: Option<f64>) -> Self {
        Self {
            start: Instant::now(),
            description,
            log_slow_fn_threshold,
            location: std::panic::Location::caller(),
        }
    }

    #[track_caller]
    pub fn new_with_threshold(description: &'a str, log_slow_fn_threshold: f64) -> Self {
        Self::new(description, Some(log_slow_fn_threshold))
    }

    /// Threshold from the `LOG_SLOW_SCOPE_THRESHOLD` env var, in seconds.
    #[track_caller]
    pub fn new_default_threshold(description: &'a str) -> Self {
        let threshold = env::var("LOG_SLOW_SCOPE_THRESHOLD")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(DEFAULT_SLOW_SCOPE_THRESHOLD);
        Self::new_with_threshold(description, threshold)
    }

    #[track_caller]
    pub fn new_without_threshold(description: &'a str) -> Self {
        Self::new(description, None)
    }
}

impl Drop for ScopeDurationLogger<'_> {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();

        match self.log_slow_fn_threshold {
            Some(threshold) if duration >= threshold => tracing::debug!(
                "executed {} in {} secs.  exceeds slow fn threshold of {} secs.  location: {}",
                self.description,
                duration,
                threshold,
                self.location,
            ),
            Some(_) => {}
            None => tracing::debug!(
                "executed {} in {} secs.  location: {}",
                self.description,
                duration,
                self.location,
            ),
        }
    }
}
