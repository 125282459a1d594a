#![allow(dead_code)]

pub mod logging;

use std::sync::Arc;

use fcminer_core::config_models::engine_config::EngineConfig;
use fcminer_core::database::MemoryStore;
use fcminer_core::mining_engine::MiningEngine;
use fcminer_core::models::clock::MockClock;
use fcminer_core::models::timestamp::Timestamp;
use fcminer_core::remote::memory::MemoryProfileService;

pub const START: Timestamp = Timestamp::seconds(1_700_000_000);

/// One simulated device: a store and a remote that outlive the engine, so a
/// process restart is just a new engine over the same parts.
pub struct Device {
    pub engine: MiningEngine,
    pub clock: MockClock,
    pub store: MemoryStore,
    pub remote: MemoryProfileService,
}

impl Device {
    pub fn new() -> Self {
        let clock = MockClock::new(START);
        let store = MemoryStore::new();
        let remote = MemoryProfileService::default();
        let engine = Self::engine(&clock, &store, &remote);
        Self {
            engine,
            clock,
            store,
            remote,
        }
    }

    fn engine(clock: &MockClock, store: &MemoryStore, remote: &MemoryProfileService) -> MiningEngine {
        MiningEngine::new(
            EngineConfig::default(),
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
        )
        .with_remote(Arc::new(remote.clone()))
    }

    /// Drop the running engine without a final flush and start a new one.
    pub fn restart(&mut self) {
        self.engine = Self::engine(&self.clock, &self.store, &self.remote);
    }
}
