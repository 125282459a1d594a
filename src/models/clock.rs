use std::fmt::Debug;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::timestamp::Timestamp;

/// Source of wall-clock time for everything that accrues or persists.
///
/// Injected so tests can drive hours of mining without waiting for them.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct MockClock(Arc<AtomicU64>);

impl MockClock {
    pub fn new(start: Timestamp) -> Self {
        Self(Arc::new(AtomicU64::new(start.to_millis())))
    }

    pub fn set(&self, now: Timestamp) {
        self.0.store(now.to_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Timestamp) {
        self.0.fetch_add(by.to_millis(), Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now(&self) -> Timestamp {
        Timestamp::millis(self.0.load(Ordering::SeqCst))
    }
}
