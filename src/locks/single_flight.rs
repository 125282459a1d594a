use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Admits at most one holder at a time. A caller that finds the slot taken is
/// turned away immediately instead of waiting in line.
///
/// # Example
/// ```
/// # use fcminer_core::locks::SingleFlight;
/// let tick_guard = SingleFlight::default();
/// let first = tick_guard.try_enter();
/// assert!(first.is_some());
/// assert!(tick_guard.try_enter().is_none());
/// drop(first);
/// assert!(tick_guard.try_enter().is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    in_flight: Arc<AtomicBool>,
}

impl SingleFlight {
    /// Returns a guard if nobody holds the slot. The slot is released when the
    /// guard is dropped, including on panic or task cancellation.
    pub fn try_enter(&self) -> Option<SingleFlightGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SingleFlightGuard {
                in_flight: self.in_flight.clone(),
            })
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct SingleFlightGuard {
    in_flight: Arc<AtomicBool>,
}

impl Drop for SingleFlightGuard {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}
