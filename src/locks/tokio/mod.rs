//! Provides simplified tokio lock types for sharing data between tasks

mod atomic_mutex;
mod atomic_rw;

pub use atomic_mutex::AtomicMutex;
pub use atomic_rw::AtomicRw;

/// Indicates how a lock was acquired.
#[derive(Debug, Clone, Copy, strum::Display)]
pub enum LockAcquisition {
    Read,
    Write,
}
