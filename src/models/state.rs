//! Mining state and the pure rules that move it forward.

pub mod accrual;
pub mod mining_rate;
pub mod mining_state;
pub mod reconcile;
pub mod session;
