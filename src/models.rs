pub mod clock;
pub mod coins;
pub mod state;
pub mod timestamp;
