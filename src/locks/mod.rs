pub mod single_flight;
pub mod tokio;

pub use single_flight::SingleFlight;
pub use single_flight::SingleFlightGuard;
