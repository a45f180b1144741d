//! Shared infrastructure for the simulated devices.
//!
//! - [`SimRng`]: seeded, thread-safe RNG for reproducible readings

mod rng;

pub use rng::SimRng;
