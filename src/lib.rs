//! # FreshTrack
//!
//! Food-inventory tracker for refrigerated storage. Items are registered with a
//! food type; their expiration date is estimated from the food type's shelf life,
//! adjusted for the storage temperature reported by a sensor board (or a
//! simulator), and classified as ok / warning / danger.
//!
//! ## Crate Structure
//!
//! - **`engine`**: the `ExpirationEngine` and the pure expiration arithmetic behind it.
//! - **`acquisition`**: the `SensorAcquisition` state machine, its background task
//!   and the sensor line parser.
//! - **`store`**: in-memory and TOML-file adapters for the store traits.
//! - **`config`**: figment-based configuration (`config/freshtrack.toml` + `FRESHTRACK_*`).
//! - **`logging`**: tracing-subscriber initialization.
//! - **`service`**: the `FreshTrack` service tying everything together.
//!
//! Domain types and store traits live in `freshtrack-core`; simulated hardware in
//! `freshtrack-driver-sim`.

pub mod acquisition;
pub mod config;
pub mod engine;
pub mod logging;
pub mod service;
pub mod store;

pub use acquisition::{AcquiredSample, AcquisitionStatus, SensorAcquisition};
pub use config::FreshConfig;
pub use engine::ExpirationEngine;
pub use service::{FreshTrack, SystemStatus};
