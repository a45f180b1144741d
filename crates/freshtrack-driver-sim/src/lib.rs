//! Simulated Hardware for freshtrack
//!
//! This crate provides simulated devices so the tracker can run without the
//! sensor board attached. All simulated devices are async-safe (tokio::time, never
//! std::thread::sleep).
//!
//! # Available Simulators
//!
//! - [`SimulatedClimate`] - Bounded random-walk temperature/humidity generator used
//!   by the acquisition task in simulation mode
//! - [`ScriptedLinkOpener`] - Hardware link replaying scripted open failures, hangs,
//!   lines, faults and disconnects for resilience tests
//!
//! # Reproducibility
//!
//! Both simulators accept a seed (via [`SimRng`]) so a test can replay the exact
//! same readings.

pub mod common;
mod climate;
mod scripted_link;

pub use common::SimRng;
pub use climate::{ClimateProfile, SimulatedClimate};
pub use scripted_link::{
    LinkScript, LinkStep, OpenRequest, ScriptedLineSource, ScriptedLinkOpener,
};
