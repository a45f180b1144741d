//! Temperature/humidity samples and the shared "latest sample" cell.
//!
//! A [`TemperatureSample`] is immutable once created. The acquisition task is the
//! only writer of [`LatestSample`]; readers always observe a complete sample because
//! the cell swaps `Arc`s through a `tokio::sync::watch` channel.

use crate::error::{AppResult, FreshError};
use crate::limits::{HUMIDITY_RANGE, INITIAL_HUMIDITY, INITIAL_TEMPERATURE, TEMPERATURE_RANGE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Origin of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleSource {
    /// Read from the hardware link.
    Sensor,
    /// Generated by the simulator.
    Simulation,
    /// Placeholder published before any reading.
    Initial,
}

impl std::fmt::Display for SampleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SampleSource::Sensor => "sensor",
            SampleSource::Simulation => "simulation",
            SampleSource::Initial => "initial",
        };
        write!(f, "{}", label)
    }
}

/// A single temperature/humidity reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSample {
    /// Temperature in °C.
    pub temperature: f64,
    /// Relative humidity in %.
    pub humidity: f64,
    /// Where the reading came from.
    pub source: SampleSource,
    /// Acquisition time.
    pub timestamp: DateTime<Utc>,
}

impl TemperatureSample {
    /// Create a sample after checking both values against the accepted ranges.
    ///
    /// # Errors
    ///
    /// Returns [`FreshError::OutOfRangeSample`] when temperature is outside
    /// `[-40, 80]` °C or humidity outside `[0, 100]` %. NaN is always rejected.
    pub fn validated(
        temperature: f64,
        humidity: f64,
        source: SampleSource,
        timestamp: DateTime<Utc>,
    ) -> AppResult<Self> {
        check_range("temperature", temperature, &TEMPERATURE_RANGE)?;
        check_range("humidity", humidity, &HUMIDITY_RANGE)?;
        Ok(Self {
            temperature,
            humidity,
            source,
            timestamp,
        })
    }

    /// The placeholder sample published at startup.
    pub fn initial() -> Self {
        Self {
            temperature: INITIAL_TEMPERATURE,
            humidity: INITIAL_HUMIDITY,
            source: SampleSource::Initial,
            timestamp: Utc::now(),
        }
    }
}

fn check_range(
    quantity: &'static str,
    value: f64,
    range: &std::ops::RangeInclusive<f64>,
) -> AppResult<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(FreshError::OutOfRangeSample {
            quantity,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

/// Single-writer / multi-reader cell holding the most recent accepted sample.
///
/// Cloning the cell is cheap and every clone observes the same value. Created once
/// at process start and handed to every component that needs the current reading.
#[derive(Clone)]
pub struct LatestSample {
    sender: Arc<watch::Sender<Arc<TemperatureSample>>>,
}

impl LatestSample {
    /// Create a cell seeded with [`TemperatureSample::initial`].
    pub fn new() -> Self {
        Self::with_initial(TemperatureSample::initial())
    }

    /// Create a cell seeded with a specific sample.
    pub fn with_initial(sample: TemperatureSample) -> Self {
        let (sender, _) = watch::channel(Arc::new(sample));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Current sample (cheap `Arc` clone).
    pub fn get(&self) -> Arc<TemperatureSample> {
        self.sender.borrow().clone()
    }

    /// Replace the current sample, waking every subscriber.
    pub fn publish(&self, sample: Arc<TemperatureSample>) {
        self.sender.send_replace(sample);
    }

    /// Subscribe to replacements.
    pub fn subscribe(&self) -> watch::Receiver<Arc<TemperatureSample>> {
        self.sender.subscribe()
    }
}

impl Default for LatestSample {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LatestSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatestSample")
            .field("current", &*self.get())
            .finish()
    }
}
