//! Simulated refrigerator climate.
//!
//! Produces temperature/humidity readings as a bounded random walk around a
//! nominal set point:
//! - each step moves by at most `max_step` (temperature) / `humidity_step` (humidity)
//! - a weak pull (`reversion`) keeps the walk centred on the nominal values
//! - a value that leaves its band is reset to the nominal value
//! - readings are rounded to one decimal, like the sensor board reports them
//!
//! # Example
//!
//! ```rust
//! use freshtrack_driver_sim::{ClimateProfile, SimulatedClimate};
//!
//! let climate = SimulatedClimate::new(ClimateProfile::default(), Some(7));
//! let (temperature, humidity) = climate.next_reading();
//! assert!((2.0..=12.0).contains(&temperature));
//! assert!((45.0..=75.0).contains(&humidity));
//! ```

use crate::common::SimRng;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Configuration of the simulated climate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateProfile {
    /// Temperature set point in °C (default: 7.0)
    #[serde(default = "default_nominal_temperature")]
    pub nominal_temperature: f64,
    /// Humidity set point in % (default: 60.0)
    #[serde(default = "default_nominal_humidity")]
    pub nominal_humidity: f64,
    /// Lowest plausible temperature (default: 2.0)
    #[serde(default = "default_temperature_min")]
    pub temperature_min: f64,
    /// Highest plausible temperature (default: 12.0)
    #[serde(default = "default_temperature_max")]
    pub temperature_max: f64,
    /// Lowest plausible humidity (default: 45.0)
    #[serde(default = "default_humidity_min")]
    pub humidity_min: f64,
    /// Highest plausible humidity (default: 75.0)
    #[serde(default = "default_humidity_max")]
    pub humidity_max: f64,
    /// Largest temperature change per reading (default: 0.5)
    #[serde(default = "default_max_step")]
    pub max_step: f64,
    /// Largest humidity change per reading (default: 1.5)
    #[serde(default = "default_humidity_step")]
    pub humidity_step: f64,
    /// Fraction of the distance to nominal recovered per reading (default: 0.1)
    #[serde(default = "default_reversion")]
    pub reversion: f64,
}

fn default_nominal_temperature() -> f64 {
    7.0
}

fn default_nominal_humidity() -> f64 {
    60.0
}

fn default_temperature_min() -> f64 {
    2.0
}

fn default_temperature_max() -> f64 {
    12.0
}

fn default_humidity_min() -> f64 {
    45.0
}

fn default_humidity_max() -> f64 {
    75.0
}

fn default_max_step() -> f64 {
    0.5
}

fn default_humidity_step() -> f64 {
    1.5
}

fn default_reversion() -> f64 {
    0.1
}

impl Default for ClimateProfile {
    fn default() -> Self {
        Self {
            nominal_temperature: default_nominal_temperature(),
            nominal_humidity: default_nominal_humidity(),
            temperature_min: default_temperature_min(),
            temperature_max: default_temperature_max(),
            humidity_min: default_humidity_min(),
            humidity_max: default_humidity_max(),
            max_step: default_max_step(),
            humidity_step: default_humidity_step(),
            reversion: default_reversion(),
        }
    }
}

impl ClimateProfile {
    /// Validate band ordering, set points and step sizes.
    pub fn validate(&self) -> Result<(), String> {
        if self.temperature_min >= self.temperature_max {
            return Err(format!(
                "temperature_min ({}) must be below temperature_max ({})",
                self.temperature_min, self.temperature_max
            ));
        }
        if self.humidity_min >= self.humidity_max {
            return Err(format!(
                "humidity_min ({}) must be below humidity_max ({})",
                self.humidity_min, self.humidity_max
            ));
        }
        if !(self.temperature_min..=self.temperature_max).contains(&self.nominal_temperature) {
            return Err(format!(
                "nominal_temperature {} outside [{}, {}]",
                self.nominal_temperature, self.temperature_min, self.temperature_max
            ));
        }
        if !(self.humidity_min..=self.humidity_max).contains(&self.nominal_humidity) {
            return Err(format!(
                "nominal_humidity {} outside [{}, {}]",
                self.nominal_humidity, self.humidity_min, self.humidity_max
            ));
        }
        if !(self.max_step > 0.0 && self.humidity_step > 0.0) {
            return Err("max_step and humidity_step must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.reversion) {
            return Err(format!("reversion {} must be within [0, 1]", self.reversion));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct WalkState {
    temperature: f64,
    humidity: f64,
}

/// Random-walk temperature/humidity generator.
#[derive(Debug)]
pub struct SimulatedClimate {
    profile: ClimateProfile,
    rng: SimRng,
    state: Mutex<WalkState>,
}

impl SimulatedClimate {
    /// Create a generator starting at the nominal set point.
    pub fn new(profile: ClimateProfile, seed: Option<u64>) -> Self {
        let state = WalkState {
            temperature: profile.nominal_temperature,
            humidity: profile.nominal_humidity,
        };
        Self {
            profile,
            rng: SimRng::new(seed),
            state: Mutex::new(state),
        }
    }

    /// Profile in use.
    pub fn profile(&self) -> &ClimateProfile {
        &self.profile
    }

    /// Advance the walk one step and return `(temperature, humidity)`.
    pub fn next_reading(&self) -> (f64, f64) {
        let p = &self.profile;
        let mut state = self.state.lock();

        state.temperature = walk(
            &self.rng,
            state.temperature,
            p.nominal_temperature,
            p.max_step,
            p.reversion,
            (p.temperature_min, p.temperature_max),
        );
        state.humidity = walk(
            &self.rng,
            state.humidity,
            p.nominal_humidity,
            p.humidity_step,
            p.reversion,
            (p.humidity_min, p.humidity_max),
        );

        let reading = (round_tenth(state.temperature), round_tenth(state.humidity));
        tracing::trace!(temperature = reading.0, humidity = reading.1, "Simulated reading");
        reading
    }
}

fn walk(
    rng: &SimRng,
    current: f64,
    nominal: f64,
    max_step: f64,
    reversion: f64,
    (min, max): (f64, f64),
) -> f64 {
    let step: f64 = rng.gen_range(-max_step..=max_step);
    let next = current + step + (nominal - current) * reversion;
    if next.is_finite() && (min..=max).contains(&next) {
        next
    } else {
        nominal
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
