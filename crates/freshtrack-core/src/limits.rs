//! Shared hard limits and default timings.
//!
//! This module centralizes:
//! - Accepted sensor ranges (samples outside them are discarded)
//! - Default timeouts and delays for the hardware link
//! - Fallback values used before the first real reading arrives

use std::ops::RangeInclusive;
use std::time::Duration;

// =============================================================================
// Sample Ranges
// =============================================================================

/// Accepted temperature range in °C (inclusive).
pub const TEMPERATURE_RANGE: RangeInclusive<f64> = -40.0..=80.0;

/// Accepted relative humidity range in % (inclusive).
pub const HUMIDITY_RANGE: RangeInclusive<f64> = 0.0..=100.0;

// =============================================================================
// Initial Reading
// =============================================================================

/// Temperature published before any sensor or simulator reading.
pub const INITIAL_TEMPERATURE: f64 = 22.0;

/// Humidity published before any sensor or simulator reading.
pub const INITIAL_HUMIDITY: f64 = 60.0;

// =============================================================================
// Timeout Constants
// =============================================================================

/// Bounded wait when opening the hardware channel (5 seconds).
pub const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Delay before retrying a failed open (5 seconds).
pub const RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Delay before reconnecting after a disconnect (5 seconds).
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Simulator sampling period (10 seconds).
pub const SIMULATION_PERIOD: Duration = Duration::from_secs(10);

/// Default serial speed of the sensor board.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Longest line accepted from the sensor board, terminator included.
pub const MAX_LINE_LENGTH: usize = 1024;

/// Default number of entries returned by a history query.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;
