//! Sensor line parsing.
//!
//! The board prints either a JSON object (`{"temperature": 4.2, "humidity": 61}`)
//! or free text such as `Temp: 4.2 C  Hum: 61 %`. JSON is tried first; the text
//! patterns are the fallback. A field missing from a line keeps the previously
//! accepted value.

use freshtrack_core::{AppResult, FreshError};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

/// Values extracted from one line; at least one is present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Temperature in °C, if the line carried one.
    pub temperature: Option<f64>,
    /// Relative humidity in %, if the line carried one.
    pub humidity: Option<f64>,
}

impl Reading {
    /// Complete the reading with previously accepted values.
    pub fn merge(self, previous_temperature: f64, previous_humidity: f64) -> (f64, f64) {
        (
            self.temperature.unwrap_or(previous_temperature),
            self.humidity.unwrap_or(previous_humidity),
        )
    }
}

#[derive(Debug, Deserialize)]
struct StructuredLine {
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    humidity: Option<f64>,
}

fn temperature_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"(?i)temp\w*\s*:\s*(-?\d+(?:\.\d+)?)").unwrap()
    })
}

fn humidity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"(?i)hum\w*\s*:\s*(-?\d+(?:\.\d+)?)").unwrap()
    })
}

fn capture(pattern: &Regex, line: &str) -> Option<f64> {
    pattern
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Parse one line from the board.
///
/// # Errors
///
/// [`FreshError::Parse`] when the line carries neither a temperature nor a humidity.
pub fn parse_line(line: &str) -> AppResult<Reading> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(parse_error(line, "empty line"));
    }

    if trimmed.starts_with('{') {
        if let Ok(structured) = serde_json::from_str::<StructuredLine>(trimmed) {
            if structured.temperature.is_some() || structured.humidity.is_some() {
                return Ok(Reading {
                    temperature: structured.temperature,
                    humidity: structured.humidity,
                });
            }
        }
    }

    let reading = Reading {
        temperature: capture(temperature_pattern(), trimmed),
        humidity: capture(humidity_pattern(), trimmed),
    };
    if reading.temperature.is_none() && reading.humidity.is_none() {
        return Err(parse_error(line, "no temperature or humidity value"));
    }
    Ok(reading)
}

fn parse_error(line: &str, reason: &str) -> FreshError {
    FreshError::Parse {
        line: line.to_string(),
        reason: reason.to_string(),
    }
}
