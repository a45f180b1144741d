//! Temperature alert classification.
//!
//! Pure classification exposed to the notification collaborator. Suppression of
//! repeated alerts is the collaborator's business, not ours.

use serde::{Deserialize, Serialize};

/// Alert boundaries in °C, independent of the expiration thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// At or above this temperature a warning is raised.
    pub warning_temp: f64,
    /// At or above this temperature a critical alert is raised.
    pub critical_temp: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            warning_temp: 25.0,
            critical_temp: 28.0,
        }
    }
}

/// Result of [`check_temperature_alert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// Below the warning temperature.
    None,
    /// `warning_temp <= t < critical_temp`.
    Warning,
    /// `t >= critical_temp`.
    Critical,
}

/// Classify a temperature against the alert thresholds.
pub fn check_temperature_alert(temperature: f64, thresholds: &AlertThresholds) -> AlertLevel {
    if temperature >= thresholds.critical_temp {
        AlertLevel::Critical
    } else if temperature >= thresholds.warning_temp {
        AlertLevel::Warning
    } else {
        AlertLevel::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_boundaries() {
        let thresholds = AlertThresholds::default();
        assert_eq!(check_temperature_alert(24.9, &thresholds), AlertLevel::None);
        assert_eq!(check_temperature_alert(25.0, &thresholds), AlertLevel::Warning);
        assert_eq!(check_temperature_alert(27.9, &thresholds), AlertLevel::Warning);
        assert_eq!(check_temperature_alert(28.0, &thresholds), AlertLevel::Critical);
        assert_eq!(check_temperature_alert(-10.0, &thresholds), AlertLevel::None);
    }
}
