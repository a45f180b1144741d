//! Food-type reference data and expiration thresholds.

use crate::error::{AppResult, FreshError};
use serde::{Deserialize, Serialize};

/// Static per food-type configuration.
///
/// Immutable reference data: seeded once, read-only afterwards. Construct through
/// [`FoodTypePolicy::new`] so that `base_expiration_days > 0` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodTypePolicy {
    type_code: String,
    display_name: String,
    base_expiration_days: u32,
}

impl FoodTypePolicy {
    /// Create a validated policy.
    ///
    /// # Errors
    ///
    /// Returns [`FreshError::InvalidPolicy`] when the code is blank or the shelf
    /// life is zero days.
    pub fn new(
        type_code: impl Into<String>,
        display_name: impl Into<String>,
        base_expiration_days: u32,
    ) -> AppResult<Self> {
        let type_code = type_code.into();
        if type_code.trim().is_empty() {
            return Err(FreshError::InvalidPolicy {
                type_code,
                reason: "type code cannot be empty".into(),
            });
        }
        if base_expiration_days == 0 {
            return Err(FreshError::InvalidPolicy {
                type_code,
                reason: "base_expiration_days must be greater than 0".into(),
            });
        }
        Ok(Self {
            type_code,
            display_name: display_name.into(),
            base_expiration_days,
        })
    }

    /// Unique key of the food type.
    pub fn type_code(&self) -> &str {
        &self.type_code
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Shelf life in days under nominal conditions. Always positive.
    pub fn base_expiration_days(&self) -> u32 {
        self.base_expiration_days
    }
}

/// Process-wide temperature and warning-window configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureThresholds {
    /// Above this temperature (°C) the high-temperature factor applies.
    pub high_threshold: f64,
    /// Above this temperature (°C) and up to `high_threshold` the medium factor applies.
    pub medium_threshold: f64,
    /// Days before expiration that trigger the warning classification.
    pub warning_window_days: u32,
}

impl TemperatureThresholds {
    /// Check that the medium boundary sits below the high boundary.
    pub fn validate(&self) -> AppResult<()> {
        if !self.high_threshold.is_finite() || !self.medium_threshold.is_finite() {
            return Err(FreshError::InvalidThresholds(
                "thresholds must be finite".into(),
            ));
        }
        if self.medium_threshold >= self.high_threshold {
            return Err(FreshError::InvalidThresholds(format!(
                "medium_threshold ({}) must be below high_threshold ({})",
                self.medium_threshold, self.high_threshold
            )));
        }
        Ok(())
    }
}

impl Default for TemperatureThresholds {
    fn default() -> Self {
        Self {
            high_threshold: 8.0,
            medium_threshold: 5.0,
            warning_window_days: 10,
        }
    }
}

/// Freshness classification of an inventory item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpirationStatus {
    /// More than the warning window remains.
    Ok,
    /// Expires today or within the warning window.
    Warning,
    /// Already expired.
    Danger,
}

impl ExpirationStatus {
    /// Lowercase label used by the serialization boundary.
    pub fn as_str(self) -> &'static str {
        match self {
            ExpirationStatus::Ok => "ok",
            ExpirationStatus::Warning => "warning",
            ExpirationStatus::Danger => "danger",
        }
    }
}

impl std::fmt::Display for ExpirationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExpirationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ok" => Ok(ExpirationStatus::Ok),
            "warning" => Ok(ExpirationStatus::Warning),
            "danger" => Ok(ExpirationStatus::Danger),
            other => Err(format!(
                "Invalid status '{}'. Must be one of: ok, warning, danger",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_rejects_zero_days() {
        let err = FoodTypePolicy::new("DAIRY", "Dairy", 0).unwrap_err();
        assert!(matches!(err, FreshError::InvalidPolicy { .. }));
    }

    #[test]
    fn test_policy_rejects_blank_code() {
        assert!(FoodTypePolicy::new("  ", "Blank", 3).is_err());
    }

    #[test]
    fn test_thresholds_validation() {
        assert!(TemperatureThresholds::default().validate().is_ok());

        let inverted = TemperatureThresholds {
            high_threshold: 5.0,
            medium_threshold: 8.0,
            warning_window_days: 10,
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_status_roundtrip_labels() {
        for status in [
            ExpirationStatus::Ok,
            ExpirationStatus::Warning,
            ExpirationStatus::Danger,
        ] {
            assert_eq!(status.as_str().parse::<ExpirationStatus>(), Ok(status));
        }
        assert!("stale".parse::<ExpirationStatus>().is_err());
    }
}
