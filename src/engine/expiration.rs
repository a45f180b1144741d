//! Expiration arithmetic and freshness classification.
//!
//! Everything here is a pure function over date-only values. Temperature factors
//! are kept as integer percentages so that round-half-up is exact:
//! `adjusted = (base * pct + 50) / 100`.

use chrono::{Days, NaiveDate};
use freshtrack_core::{
    AppResult, ExpirationStatus, FoodTypePolicy, FreshError, InventoryItem, ItemId,
    TemperatureThresholds,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Temperature band an item is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureFactor {
    /// Below 0 °C, shelf life doubled.
    Frozen,
    /// Above the high threshold, shelf life cut by 30%.
    High,
    /// Above the medium threshold, shelf life cut by 15%.
    Medium,
    /// Nominal storage.
    Nominal,
}

impl TemperatureFactor {
    /// Multiplier as an integer percentage.
    pub fn percent(self) -> u64 {
        match self {
            TemperatureFactor::Frozen => 200,
            TemperatureFactor::High => 70,
            TemperatureFactor::Medium => 85,
            TemperatureFactor::Nominal => 100,
        }
    }

    /// Multiplier applied to the base shelf life.
    pub fn multiplier(self) -> f64 {
        self.percent() as f64 / 100.0
    }
}

impl std::fmt::Display for TemperatureFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} (x{:.2})", self, self.multiplier())
    }
}

/// Select the factor for a storage temperature.
///
/// Sub-zero is checked first so that it is never shadowed by the medium band.
/// Both upper comparisons are strict: a temperature equal to a threshold falls
/// into the band below it.
pub fn temperature_factor(temperature: f64, thresholds: &TemperatureThresholds) -> TemperatureFactor {
    if temperature < 0.0 {
        TemperatureFactor::Frozen
    } else if temperature > thresholds.high_threshold {
        TemperatureFactor::High
    } else if temperature > thresholds.medium_threshold {
        TemperatureFactor::Medium
    } else {
        TemperatureFactor::Nominal
    }
}

/// `round_half_up(base * factor)`, never below one day.
pub fn adjusted_days(base_expiration_days: u32, factor: TemperatureFactor) -> u32 {
    let scaled = (u64::from(base_expiration_days) * factor.percent() + 50) / 100;
    u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
}

/// Expiration date for an item entered on `entry_date` and stored at `temperature`.
///
/// # Errors
///
/// [`FreshError::DateOutOfRange`] when the result does not fit the calendar.
///
/// # Example
///
/// ```rust
/// use chrono::NaiveDate;
/// use freshtrack::engine::compute_expiration_date;
/// use freshtrack_core::{FoodTypePolicy, TemperatureThresholds};
///
/// let policy = FoodTypePolicy::new("DAIRY", "Dairy", 10).unwrap();
/// let thresholds = TemperatureThresholds {
///     high_threshold: 25.0,
///     medium_threshold: 15.0,
///     warning_window_days: 3,
/// };
/// let entry = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let expires = compute_expiration_date(&policy, entry, 30.0, &thresholds).unwrap();
/// assert_eq!(expires, NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
/// ```
pub fn compute_expiration_date(
    policy: &FoodTypePolicy,
    entry_date: NaiveDate,
    temperature: f64,
    thresholds: &TemperatureThresholds,
) -> AppResult<NaiveDate> {
    let factor = temperature_factor(temperature, thresholds);
    let days = adjusted_days(policy.base_expiration_days(), factor);
    add_days(entry_date, days)
}

fn add_days(entry_date: NaiveDate, days: u32) -> AppResult<NaiveDate> {
    entry_date
        .checked_add_days(Days::new(u64::from(days)))
        .ok_or(FreshError::DateOutOfRange { entry_date, days })
}

/// Signed number of days from `today` until `expiration_date`.
pub fn days_until_expiration(expiration_date: NaiveDate, today: NaiveDate) -> i64 {
    (expiration_date - today).num_days()
}

/// Freshness of an item expiring on `expiration_date`, as seen on `today`.
///
/// Past expiration is danger; up to and including `warning_window_days` is warning.
pub fn classify_status(
    expiration_date: NaiveDate,
    today: NaiveDate,
    thresholds: &TemperatureThresholds,
) -> ExpirationStatus {
    let diff = days_until_expiration(expiration_date, today);
    if diff < 0 {
        ExpirationStatus::Danger
    } else if diff <= i64::from(thresholds.warning_window_days) {
        ExpirationStatus::Warning
    } else {
        ExpirationStatus::Ok
    }
}

/// Full result of one estimate, as shown to an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpirationEstimate {
    /// Food type the estimate was made for.
    pub type_code: String,
    /// Temperature band applied.
    pub factor: TemperatureFactor,
    /// Shelf life after the temperature adjustment.
    pub adjusted_days: u32,
    /// Entry date plus adjusted days.
    pub expiration_date: NaiveDate,
    /// Classification as of the estimate date.
    pub status: ExpirationStatus,
}

/// Estimate expiration and status for one policy.
pub fn estimate(
    policy: &FoodTypePolicy,
    entry_date: NaiveDate,
    temperature: f64,
    thresholds: &TemperatureThresholds,
    today: NaiveDate,
) -> AppResult<ExpirationEstimate> {
    let factor = temperature_factor(temperature, thresholds);
    let adjusted_days = adjusted_days(policy.base_expiration_days(), factor);
    let expiration_date = add_days(entry_date, adjusted_days)?;
    Ok(ExpirationEstimate {
        type_code: policy.type_code().to_string(),
        factor,
        adjusted_days,
        expiration_date,
        status: classify_status(expiration_date, today, thresholds),
    })
}

/// Find a policy by code among already-loaded policies.
///
/// # Errors
///
/// [`FreshError::UnknownFoodType`] when no policy carries `type_code`.
pub fn resolve_policy<'a>(
    policies: &'a [FoodTypePolicy],
    type_code: &str,
) -> AppResult<&'a FoodTypePolicy> {
    policies
        .iter()
        .find(|p| p.type_code() == type_code)
        .ok_or_else(|| FreshError::UnknownFoodType(type_code.to_string()))
}

/// A pending write produced by [`plan_recompute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpirationUpdate {
    /// Item to update.
    pub id: ItemId,
    /// New expiration date.
    pub expiration_date: NaiveDate,
    /// New status.
    pub status: ExpirationStatus,
}

/// Compute the writes needed to bring every item in line with `temperature`.
///
/// An item is written when its recomputed date differs from the stored one, or
/// when the stored status no longer matches its date. Running the plan and then
/// planning again with the same inputs yields no writes.
///
/// # Errors
///
/// [`FreshError::UnknownFoodType`] for the first item whose food type has no
/// policy; no partial plan is returned.
pub fn plan_recompute(
    items: &[InventoryItem],
    policies: &HashMap<String, FoodTypePolicy>,
    temperature: f64,
    thresholds: &TemperatureThresholds,
    today: NaiveDate,
) -> AppResult<Vec<ExpirationUpdate>> {
    let mut updates = Vec::new();
    for item in items {
        let policy = policies
            .get(&item.food_type_code)
            .ok_or_else(|| FreshError::UnknownFoodType(item.food_type_code.clone()))?;
        let expiration_date =
            compute_expiration_date(policy, item.entry_date, temperature, thresholds)?;
        let status = classify_status(expiration_date, today, thresholds);
        if expiration_date != item.expiration_date || status != item.status {
            updates.push(ExpirationUpdate {
                id: item.id,
                expiration_date,
                status,
            });
        }
    }
    Ok(updates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn thresholds() -> TemperatureThresholds {
        TemperatureThresholds {
            high_threshold: 25.0,
            medium_threshold: 15.0,
            warning_window_days: 3,
        }
    }

    fn policy(days: u32) -> FoodTypePolicy {
        FoodTypePolicy::new("DAIRY", "Dairy", days).unwrap()
    }

    #[test]
    fn test_factor_bands() {
        let t = thresholds();
        assert_eq!(temperature_factor(30.0, &t), TemperatureFactor::High);
        assert_eq!(temperature_factor(20.0, &t), TemperatureFactor::Medium);
        assert_eq!(temperature_factor(4.0, &t), TemperatureFactor::Nominal);
        assert_eq!(temperature_factor(0.0, &t), TemperatureFactor::Nominal);
        assert_eq!(temperature_factor(-0.5, &t), TemperatureFactor::Frozen);
    }

    #[test]
    fn test_threshold_equality_is_not_high() {
        let t = thresholds();
        assert_eq!(temperature_factor(25.0, &t), TemperatureFactor::Medium);
        assert_eq!(temperature_factor(15.0, &t), TemperatureFactor::Nominal);
    }

    #[test]
    fn test_sub_zero_wins_over_negative_medium_threshold() {
        let t = TemperatureThresholds {
            high_threshold: 0.0,
            medium_threshold: -10.0,
            warning_window_days: 3,
        };
        assert_eq!(temperature_factor(-5.0, &t), TemperatureFactor::Frozen);
    }

    #[test]
    fn test_round_half_up() {
        // 5 * 0.7 = 3.5 -> 4, 3 * 0.85 = 2.55 -> 3, 10 * 0.85 = 8.5 -> 9
        assert_eq!(adjusted_days(5, TemperatureFactor::High), 4);
        assert_eq!(adjusted_days(3, TemperatureFactor::Medium), 3);
        assert_eq!(adjusted_days(10, TemperatureFactor::Medium), 9);
        assert_eq!(adjusted_days(7, TemperatureFactor::Frozen), 14);
    }

    #[test]
    fn test_adjusted_days_never_zero() {
        for base in 1..=200 {
            for factor in [
                TemperatureFactor::Frozen,
                TemperatureFactor::High,
                TemperatureFactor::Medium,
                TemperatureFactor::Nominal,
            ] {
                assert!(adjusted_days(base, factor) >= 1);
            }
        }
    }

    #[test]
    fn test_hot_scenario() {
        let expires =
            compute_expiration_date(&policy(10), date(2024, 1, 1), 30.0, &thresholds()).unwrap();
        assert_eq!(expires, date(2024, 1, 8));
    }

    #[test]
    fn test_frozen_scenario() {
        let expires =
            compute_expiration_date(&policy(10), date(2024, 1, 1), -5.0, &thresholds()).unwrap();
        assert_eq!(expires, date(2024, 1, 21));
    }

    #[test]
    fn test_date_overflow_is_an_error() {
        let err = compute_expiration_date(&policy(10), NaiveDate::MAX, 4.0, &thresholds())
            .unwrap_err();
        assert!(matches!(err, FreshError::DateOutOfRange { days: 10, .. }));
    }

    #[test]
    fn test_classify_boundaries() {
        let t = thresholds();
        let today = date(2024, 3, 10);
        assert_eq!(classify_status(date(2024, 3, 9), today, &t), ExpirationStatus::Danger);
        assert_eq!(classify_status(today, today, &t), ExpirationStatus::Warning);
        assert_eq!(classify_status(date(2024, 3, 13), today, &t), ExpirationStatus::Warning);
        assert_eq!(classify_status(date(2024, 3, 14), today, &t), ExpirationStatus::Ok);
    }

    #[test]
    fn test_days_until_expiration_is_signed() {
        assert_eq!(days_until_expiration(date(2024, 1, 1), date(2024, 1, 4)), -3);
        assert_eq!(days_until_expiration(date(2024, 3, 1), date(2024, 2, 28)), 2);
    }

    #[test]
    fn test_resolve_unknown_policy() {
        let policies = vec![policy(7)];
        assert!(resolve_policy(&policies, "DAIRY").is_ok());
        let err = resolve_policy(&policies, "MEAT").unwrap_err();
        assert!(matches!(err, FreshError::UnknownFoodType(code) if code == "MEAT"));
    }

    #[test]
    fn test_estimate_carries_factor_and_status() {
        let result = estimate(
            &policy(10),
            date(2024, 1, 1),
            20.0,
            &thresholds(),
            date(2024, 1, 1),
        )
        .unwrap();
        assert_eq!(result.factor, TemperatureFactor::Medium);
        assert_eq!(result.adjusted_days, 9);
        assert_eq!(result.expiration_date, date(2024, 1, 10));
        assert_eq!(result.status, ExpirationStatus::Ok);
    }
}
