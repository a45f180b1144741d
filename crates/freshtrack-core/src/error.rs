//! Custom error types for the application.
//!
//! This module defines the primary error type, `FreshError`, shared by every crate in
//! the workspace. Using the `thiserror` crate, it provides a centralized and consistent
//! way to handle the failures that can occur, from unknown food types and malformed
//! sensor lines to hardware channel problems and storage failures.
//!
//! ## Error Hierarchy
//!
//! `FreshError` falls into three broad groups:
//!
//! 1. **Engine Errors** - `UnknownFoodType`, `InvalidPolicy`, `InvalidThresholds`,
//!    `DateOutOfRange`
//!    - Raised by the pure expiration functions
//!    - Propagated to the immediate caller (e.g. to reject a registration)
//!
//! 2. **Acquisition Errors** - `OutOfRangeSample`, `ChannelOpen`, `ChannelTimeout`,
//!    `ChannelFault`, `Parse`, `SerialFeatureDisabled`
//!    - Absorbed by the acquisition task and turned into state transitions or log lines
//!    - Never returned from the sensor-data read API
//!
//! 3. **Collaborator Errors** - `Storage`, `ItemNotFound`, `Configuration`, `Io`,
//!    `AcquisitionStopped`
//!    - Propagated unmodified; the core does not mask storage failures
//!
//! By using `#[from]`, `FreshError` can be created from `std::io::Error` directly,
//! simplifying error handling with the `?` operator.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Channel Fault Classification
// =============================================================================

/// Classification of a fault reported by an open hardware channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The device refused access (permissions, exclusive lock held elsewhere).
    Permission,
    /// The device vanished or the connection was torn down.
    Disconnected,
    /// A read did not complete in time.
    Timeout,
    /// Bytes arrived that could not be decoded as a text line.
    InvalidData,
    /// Any other I/O failure.
    Io,
}

impl FaultKind {
    /// Whether the fault invalidates the channel and requires a reconnect.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            FaultKind::Permission | FaultKind::Disconnected | FaultKind::Io
        )
    }

    /// Map an I/O error kind onto a fault classification.
    pub fn from_io(kind: std::io::ErrorKind) -> Self {
        use std::io::ErrorKind;
        match kind {
            ErrorKind::PermissionDenied => FaultKind::Permission,
            ErrorKind::NotFound
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::UnexpectedEof => FaultKind::Disconnected,
            ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted => {
                FaultKind::Timeout
            }
            ErrorKind::InvalidData => FaultKind::InvalidData,
            _ => FaultKind::Io,
        }
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FaultKind::Permission => "permission",
            FaultKind::Disconnected => "disconnected",
            FaultKind::Timeout => "timeout",
            FaultKind::InvalidData => "invalid_data",
            FaultKind::Io => "io",
        };
        write!(f, "{}", label)
    }
}

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, FreshError>;

/// Primary error type for freshtrack.
#[derive(Error, Debug)]
pub enum FreshError {
    /// No food-type policy exists for the given code.
    ///
    /// **Error Type**: Permanent - the caller must reject the request or register
    /// the food type first. Never silently defaulted.
    #[error("Unknown food type: {0}")]
    UnknownFoodType(String),

    /// A food-type policy violates its invariants (e.g. zero shelf life).
    #[error("Invalid food type policy '{type_code}': {reason}")]
    InvalidPolicy {
        /// Code of the offending policy.
        type_code: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Temperature thresholds are inconsistent.
    #[error("Invalid temperature thresholds: {0}")]
    InvalidThresholds(String),

    /// Date arithmetic left the representable calendar range.
    #[error("Expiration date out of range: {entry_date} + {days} days")]
    DateOutOfRange {
        /// Entry date the offset was applied to.
        entry_date: chrono::NaiveDate,
        /// Offset in days.
        days: u32,
    },

    /// A sample failed range validation. Internal: logged and discarded.
    #[error("{quantity} {value} outside accepted range [{min}, {max}]")]
    OutOfRangeSample {
        /// `"temperature"` or `"humidity"`.
        quantity: &'static str,
        /// Rejected value.
        value: f64,
        /// Lower bound (inclusive).
        min: f64,
        /// Upper bound (inclusive).
        max: f64,
    },

    /// The hardware channel could not be opened.
    #[error("Failed to open channel {path}: {message}")]
    ChannelOpen {
        /// Device path.
        path: String,
        /// Underlying failure.
        message: String,
    },

    /// Opening the hardware channel did not complete within the bounded wait.
    #[error("Timed out after {timeout:?} opening channel {path}")]
    ChannelTimeout {
        /// Device path.
        path: String,
        /// Bounded wait that elapsed.
        timeout: Duration,
    },

    /// An open channel reported an error event.
    #[error("Channel {kind} fault: {message}")]
    ChannelFault {
        /// Fault classification.
        kind: FaultKind,
        /// Underlying failure.
        message: String,
    },

    /// An input line matched neither the structured nor the free-text format.
    #[error("Unparseable sensor line '{line}': {reason}")]
    Parse {
        /// Raw line (trimmed).
        line: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Hardware mode requested but serial support was not compiled in.
    #[error("Serial support not enabled. Rebuild with --features serial")]
    SerialFeatureDisabled,

    /// An inventory item id did not resolve.
    #[error("Inventory item {0} not found")]
    ItemNotFound(u64),

    /// A store collaborator failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Semantic configuration problem.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// The acquisition task is no longer running.
    #[error("Sensor acquisition task has stopped")]
    AcquisitionStopped,

    /// Wrapped I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FreshError {
    /// True for channel faults that require tearing the channel down.
    pub fn is_fatal_fault(&self) -> bool {
        match self {
            FreshError::ChannelFault { kind, .. } => kind.is_fatal(),
            FreshError::ChannelOpen { .. } | FreshError::ChannelTimeout { .. } => true,
            _ => false,
        }
    }

    /// Build a channel fault from an I/O error raised while reading.
    pub fn from_read_error(err: &std::io::Error) -> Self {
        FreshError::ChannelFault {
            kind: FaultKind::from_io(err.kind()),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn test_permission_faults_are_fatal() {
        assert!(FaultKind::from_io(ErrorKind::PermissionDenied).is_fatal());
        assert!(FaultKind::from_io(ErrorKind::BrokenPipe).is_fatal());
        assert!(!FaultKind::from_io(ErrorKind::TimedOut).is_fatal());
        assert!(!FaultKind::from_io(ErrorKind::InvalidData).is_fatal());
    }

    #[test]
    fn test_read_error_classification() {
        let err = std::io::Error::new(ErrorKind::PermissionDenied, "access denied");
        let fault = FreshError::from_read_error(&err);
        assert!(fault.is_fatal_fault());
        assert!(fault.to_string().contains("permission"));
    }

    #[test]
    fn test_error_messages() {
        let err = FreshError::UnknownFoodType("XYZ".into());
        assert_eq!(err.to_string(), "Unknown food type: XYZ");

        let err = FreshError::OutOfRangeSample {
            quantity: "temperature",
            value: 150.0,
            min: -40.0,
            max: 80.0,
        };
        assert_eq!(
            err.to_string(),
            "temperature 150 outside accepted range [-40, 80]"
        );
    }
}
