//! Unified error handling for Brewberry
//!
//! This crate provides a single error type used across all Brewberry components.
//! It uses thiserror for ergonomic error definitions with proper Display and Error trait impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using BrewError
pub type Result<T> = std::result::Result<T, BrewError>;

/// Unified error type for all Brewberry operations
#[derive(thiserror::Error, Debug)]
pub enum BrewError {
    // ============================================================================
    // I/O and Hardware Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read probe {device}: {reason}")]
    ProbeRead {
        device: String,
        reason: String,
    },

    #[error("Failed to drive relay {path}: {reason}")]
    RelayWrite {
        path: PathBuf,
        reason: String,
    },

    #[error("Sensor {device} for probe {probe} not found")]
    SensorNotFound {
        probe: String,
        device: String,
    },

    // ============================================================================
    // Control Errors
    // ============================================================================
    #[error("Invalid power level: {value} (must be 0-100)")]
    InvalidPowerLevel {
        value: i32,
    },

    #[error("Missing reading for probe {0}")]
    MissingReading(String),

    #[error("Invalid reading for probe {probe}: {value}")]
    InvalidReading {
        probe: String,
        value: f64,
    },

    #[error("Heater not configured: {0}")]
    HeaterNotConfigured(String),

    #[error("Duty-cycle driver for heater {0} has faulted")]
    DriverFaulted(String),

    #[error("Duty-cycle driver for heater {0} is shutting down")]
    DriverStopping(String),

    #[error("Internal invariant violated: {0}")]
    InvariantViolation(String),

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },
}

impl BrewError {
    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid configuration error for a named field
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an invariant violation error
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Whether the error can only come from a logic defect.
    ///
    /// Everything else is recoverable: the caller skips the current cycle and tries again.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation(_) | Self::DriverFaulted(_))
    }
}
