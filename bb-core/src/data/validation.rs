//! Input validation for configuration values
//!
//! Device ids end up in sysfs paths, so they are checked for traversal
//! before any file is opened.

use crate::constants::{limits, timing};
use crate::data::types::{ProbeName, Target};
use bb_error::{BrewError, Result};

/// Validates a one-wire device id (e.g. `28-0316a2795aff`)
pub fn validate_device_id(id: &str) -> Result<String> {
    let trimmed = id.trim();

    if trimmed.is_empty() {
        return Err(BrewError::invalid_config("probe", "device id cannot be empty"));
    }

    if trimmed.len() > limits::MAX_DEVICE_ID_LENGTH {
        return Err(BrewError::invalid_config(
            "probe",
            format!("device id too long (max {} characters)", limits::MAX_DEVICE_ID_LENGTH),
        ));
    }

    if trimmed.contains("..") || trimmed.contains('/') || trimmed.contains('\0') {
        return Err(BrewError::invalid_config(
            "probe",
            format!("device id '{}' contains path characters", trimmed),
        ));
    }

    Ok(trimmed.to_string())
}

/// Validates a target band for one probe
pub fn validate_target(probe: ProbeName, target: &Target) -> Result<()> {
    let field = format!("targets.{}", probe);

    if !target.min.is_finite() || !target.max.is_finite() {
        return Err(BrewError::invalid_config(field, "bounds must be finite"));
    }
    if target.min < 0.0 || target.max < 0.0 {
        return Err(BrewError::invalid_config(field, "bounds cannot be negative"));
    }
    if target.has_upper_bound() && target.max < target.min {
        return Err(BrewError::invalid_config(
            field,
            format!("max {} is below min {}", target.max, target.min),
        ));
    }

    Ok(())
}

/// Validates the duty cycle window length
pub fn validate_duty_window_ms(window_ms: u64) -> Result<u64> {
    if window_ms < timing::MIN_DUTY_CYCLE_WINDOW_MS {
        return Err(BrewError::invalid_config(
            "duty_window_ms",
            format!("must be at least {}ms", timing::MIN_DUTY_CYCLE_WINDOW_MS),
        ));
    }
    Ok(window_ms)
}

/// Validates the control loop cadence
pub fn validate_poll_interval_ms(poll_ms: u64) -> Result<u64> {
    if poll_ms < timing::MIN_POLL_INTERVAL_MS {
        return Err(BrewError::invalid_config(
            "poll_interval_ms",
            format!("must be at least {}ms", timing::MIN_POLL_INTERVAL_MS),
        ));
    }
    Ok(poll_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_device_id() {
        assert_eq!(validate_device_id(" 28-0316a2795aff\n").unwrap(), "28-0316a2795aff");
        assert!(validate_device_id("").is_err());
        assert!(validate_device_id("   ").is_err());
        assert!(validate_device_id("../../etc/passwd").is_err());
        assert!(validate_device_id("28-01/w1_slave").is_err());
        assert!(validate_device_id(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_target() {
        assert!(validate_target(ProbeName::Mash, &Target::between(65.0, 68.0)).is_ok());
        assert!(validate_target(ProbeName::Hlt, &Target::at_least(60.0)).is_ok());
        assert!(validate_target(ProbeName::Mash, &Target::between(68.0, 65.0)).is_err());
        assert!(validate_target(ProbeName::Mash, &Target::at_least(-1.0)).is_err());
        assert!(validate_target(ProbeName::Mash, &Target::at_least(f64::NAN)).is_err());
    }

    #[test]
    fn test_validate_timing() {
        assert!(validate_duty_window_ms(2000).is_ok());
        assert!(validate_duty_window_ms(99).is_err());
        assert!(validate_poll_interval_ms(50).is_ok());
        assert!(validate_poll_interval_ms(10).is_err());
    }
}
