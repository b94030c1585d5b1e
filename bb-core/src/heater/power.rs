//! Heater power levels

use std::fmt;
use std::time::Duration;

use bb_error::{BrewError, Result};
use serde::{Deserialize, Serialize};

use crate::constants::power;

/// Percentage duty in `[0, 100]`
///
/// A `PowerLevel` can only be built through [`PowerLevel::new`] or the presets,
/// so holding one means the value has been validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct PowerLevel(u8);

impl PowerLevel {
    pub const OFF: PowerLevel = PowerLevel(power::OFF);
    pub const LOW: PowerLevel = PowerLevel(power::LOW);
    pub const MED: PowerLevel = PowerLevel(power::MED);
    pub const HIGH: PowerLevel = PowerLevel(power::HIGH);
    pub const MAX: PowerLevel = PowerLevel(power::MAX);

    /// Validate a requested level. Out-of-range values are rejected, never clamped.
    pub fn new(value: i32) -> Result<Self> {
        if !(i32::from(power::OFF)..=i32::from(power::MAX)).contains(&value) {
            return Err(BrewError::InvalidPowerLevel { value });
        }
        Ok(Self(value as u8))
    }

    pub fn percent(&self) -> u8 {
        self.0
    }

    pub fn is_off(&self) -> bool {
        self.0 == power::OFF
    }

    /// On-time within one window: `window * level / 100`.
    ///
    /// Zero exactly at OFF and the full window exactly at MAX.
    pub fn duty_duration(&self, window: Duration) -> Duration {
        window * u32::from(self.0) / u32::from(power::MAX)
    }
}

impl Default for PowerLevel {
    fn default() -> Self {
        Self::OFF
    }
}

impl TryFrom<i32> for PowerLevel {
    type Error = BrewError;

    fn try_from(value: i32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<PowerLevel> for i32 {
    fn from(level: PowerLevel) -> i32 {
        i32::from(level.0)
    }
}

impl fmt::Display for PowerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}
