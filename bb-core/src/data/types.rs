//! Core data types for Brewberry
//!
//! Probe and heater identities are small closed sets, so they are plain enums
//! and every rule over them is an exhaustive `match`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use bb_error::BrewError;
use serde::{Deserialize, Serialize};

/// Identity of a temperature point on the rig
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeName {
    Mash,
    Hlt,
    Boil,
    Herms,
}

impl ProbeName {
    pub const ALL: [ProbeName; 4] = [Self::Mash, Self::Hlt, Self::Boil, Self::Herms];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mash => "MASH",
            Self::Hlt => "HLT",
            Self::Boil => "BOIL",
            Self::Herms => "HERMS",
        }
    }
}

impl fmt::Display for ProbeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProbeName {
    type Err = BrewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| BrewError::config(format!("unknown probe name '{}'", s)))
    }
}

/// Identity of a physical heater
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HeaterName {
    Hlt,
    Boil,
}

impl HeaterName {
    pub const ALL: [HeaterName; 2] = [Self::Hlt, Self::Boil];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hlt => "HLT",
            Self::Boil => "BOIL",
        }
    }
}

impl fmt::Display for HeaterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acceptable temperature band for one probe, in degrees Celsius
///
/// `max == 0` means there is no upper bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
}

impl Target {
    /// Band with a lower bound only
    pub fn at_least(min: f64) -> Self {
        Self { min, max: 0.0 }
    }

    /// Band with both bounds
    pub fn between(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn has_upper_bound(&self) -> bool {
        self.max > 0.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_upper_bound() {
            write!(f, "{:.1}..{:.1}°C", self.min, self.max)
        } else {
            write!(f, ">= {:.1}°C", self.min)
        }
    }
}

/// Result of comparing a reading against its target band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Below,
    Above,
    OnTarget,
}

/// Latest reading per probe, in degrees Celsius
pub type Readings = HashMap<ProbeName, f64>;

/// Target band per probe
pub type Targets = HashMap<ProbeName, Target>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_name_parse() {
        assert_eq!("MASH".parse::<ProbeName>().unwrap(), ProbeName::Mash);
        assert_eq!("herms".parse::<ProbeName>().unwrap(), ProbeName::Herms);
        assert!("kettle".parse::<ProbeName>().is_err());
    }

    #[test]
    fn test_probe_name_json_keys() {
        let mut targets = Targets::new();
        targets.insert(ProbeName::Mash, Target::between(65.0, 68.0));
        let json = serde_json::to_string(&targets).unwrap();
        assert!(json.contains("\"MASH\""));

        let parsed: Targets = serde_json::from_str(r#"{"HLT": {"min": 60}}"#).unwrap();
        assert_eq!(parsed[&ProbeName::Hlt], Target::at_least(60.0));
    }

    #[test]
    fn test_target_display() {
        assert_eq!(Target::at_least(60.0).to_string(), ">= 60.0°C");
        assert_eq!(Target::between(65.0, 68.0).to_string(), "65.0..68.0°C");
    }
}
