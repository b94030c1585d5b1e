//! Mash temperature decision engine
//!
//! Compares the HLT, HERMS and MASH readings against their target bands and
//! selects one power level for one heater.
//!
//! # Rules
//!
//! Evaluated in priority order, the first match wins:
//!
//! 1. HLT below target: HLT heater at MAX.
//! 2. HERMS below target: HLT heater at MAX (the HLT supplies the HERMS coil).
//! 3. MASH below, HERMS above: HLT heater OFF, let the loop coast down.
//! 4. MASH below, HERMS on target: HLT heater LOW, trickle heat into the mash.
//! 5. MASH on or above target: HLT heater OFF.
//!
//! The engine holds no state. Identical inputs always produce the same decision.

use std::fmt;

use bb_error::{BrewError, Result};

use crate::data::{Comparison, HeaterName, ProbeName, Readings, Target, Targets};
use crate::heater::PowerLevel;

/// Which rule produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    HltBelow,
    HermsBelow,
    MashBelowHermsAbove,
    MashBelowHermsOnTarget,
    MashSatisfied,
}

impl Rule {
    /// Select the rule for a set of comparisons.
    ///
    /// MASH and HERMS both below target is taken by `HermsBelow`, so every
    /// combination maps to exactly one rule.
    fn select(hlt: Comparison, herms: Comparison, mash: Comparison) -> Self {
        use Comparison::*;

        match (hlt, herms, mash) {
            (Below, _, _) => Rule::HltBelow,
            (_, Below, _) => Rule::HermsBelow,
            (_, Above, Below) => Rule::MashBelowHermsAbove,
            (_, OnTarget, Below) => Rule::MashBelowHermsOnTarget,
            (_, _, OnTarget | Above) => Rule::MashSatisfied,
        }
    }

    pub fn heater(&self) -> HeaterName {
        match self {
            Rule::HltBelow
            | Rule::HermsBelow
            | Rule::MashBelowHermsAbove
            | Rule::MashBelowHermsOnTarget
            | Rule::MashSatisfied => HeaterName::Hlt,
        }
    }

    pub fn power(&self) -> PowerLevel {
        match self {
            Rule::HltBelow | Rule::HermsBelow => PowerLevel::MAX,
            Rule::MashBelowHermsAbove => PowerLevel::OFF,
            Rule::MashBelowHermsOnTarget => PowerLevel::LOW,
            Rule::MashSatisfied => PowerLevel::OFF,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Rule::HltBelow => "HLT temperature too low",
            Rule::HermsBelow => "HERMS temperature too low",
            Rule::MashBelowHermsAbove => "mash too low, HERMS too high",
            Rule::MashBelowHermsOnTarget => "equalizing, mash too low",
            Rule::MashSatisfied => "mash at or above target",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Heater action selected for one control cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub heater: HeaterName,
    pub power: PowerLevel,
    pub rule: Rule,
}

/// Compare a reading against a target band
pub fn compare(value: f64, target: &Target) -> Comparison {
    if value < target.min {
        Comparison::Below
    } else if target.has_upper_bound() && value > target.max {
        Comparison::Above
    } else {
        Comparison::OnTarget
    }
}

fn reading(readings: &Readings, probe: ProbeName) -> Result<f64> {
    let value = *readings
        .get(&probe)
        .ok_or_else(|| BrewError::MissingReading(probe.to_string()))?;

    if !value.is_finite() {
        return Err(BrewError::InvalidReading {
            probe: probe.to_string(),
            value,
        });
    }
    Ok(value)
}

fn comparison(readings: &Readings, targets: &Targets, probe: ProbeName) -> Result<Comparison> {
    let value = reading(readings, probe)?;
    // An absent target is the zero band: no lower or upper bound.
    let target = targets.get(&probe).copied().unwrap_or_default();
    Ok(compare(value, &target))
}

/// Decide the heater action for the given readings and targets.
///
/// Fails with `MissingReading` when the HLT, HERMS or MASH reading is absent
/// and with `InvalidReading` when one of them is not finite. In both cases the
/// caller must not touch any heater for this cycle.
pub fn decide(readings: &Readings, targets: &Targets) -> Result<Decision> {
    let hlt = comparison(readings, targets, ProbeName::Hlt)?;
    let herms = comparison(readings, targets, ProbeName::Herms)?;
    let mash = comparison(readings, targets, ProbeName::Mash)?;

    let rule = Rule::select(hlt, herms, mash);
    Ok(Decision {
        heater: rule.heater(),
        power: rule.power(),
        rule,
    })
}
