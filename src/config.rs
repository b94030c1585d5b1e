/*
 * This file is part of Brewberry.
 *
 * Copyright (C) 2025 Brewberry contributors
 *
 * Brewberry is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Brewberry is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Brewberry. If not, see <https://www.gnu.org/licenses/>.
 */

//! Brewery configuration
//!
//! Stored as JSON, by default in /etc/brewberry/brewery.json:
//!
//! ```json
//! {
//!   "probes":  { "MASH": "28-01", "HLT": "28-02", "BOIL": "28-02", "HERMS": "28-03" },
//!   "heaters": { "HLT": { "gpio": 17 }, "BOIL": { "gpio": 17 } },
//!   "targets": { "HLT": { "min": 60 }, "HERMS": { "min": 60 }, "MASH": { "min": 65, "max": 68 } }
//! }
//! ```
//!
//! Heaters that name the same GPIO pin share one relay, and therefore one
//! duty-cycle driver.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use bb_core::constants::{limits, paths, timing};
use bb_core::{
    validate_device_id, validate_duty_window_ms, validate_poll_interval_ms, validate_target,
    HeaterName, ProbeName, Targets,
};
use bb_error::{BrewError, Result};

/// Environment variable overriding the configuration path
pub const CONFIG_ENV: &str = "BREWBERRY_CONFIG";

/// Probes the decision engine compares against targets
const CONTROLLED_PROBES: [ProbeName; 3] = [ProbeName::Hlt, ProbeName::Herms, ProbeName::Mash];

/// Physical wiring of one heater
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaterConfig {
    pub gpio: u32,
}

/// Heaters sharing one relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayGroup {
    pub gpio: u32,
    pub heaters: Vec<HeaterName>,
}

impl RelayGroup {
    /// Driver label, e.g. `HLT+BOIL`
    pub fn label(&self) -> String {
        self.heaters
            .iter()
            .map(|h| h.as_str())
            .collect::<Vec<_>>()
            .join("+")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreweryConfig {
    /// Logical probe -> one-wire device id
    pub probes: BTreeMap<ProbeName, String>,

    /// Logical heater -> relay wiring
    pub heaters: BTreeMap<HeaterName, HeaterConfig>,

    /// Target bands used by the mash controller
    #[serde(default)]
    pub targets: Targets,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_duty_window_ms")]
    pub duty_window_ms: u64,

    #[serde(default = "default_w1_base")]
    pub w1_base: PathBuf,

    #[serde(default = "default_gpio_base")]
    pub gpio_base: PathBuf,
}

fn default_poll_interval_ms() -> u64 {
    timing::POLL_INTERVAL_MS
}

fn default_duty_window_ms() -> u64 {
    timing::DUTY_CYCLE_WINDOW_MS
}

fn default_w1_base() -> PathBuf {
    PathBuf::from(paths::W1_DEVICES)
}

fn default_gpio_base() -> PathBuf {
    PathBuf::from(paths::GPIO_BASE)
}

impl BreweryConfig {
    /// Check the whole configuration, failing on the first problem
    pub fn validate(&self) -> Result<()> {
        for probe in ProbeName::ALL {
            let id = self.probes.get(&probe).ok_or_else(|| {
                BrewError::invalid_config(format!("probes.{}", probe), "probe is not mapped")
            })?;
            validate_device_id(id)?;
        }

        if !self.heaters.contains_key(&HeaterName::Hlt) {
            return Err(BrewError::invalid_config(
                "heaters.HLT",
                "the HLT heater drives the mash loop and must be configured",
            ));
        }

        for (probe, target) in &self.targets {
            validate_target(*probe, target)?;
        }
        for probe in CONTROLLED_PROBES {
            if !self.targets.contains_key(&probe) {
                warn!(probe = %probe, "No target configured; probe is treated as always on target");
            }
        }

        validate_poll_interval_ms(self.poll_interval_ms)?;
        validate_duty_window_ms(self.duty_window_ms)?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn duty_window(&self) -> Duration {
        Duration::from_millis(self.duty_window_ms)
    }

    /// Group heaters by GPIO pin, ordered by pin
    pub fn relay_groups(&self) -> Vec<RelayGroup> {
        let mut by_pin: BTreeMap<u32, Vec<HeaterName>> = BTreeMap::new();
        for (heater, wiring) in &self.heaters {
            by_pin.entry(wiring.gpio).or_default().push(*heater);
        }
        by_pin
            .into_iter()
            .map(|(gpio, heaters)| RelayGroup { gpio, heaters })
            .collect()
    }
}

/// Configuration path: `$BREWBERRY_CONFIG` or /etc/brewberry/brewery.json
pub fn config_path() -> PathBuf {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => Path::new(paths::CONFIG_DIR).join(paths::CONFIG_FILE),
    }
}

/// Load and validate a configuration file
pub fn load_config(path: &Path) -> Result<BreweryConfig> {
    let metadata = fs::metadata(path).map_err(|e| {
        BrewError::config(format!("Failed to stat {}: {}", path.display(), e))
    })?;
    if metadata.len() > limits::MAX_CONFIG_SIZE {
        return Err(BrewError::config(format!(
            "{} is too large ({} bytes, max {} bytes)",
            path.display(),
            metadata.len(),
            limits::MAX_CONFIG_SIZE
        )));
    }

    let content = fs::read_to_string(path).map_err(|e| {
        BrewError::config(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let config: BreweryConfig = serde_json::from_str(&content)?;
    config.validate()?;

    debug!(
        path = %path.display(),
        heaters = config.heaters.len(),
        targets = config.targets.len(),
        "Configuration loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BreweryConfig {
        serde_json::from_str(
            r#"{
                "probes": { "MASH": "28-01", "HLT": "28-02", "BOIL": "28-02", "HERMS": "28-03" },
                "heaters": { "HLT": { "gpio": 17 }, "BOIL": { "gpio": 17 } },
                "targets": { "HLT": { "min": 60 }, "HERMS": { "min": 60 }, "MASH": { "min": 65, "max": 68 } }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = sample();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.duty_window(), Duration::from_secs(2));
        assert_eq!(config.w1_base, PathBuf::from("/sys/bus/w1/devices"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_shared_pin_groups_heaters() {
        let groups = sample().relay_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].gpio, 17);
        assert_eq!(groups[0].label(), "HLT+BOIL");
    }

    #[test]
    fn test_separate_pins() {
        let mut config = sample();
        config.heaters.insert(HeaterName::Boil, HeaterConfig { gpio: 27 });
        let groups = config.relay_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].heaters, vec![HeaterName::Hlt]);
        assert_eq!(groups[1].heaters, vec![HeaterName::Boil]);
    }

    #[test]
    fn test_unmapped_probe_rejected() {
        let mut config = sample();
        config.probes.remove(&ProbeName::Boil);
        assert!(matches!(config.validate(), Err(BrewError::InvalidConfig { .. })));
    }

    #[test]
    fn test_missing_hlt_heater_rejected() {
        let mut config = sample();
        config.heaters.remove(&HeaterName::Hlt);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_timing_rejected() {
        let mut config = sample();
        config.duty_window_ms = 10;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.poll_interval_ms = 1;
        assert!(config.validate().is_err());
    }
}
