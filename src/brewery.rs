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

//! The assembled brewery
//!
//! Binds logical probes to physical devices and logical heaters to running
//! duty-cycle drivers, and runs one mash management cycle at a time.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use bb_core::{decide, Decision, DutyCycleDriver, HeaterName, Probe, ProbeName, Readings, Relay, Targets};
use bb_error::{BrewError, Result};

use crate::config::RelayGroup;

pub struct Brewery {
    probes: BTreeMap<ProbeName, Arc<dyn Probe>>,
    heaters: BTreeMap<HeaterName, Arc<DutyCycleDriver>>,
}

/// Spawn one driver per relay group.
///
/// Heaters in the same group share the driver. `relay_for` opens the relay
/// for a group.
pub fn spawn_heaters<F>(
    groups: &[RelayGroup],
    window: Duration,
    mut relay_for: F,
) -> Result<BTreeMap<HeaterName, Arc<DutyCycleDriver>>>
where
    F: FnMut(&RelayGroup) -> Result<Arc<dyn Relay>>,
{
    let mut heaters = BTreeMap::new();
    for group in groups {
        let relay = relay_for(group)?;
        let driver = Arc::new(DutyCycleDriver::spawn(group.label(), relay, window));
        if group.heaters.len() > 1 {
            info!(heaters = %group.label(), gpio = group.gpio, "Heaters share one relay");
        }
        for heater in &group.heaters {
            heaters.insert(*heater, driver.clone());
        }
    }
    Ok(heaters)
}

impl Brewery {
    /// Bind every logical probe to a discovered device.
    ///
    /// Fails with `SensorNotFound` naming the first probe whose device id is
    /// not among `discovered`.
    pub fn assemble(
        probe_ids: &BTreeMap<ProbeName, String>,
        discovered: &HashMap<String, Arc<dyn Probe>>,
        heaters: BTreeMap<HeaterName, Arc<DutyCycleDriver>>,
    ) -> Result<Self> {
        let mut probes = BTreeMap::new();
        for probe in ProbeName::ALL {
            let id = probe_ids.get(&probe).ok_or_else(|| BrewError::SensorNotFound {
                probe: probe.to_string(),
                device: String::new(),
            })?;
            let device = discovered.get(id).ok_or_else(|| BrewError::SensorNotFound {
                probe: probe.to_string(),
                device: id.clone(),
            })?;
            debug!(probe = %probe, device = %id, "Probe bound");
            probes.insert(probe, device.clone());
        }

        Ok(Self { probes, heaters })
    }

    pub fn heater(&self, name: HeaterName) -> Result<&Arc<DutyCycleDriver>> {
        self.heaters
            .get(&name)
            .ok_or_else(|| BrewError::HeaterNotConfigured(name.to_string()))
    }

    /// Distinct drivers, one per physical relay
    pub fn drivers(&self) -> Vec<&Arc<DutyCycleDriver>> {
        let mut unique: Vec<&Arc<DutyCycleDriver>> = Vec::new();
        for driver in self.heaters.values() {
            if !unique.iter().any(|d| Arc::ptr_eq(d, driver)) {
                unique.push(driver);
            }
        }
        unique
    }

    /// Read every probe once.
    ///
    /// Reads are blocking sysfs I/O, so they run on the blocking pool.
    pub async fn read_all(&self) -> Result<Readings> {
        let probes: Vec<(ProbeName, Arc<dyn Probe>)> = self
            .probes
            .iter()
            .map(|(name, probe)| (*name, probe.clone()))
            .collect();

        tokio::task::spawn_blocking(move || {
            let mut readings = Readings::new();
            for (name, probe) in probes {
                readings.insert(name, probe.read_celsius()?);
            }
            Ok(readings)
        })
        .await
        .map_err(|e| BrewError::ProbeRead {
            device: "*".to_string(),
            reason: format!("Probe read task panicked: {}", e),
        })?
    }

    /// One mash management cycle: read, decide, command.
    ///
    /// A failed read or decision leaves every heater untouched.
    pub async fn manage_mash(&self, targets: &Targets) -> Result<Decision> {
        let readings = self.read_all().await?;
        let decision = decide(&readings, targets)?;

        let driver = self.heater(decision.heater)?;
        let previous = driver.current_power();
        driver.set_power(decision.power.into())?;

        if previous != decision.power {
            info!(
                heater = %decision.heater,
                power = %decision.power,
                rule = %decision.rule,
                "Heater power changed"
            );
        }
        debug!(
            hlt = readings.get(&ProbeName::Hlt).copied().unwrap_or(f64::NAN),
            herms = readings.get(&ProbeName::Herms).copied().unwrap_or(f64::NAN),
            mash = readings.get(&ProbeName::Mash).copied().unwrap_or(f64::NAN),
            rule = %decision.rule,
            "Mash cycle"
        );
        Ok(decision)
    }

    /// Request power 0 on every heater
    pub fn all_off(&self) {
        for driver in self.drivers() {
            if let Err(e) = driver.set_power(0) {
                // A faulted driver has already forced its relay off.
                warn!(heater = %driver.name(), error = %e, "Could not switch heater off");
            }
        }
    }

    /// Name of the first driver that has latched a fault
    pub fn faulted_heater(&self) -> Option<String> {
        self.drivers()
            .into_iter()
            .find(|d| d.is_faulted())
            .map(|d| d.name().to_string())
    }

    /// Stop every driver and leave all relays off
    pub async fn shutdown(&self) {
        for driver in self.drivers() {
            driver.shutdown().await;
        }
        if let Some(name) = self.faulted_heater() {
            error!(heater = %name, "Driver was faulted at shutdown");
        }
        info!("All heaters stopped");
    }
}
