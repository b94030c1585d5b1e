//! DS18B20 one-wire temperature probes
//!
//! The kernel `w1_therm` driver exposes each probe as
//! `/sys/bus/w1/devices/<id>/w1_slave`:
//!
//! ```text
//! 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//! 72 01 4b 46 7f ff 0e 10 57 t=23125
//! ```
//!
//! The value after the last `t=` is in millidegrees Celsius.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use bb_error::{BrewError, Result};

use crate::constants::{paths, temperature};
use crate::data::validate_device_id;

/// Temperature probe
pub trait Probe: Send + Sync {
    /// Physical device id
    fn id(&self) -> String;

    /// Read the current temperature in degrees Celsius
    fn read_celsius(&self) -> Result<f64>;
}

/// DS18B20 probe read through sysfs
#[derive(Debug, Clone)]
pub struct Ds18b20Probe {
    id: String,
    slave_path: PathBuf,
}

impl Ds18b20Probe {
    pub fn new(w1_base: &Path, id: &str) -> Result<Self> {
        let id = validate_device_id(id)?;
        let slave_path = w1_base.join(&id).join(paths::W1_SLAVE_FILE);
        Ok(Self { id, slave_path })
    }

    fn read_error(&self, reason: impl Into<String>) -> BrewError {
        BrewError::ProbeRead {
            device: self.id.clone(),
            reason: reason.into(),
        }
    }
}

impl Probe for Ds18b20Probe {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn read_celsius(&self) -> Result<f64> {
        let raw = fs::read_to_string(&self.slave_path)
            .map_err(|e| self.read_error(format!("Failed to read {}: {}", self.slave_path.display(), e)))?;
        parse_w1_slave(&raw).map_err(|reason| self.read_error(reason))
    }
}

fn parse_w1_slave(raw: &str) -> std::result::Result<f64, String> {
    if let Some(crc_line) = raw.lines().next() {
        if crc_line.trim_end().ends_with("NO") {
            return Err("CRC check failed".to_string());
        }
    }

    let idx = raw
        .rfind("t=")
        .ok_or_else(|| "no temperature field in reading".to_string())?;
    let value = raw[idx + 2..].trim();

    let millidegrees: f64 = value
        .parse()
        .map_err(|e| format!("Failed to parse '{}': {}", value, e))?;

    Ok(millidegrees / temperature::MILLIDEGREE_DIVISOR)
}

/// Enumerate probes attached to the first one-wire bus master.
///
/// Returns a map of device id to probe.
pub fn discover_probes(w1_base: &Path) -> Result<HashMap<String, Arc<dyn Probe>>> {
    let listing = w1_base.join(paths::W1_MASTER_SLAVES);
    let content = fs::read_to_string(&listing).map_err(|e| BrewError::ProbeRead {
        device: "w1_bus_master1".to_string(),
        reason: format!("Failed to read {}: {}", listing.display(), e),
    })?;

    let mut probes: HashMap<String, Arc<dyn Probe>> = HashMap::new();
    for id in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let probe = Ds18b20Probe::new(w1_base, id)?;
        debug!(device = %id, "Discovered one-wire probe");
        probes.insert(probe.id(), Arc::new(probe));
    }

    Ok(probes)
}
