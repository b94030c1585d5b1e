//! Solid-state relay drivers
//!
//! An SSR has no analog input: it is either on or off. Power levels are
//! produced by the duty-cycle driver on top of this interface.
//!
//! # GPIO
//!
//! The sysfs GPIO interface exposes each exported pin as a directory:
//! - `direction` - `in` or `out`
//! - `value` - `1` drives the SSR input high (relay on), `0` low (relay off)

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use bb_error::{BrewError, Result};

/// Binary relay. Implementations must be safe to call from any thread.
pub trait Relay: Send + Sync {
    fn turn_on(&self) -> Result<()>;
    fn turn_off(&self) -> Result<()>;
}

/// Relay wired to a sysfs GPIO pin
#[derive(Debug, Clone)]
pub struct GpioRelay {
    pin: u32,
    value_path: PathBuf,
}

impl GpioRelay {
    /// Export `pin` if needed and configure it as an output
    pub fn open(gpio_base: &Path, pin: u32) -> Result<Self> {
        let pin_dir = gpio_base.join(format!("gpio{}", pin));

        if !pin_dir.exists() {
            let export = gpio_base.join("export");
            fs::write(&export, pin.to_string()).map_err(|e| BrewError::RelayWrite {
                path: export.clone(),
                reason: format!("Failed to export GPIO {}: {}", pin, e),
            })?;
        }

        let direction = pin_dir.join("direction");
        fs::write(&direction, "out").map_err(|e| BrewError::RelayWrite {
            path: direction.clone(),
            reason: format!("Failed to set GPIO {} as output: {}", pin, e),
        })?;

        debug!(pin, "GPIO relay configured");

        Ok(Self {
            pin,
            value_path: pin_dir.join("value"),
        })
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    fn write(&self, value: &str) -> Result<()> {
        fs::write(&self.value_path, value).map_err(|e| BrewError::RelayWrite {
            path: self.value_path.clone(),
            reason: format!("Failed to write '{}': {}", value, e),
        })
    }
}

impl Relay for GpioRelay {
    fn turn_on(&self) -> Result<()> {
        self.write("1")
    }

    fn turn_off(&self) -> Result<()> {
        self.write("0")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayAction {
    On,
    Off,
}

/// One applied relay command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayEvent {
    pub action: RelayAction,
    pub at: Instant,
}

/// In-memory relay for dry runs
///
/// Records every applied command with its timestamp. Can be switched into a
/// failing mode where every command returns an error and is not recorded.
#[derive(Debug, Default)]
pub struct FakeRelay {
    events: Mutex<Vec<RelayEvent>>,
    failing: AtomicBool,
}

impl FakeRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RelayEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, action: RelayAction) -> usize {
        self.events.lock().iter().filter(|e| e.action == action).count()
    }

    /// Whether the last applied command was `On`
    pub fn is_on(&self) -> bool {
        self.events.lock().last().map(|e| e.action) == Some(RelayAction::On)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn apply(&self, action: RelayAction) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BrewError::RelayWrite {
                path: PathBuf::from("fake"),
                reason: format!("simulated failure switching {:?}", action),
            });
        }
        self.events.lock().push(RelayEvent {
            action,
            at: Instant::now(),
        });
        Ok(())
    }
}

impl Relay for FakeRelay {
    fn turn_on(&self) -> Result<()> {
        self.apply(RelayAction::On)
    }

    fn turn_off(&self) -> Result<()> {
        self.apply(RelayAction::Off)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_gpio_relay_existing_pin() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("gpio17")).unwrap();

        let relay = GpioRelay::open(dir.path(), 17).unwrap();
        assert_eq!(relay.pin(), 17);
        assert_eq!(fs::read_to_string(dir.path().join("gpio17/direction")).unwrap(), "out");

        relay.turn_on().unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("gpio17/value")).unwrap(), "1");
        relay.turn_off().unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("gpio17/value")).unwrap(), "0");
    }

    #[test]
    fn test_gpio_relay_export_failure() {
        let dir = TempDir::new().unwrap();
        // No export file can be created under a missing directory.
        let missing = dir.path().join("nope");
        assert!(matches!(
            GpioRelay::open(&missing, 4),
            Err(BrewError::RelayWrite { .. })
        ));
    }

    #[test]
    fn test_gpio_relay_write_failure() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("gpio22")).unwrap();
        let relay = GpioRelay::open(dir.path(), 22).unwrap();
        fs::remove_dir_all(dir.path().join("gpio22")).unwrap();
        assert!(relay.turn_on().is_err());
    }

    #[test]
    fn test_fake_relay_records() {
        let relay = FakeRelay::new();
        assert!(!relay.is_on());
        relay.turn_on().unwrap();
        assert!(relay.is_on());
        relay.turn_off().unwrap();
        assert!(!relay.is_on());
        assert_eq!(relay.count(RelayAction::On), 1);

        relay.set_failing(true);
        assert!(relay.turn_on().is_err());
        assert_eq!(relay.events().len(), 2);
    }
}
