//! Constants and configuration values for Brewberry
//!
//! Centralizes all magic numbers, paths, and configuration defaults.
//! Never use magic numbers in other files - add them here first.

use std::time::Duration;

/// System paths for the Raspberry Pi one-wire bus and sysfs GPIO
pub mod paths {
    /// Base directory of one-wire devices
    pub const W1_DEVICES: &str = "/sys/bus/w1/devices";

    /// Bus master listing, relative to [`W1_DEVICES`]. One slave id per line.
    pub const W1_MASTER_SLAVES: &str = "w1_bus_master1/w1_master_slaves";

    /// Per-device reading file, relative to the device directory
    pub const W1_SLAVE_FILE: &str = "w1_slave";

    /// Base directory of sysfs GPIO
    pub const GPIO_BASE: &str = "/sys/class/gpio";

    /// Configuration directory
    pub const CONFIG_DIR: &str = "/etc/brewberry";

    /// Brewery configuration file
    pub const CONFIG_FILE: &str = "brewery.json";
}

/// Heater power levels (percent duty)
pub mod power {
    /// Heater off
    pub const OFF: u8 = 0;

    /// 25%. Minimal scorch risk, might not boil the kettle contents.
    pub const LOW: u8 = 25;

    /// 50%. Low scorch risk but may scorch high-particulate kettles. Good boiling level.
    pub const MED: u8 = 50;

    /// 75%. Moderate scorch risk, low boil-over risk. Wort only.
    pub const HIGH: u8 = 75;

    /// 100%. High scorch and boil-over risk. Water only.
    pub const MAX: u8 = 100;
}

/// Temperature conversion constants
pub mod temperature {
    /// DS18B20 reports millidegrees Celsius
    pub const MILLIDEGREE_DIVISOR: f64 = 1000.0;
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Window over which a duty percentage is approximated
    pub const DUTY_CYCLE_WINDOW: Duration = Duration::from_millis(DUTY_CYCLE_WINDOW_MS);

    /// Duty cycle window in milliseconds
    pub const DUTY_CYCLE_WINDOW_MS: u64 = 2000;

    /// Shortest accepted duty cycle window (SSRs switch on zero crossings)
    pub const MIN_DUTY_CYCLE_WINDOW_MS: u64 = 100;

    /// Default control loop cadence
    pub const POLL_INTERVAL_MS: u64 = 1000;

    /// Fastest accepted control loop cadence
    pub const MIN_POLL_INTERVAL_MS: u64 = 50;
}

/// Limits
pub mod limits {
    /// Maximum configuration file size (1 MB)
    pub const MAX_CONFIG_SIZE: u64 = 1024 * 1024;

    /// Maximum one-wire device id length
    pub const MAX_DEVICE_ID_LENGTH: usize = 64;

    /// Consecutive control failures before all heaters are forced off
    pub const MAX_CONSECUTIVE_ERRORS: u32 = 10;
}
