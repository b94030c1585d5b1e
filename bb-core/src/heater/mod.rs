//! Heater power control
//!
//! - `power` - validated 0-100 power levels
//! - `driver` - duty-cycle driver that time-slices a binary relay

mod driver;
mod power;

pub use driver::{check_off_delay, DriverState, DutyCycleDriver, DutyFn, RelayHealth};
pub use power::PowerLevel;
