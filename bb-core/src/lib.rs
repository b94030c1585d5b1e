//! Brewberry Core Library
//!
//! Temperature control for a HERMS brewing rig driven through solid-state relays.
//!
//! # Module Structure
//!
//! - `data/` - Probe and heater identities, target bands, validation
//! - `engine/` - Mash temperature decision engine
//! - `heater/` - Power levels and the duty-cycle driver
//! - `hw/` - Relay and probe drivers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bb_core::{constants::timing, DutyCycleDriver, FakeRelay};
//!
//! # async fn run() -> bb_error::Result<()> {
//! let driver = DutyCycleDriver::spawn("HLT", Arc::new(FakeRelay::new()), timing::DUTY_CYCLE_WINDOW);
//! driver.set_power(25)?;
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod data;
pub mod engine;
pub mod heater;
pub mod hw;

pub use bb_error::{BrewError, Result};

pub use data::{
    validate_device_id, validate_duty_window_ms, validate_poll_interval_ms, validate_target,
    Comparison, HeaterName, ProbeName, Readings, Target, Targets,
};

pub use engine::{compare, decide, Decision, Rule};

pub use heater::{check_off_delay, DriverState, DutyCycleDriver, DutyFn, PowerLevel, RelayHealth};

pub use hw::{
    discover_probes, Ds18b20Probe, FakeRelay, GpioRelay, Probe, Relay, RelayAction, RelayEvent,
};
