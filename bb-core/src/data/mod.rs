//! Data types and validation modules
//!
//! Contains all core data structures shared by the engine and the drivers.

mod types;
mod validation;

pub use types::{Comparison, HeaterName, ProbeName, Readings, Target, Targets};
pub use validation::{
    validate_device_id, validate_duty_window_ms, validate_poll_interval_ms, validate_target,
};
