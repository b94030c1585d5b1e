//! Control engine modules
//!
//! Contains the mash temperature decision engine.

mod decision;

pub use decision::{compare, decide, Decision, Rule};
