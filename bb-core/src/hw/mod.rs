//! Hardware interaction modules
//!
//! - `relay` - solid-state relay drivers (sysfs GPIO, in-memory fake)
//! - `probe` - DS18B20 one-wire temperature probes

mod probe;
mod relay;

pub use probe::{discover_probes, Ds18b20Probe, Probe};
pub use relay::{FakeRelay, GpioRelay, Relay, RelayAction, RelayEvent};
