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

//! Brewberry
//!
//! Mash temperature control for a HERMS brewing rig. Probes are DS18B20
//! one-wire sensors, heaters are switched through solid-state relays driven
//! at a duty-cycled power level.
//!
//! The building blocks live in `bb-core`; this crate wires them together:
//!
//! - `config` - JSON configuration and heater wiring
//! - `brewery` - probe and heater binding, one mash cycle at a time
//! - `control_loop` - periodic mash control with failure handling
//! - `logging` - tracing subscriber setup

pub mod brewery;
pub mod config;
pub mod control_loop;
pub mod logging;

pub use brewery::{spawn_heaters, Brewery};
pub use config::{config_path, load_config, BreweryConfig, HeaterConfig, RelayGroup};
pub use control_loop::{install_signal_handler, run_control_loop, ControlLoopState};
