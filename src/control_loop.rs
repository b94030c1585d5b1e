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

//! Mash control loop
//!
//! Runs one mash management cycle per poll interval until shutdown.
//! SIGINT, SIGTERM and SIGHUP request shutdown through `install_signal_handler`.
//!
//! # Safety Features
//! - **No stale commands**: a failed read or decision never touches a heater
//! - **Error counting**: after `MAX_CONSECUTIVE_ERRORS` failed cycles in a row
//!   every heater is switched off until a cycle succeeds again
//! - **Fatal errors**: a faulted driver or broken invariant stops the loop with
//!   every heater off

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, error, info, info_span, warn, Instrument};

use bb_core::constants::limits::MAX_CONSECUTIVE_ERRORS;
use bb_core::Targets;
use bb_error::{BrewError, Result};

use crate::brewery::Brewery;

/// Shared state between the control loop and whoever stops it
#[derive(Debug, Default)]
pub struct ControlLoopState {
    shutdown: AtomicBool,
    wake: Notify,
}

impl ControlLoopState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop and wake it if it is sleeping
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Route SIGINT, SIGTERM and SIGHUP to `state.request_shutdown()`.
///
/// Only one handler can be installed per process.
pub fn install_signal_handler(state: Arc<ControlLoopState>) -> std::result::Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        info!("SIGNAL: Received termination signal - stopping heaters");
        state.request_shutdown();
    })
}

/// Run the control loop until shutdown is requested or a fatal error occurs.
///
/// Heaters are left running on a normal return; the caller stops them with
/// `Brewery::shutdown`.
pub async fn run_control_loop(
    brewery: &Brewery,
    targets: &Targets,
    poll_interval: Duration,
    state: Arc<ControlLoopState>,
) -> Result<()> {
    info!(poll_ms = poll_interval.as_millis() as u64, "Mash control loop starting");

    let mut consecutive_errors: u32 = 0;
    let mut relay_failures: u64 = 0;
    let mut cycle: u64 = 0;

    loop {
        if state.is_shutdown() {
            info!("Mash control loop shutting down");
            break;
        }

        if let Some(heater) = brewery.faulted_heater() {
            error!(heater = %heater, "Heater driver faulted; stopping control loop");
            brewery.all_off();
            return Err(BrewError::DriverFaulted(heater));
        }

        cycle += 1;
        let outcome = brewery
            .manage_mash(targets)
            .instrument(info_span!("brewery", cycle))
            .await;

        match outcome {
            Ok(decision) => {
                if consecutive_errors > 0 {
                    info!(failures = consecutive_errors, rule = %decision.rule, "Control loop recovered");
                    consecutive_errors = 0;
                }
            }
            Err(e) if e.is_fatal() => {
                error!(error = %e, "Fatal control error; switching all heaters off");
                brewery.all_off();
                return Err(e);
            }
            Err(e) => {
                consecutive_errors += 1;

                if consecutive_errors == 1 || consecutive_errors % MAX_CONSECUTIVE_ERRORS == 0 {
                    error!(count = consecutive_errors, error = %e, "Mash cycle failed");
                }

                if consecutive_errors == MAX_CONSECUTIVE_ERRORS {
                    warn!("Too many consecutive errors; switching all heaters off");
                    brewery.all_off();
                }
            }
        }

        let failures: u64 = brewery
            .drivers()
            .iter()
            .map(|d| d.relay_health().total_failures)
            .sum();
        if failures > relay_failures {
            warn!(new = failures - relay_failures, total = failures, "Relay writes failed since last cycle");
            relay_failures = failures;
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = state.wake.notified() => {
                debug!("Control loop woken up");
            }
        }
    }

    info!("Mash control loop stopped");
    Ok(())
}
