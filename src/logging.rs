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

//! Logging setup
//!
//! Logs go to the systemd journal when its socket exists, otherwise to stdout.
//! The filter comes from `BREWBERRY_LOG` and defaults to `info`.

use std::path::Path;

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "BREWBERRY_LOG";

const JOURNALD_SOCKET: &str = "/run/systemd/journal/socket";

/// Where log records end up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Journald,
    Stdout,
}

impl LogTarget {
    pub fn describe(&self) -> &'static str {
        match self {
            LogTarget::Journald => "systemd journal",
            LogTarget::Stdout => "stdout",
        }
    }
}

/// Log filter from the environment, or `info`
pub fn log_level() -> String {
    std::env::var(LOG_ENV)
        .ok()
        .filter(|level| !level.trim().is_empty())
        .unwrap_or_else(|| "info".to_string())
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logging(level: &str) -> LogTarget {
    if Path::new(JOURNALD_SOCKET).exists() {
        match tracing_journald::layer() {
            Ok(journald) => {
                tracing_subscriber::registry()
                    .with(journald)
                    .with(EnvFilter::new(level))
                    .init();
                return LogTarget::Journald;
            }
            Err(e) => {
                eprintln!("Failed to create journald layer: {}, falling back to stdout", e);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(EnvFilter::new(level))
        .init();
    LogTarget::Stdout
}
