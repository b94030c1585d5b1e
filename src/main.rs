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

//! brewberryd - mash temperature control daemon

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use bb_core::constants::paths;
use bb_core::{discover_probes, FakeRelay, GpioRelay, Relay};
use brewberry::config::{config_path, load_config, BreweryConfig};
use brewberry::logging::{init_logging, log_level};
use brewberry::{install_signal_handler, run_control_loop, spawn_heaters, Brewery, ControlLoopState};

const VERSION: &str = env!("CARGO_PKG_VERSION");

struct Options {
    config: PathBuf,
    list_probes: bool,
    dry_run: bool,
}

enum Command {
    Run(Options),
    Exit,
}

fn parse_args(args: &[String]) -> Result<Command> {
    let mut options = Options {
        config: config_path(),
        list_probes: false,
        dry_run: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                return Ok(Command::Exit);
            }
            "-v" | "--version" => {
                print_version();
                return Ok(Command::Exit);
            }
            "-c" | "--config" => {
                i += 1;
                let path = args
                    .get(i)
                    .context("--config requires a path argument")?;
                options.config = PathBuf::from(path);
            }
            "--list-probes" => options.list_probes = true,
            "--dry-run" => options.dry_run = true,
            arg => {
                print_help();
                anyhow::bail!("Unknown argument: {}", arg);
            }
        }
        i += 1;
    }

    Ok(Command::Run(options))
}

fn print_help() {
    eprintln!("brewberryd {} - HERMS mash temperature controller", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    brewberryd [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -c, --config PATH   Configuration file (default /etc/brewberry/brewery.json)");
    eprintln!("        --list-probes   Print attached one-wire probes and exit");
    eprintln!("        --dry-run       Log relay switching instead of driving GPIO");
    eprintln!("    -v, --version       Print version");
    eprintln!("    -h, --help          Print this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    BREWBERRY_CONFIG    Configuration file, overridden by --config");
    eprintln!("    BREWBERRY_LOG       Log level (trace, debug, info, warn, error)");
}

fn print_version() {
    println!("brewberryd {}", VERSION);
}

fn list_probes(w1_base: &Path) -> Result<()> {
    let probes = discover_probes(w1_base)
        .with_context(|| format!("Failed to list probes under {}", w1_base.display()))?;

    let mut ids: Vec<&String> = probes.keys().collect();
    ids.sort();
    for id in ids {
        match probes[id].read_celsius() {
            Ok(celsius) => println!("{}\t{:.3}°C", id, celsius),
            Err(e) => println!("{}\tunreadable ({})", id, e),
        }
    }
    Ok(())
}

async fn run(options: &Options) -> Result<()> {
    let config: BreweryConfig = load_config(&options.config)
        .with_context(|| format!("Failed to load {}", options.config.display()))?;

    let discovered = discover_probes(&config.w1_base).context("Probe discovery failed")?;
    info!(count = discovered.len(), "One-wire probes discovered");

    let groups = config.relay_groups();
    let heaters = spawn_heaters(&groups, config.duty_window(), |group| {
        let relay: Arc<dyn Relay> = if options.dry_run {
            info!(heaters = %group.label(), gpio = group.gpio, "Dry run: relay is simulated");
            Arc::new(FakeRelay::new())
        } else {
            Arc::new(GpioRelay::open(&config.gpio_base, group.gpio)?)
        };
        Ok(relay)
    })
    .context("Failed to set up heater relays")?;

    let brewery = Brewery::assemble(&config.probes, &discovered, heaters)
        .context("Failed to bind probes")?;

    // Without the handler a SIGTERM would leave a relay energised.
    let state = Arc::new(ControlLoopState::new());
    if let Err(e) = install_signal_handler(state.clone()) {
        brewery.shutdown().await;
        anyhow::bail!("Failed to set signal handler: {}", e);
    }

    let result = run_control_loop(&brewery, &config.targets, config.poll_interval(), state).await;
    brewery.shutdown().await;
    result.context("Mash control stopped")
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let options = match parse_args(&args) {
        Ok(Command::Run(options)) => options,
        Ok(Command::Exit) => return,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let level = log_level();
    let target = init_logging(&level);
    info!("STARTUP: brewberryd {} starting", VERSION);
    info!("STARTUP: Logging to {}", target.describe());

    if options.list_probes {
        let w1_base = load_config(&options.config)
            .map(|c| c.w1_base)
            .unwrap_or_else(|_| PathBuf::from(paths::W1_DEVICES));
        if let Err(e) = list_probes(&w1_base) {
            error!("{:#}", e);
            std::process::exit(1);
        }
        return;
    }

    if options.dry_run {
        warn!("STARTUP: Dry run, no GPIO pin will be driven");
    }

    if let Err(e) = run(&options).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
    info!("SHUTDOWN: brewberryd stopped");
}
