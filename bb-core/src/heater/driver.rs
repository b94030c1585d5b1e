//! Duty-cycle driver (hardened)
//!
//! Approximates an analog power level on a relay that can only be on or off.
//! Once per fixed window the relay is switched on, and an off command is
//! scheduled after `window * level / 100`.
//!
//! # Tasks
//! - **Relay actor**: the only task that touches the relay. Commands arrive on
//!   one channel, so an off command queued before an on command is always
//!   applied first.
//! - **Cycle task**: runs while the driver is `Active`. Reads the level at the
//!   start of each window, switches the relay on, arms the off timer and sleeps
//!   out the full window.
//! - **Off timer**: one per window. Sleeps for the on-time, then queues `Off`.
//!   The cycle task waits for it before starting the next window.
//!
//! # Safety Features
//! - **Validated levels**: out-of-range requests are rejected and force the relay off
//! - **Window-aligned changes**: a new level applies from the next window
//! - **Fault latch**: an off-delay longer than the window forces the relay off
//!   and parks the driver in `Faulted` for good
//! - **Drop safety**: dropping the driver stops the cycle and switches the relay off

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, error, info, warn};

use bb_error::{BrewError, Result};

use crate::heater::PowerLevel;
use crate::hw::Relay;

/// Lifecycle of a driver's cycling process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// No cycle task running. The relay is off.
    Idle,
    /// Cycle task running
    Active,
    /// An internal invariant broke. The relay was forced off and the driver
    /// refuses further power requests.
    Faulted,
}

/// Relay I/O outcome as seen by the relay actor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayHealth {
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub last_error: Option<String>,
}

/// On-time of one window for a level
pub type DutyFn = fn(&PowerLevel, Duration) -> Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayCommand {
    On,
    Off,
}

struct Control {
    level: PowerLevel,
    state: DriverState,
    cycle: Option<JoinHandle<()>>,
    /// Set while `shutdown` waits for the cycle task
    stopping: bool,
}

struct Shared {
    name: String,
    window: Duration,
    duty: DutyFn,
    control: Mutex<Control>,
    commands: mpsc::UnboundedSender<RelayCommand>,
}

impl Shared {
    fn send(&self, command: RelayCommand) {
        if self.commands.send(command).is_err() {
            error!(heater = %self.name, ?command, "Relay actor is gone; command dropped");
        }
    }

    /// Latch the fault state and force the relay off
    fn fault(&self, err: &BrewError) {
        {
            let mut control = self.control.lock();
            control.state = DriverState::Faulted;
            control.level = PowerLevel::OFF;
            control.cycle = None;
        }
        self.send(RelayCommand::Off);
        error!(heater = %self.name, error = %err, "Duty-cycle driver faulted; relay forced off");
    }
}

/// Reject an off-delay that would exceed 100% duty.
///
/// Validated power levels never produce one. Getting an error here means a
/// logic defect upstream.
pub fn check_off_delay(delay: Duration, window: Duration) -> Result<Duration> {
    if delay > window {
        return Err(BrewError::invariant(format!(
            "off delay {:?} exceeds duty cycle window {:?}",
            delay, window
        )));
    }
    Ok(delay)
}

/// Drives one relay at a continuously updatable power level
pub struct DutyCycleDriver {
    shared: Arc<Shared>,
    health: Arc<Mutex<RelayHealth>>,
    runtime: Handle,
}

impl DutyCycleDriver {
    /// Create an idle driver that exclusively owns `relay`.
    ///
    /// Must be called from within a Tokio runtime; the relay actor and later
    /// cycle tasks are spawned on it.
    pub fn spawn(name: impl Into<String>, relay: Arc<dyn Relay>, window: Duration) -> Self {
        Self::spawn_with_duty(name, relay, window, PowerLevel::duty_duration)
    }

    /// Like `spawn`, with the per-window on-time computed by `duty`.
    ///
    /// An on-time longer than the window faults the driver.
    #[doc(hidden)]
    pub fn spawn_with_duty(
        name: impl Into<String>,
        relay: Arc<dyn Relay>,
        window: Duration,
        duty: DutyFn,
    ) -> Self {
        let name = name.into();
        let runtime = Handle::current();
        let (tx, rx) = mpsc::unbounded_channel();
        let health = Arc::new(Mutex::new(RelayHealth::default()));

        runtime.spawn(run_relay_actor(name.clone(), relay, rx, health.clone()));

        info!(heater = %name, window_ms = window.as_millis() as u64, "Duty-cycle driver ready");

        Self {
            shared: Arc::new(Shared {
                name,
                window,
                duty,
                control: Mutex::new(Control {
                    level: PowerLevel::OFF,
                    state: DriverState::Idle,
                    cycle: None,
                    stopping: false,
                }),
                commands: tx,
            }),
            health,
            runtime,
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn window(&self) -> Duration {
        self.shared.window
    }

    /// Request a new power level.
    ///
    /// The level is validated first. A rejected level leaves the current level
    /// untouched and forces the relay off; the cycle keeps running at the old
    /// level from the next window. An accepted level applies from the next
    /// window boundary. A non-zero level starts the cycle if the driver is idle.
    pub fn set_power(&self, requested: i32) -> Result<()> {
        let level = match PowerLevel::new(requested) {
            Ok(level) => level,
            Err(e) => {
                warn!(heater = %self.shared.name, requested, "Rejected power level; forcing relay off");
                self.shared.send(RelayCommand::Off);
                return Err(e);
            }
        };

        let mut control = self.shared.control.lock();
        if control.state != DriverState::Faulted && control.stopping && !level.is_off() {
            return Err(BrewError::DriverStopping(self.shared.name.clone()));
        }
        match control.state {
            DriverState::Faulted => {
                return Err(BrewError::DriverFaulted(self.shared.name.clone()));
            }
            DriverState::Idle if !level.is_off() => {
                debug!(heater = %self.shared.name, %level, "Starting duty cycle");
                control.state = DriverState::Active;
                control.cycle = Some(self.runtime.spawn(run_cycle(self.shared.clone())));
            }
            DriverState::Idle | DriverState::Active => {}
        }

        if control.level != level {
            debug!(heater = %self.shared.name, from = %control.level, to = %level, "Power level changed");
        }
        control.level = level;
        Ok(())
    }

    /// Last accepted power level
    pub fn current_power(&self) -> PowerLevel {
        self.shared.control.lock().level
    }

    pub fn state(&self) -> DriverState {
        self.shared.control.lock().state
    }

    pub fn is_faulted(&self) -> bool {
        self.state() == DriverState::Faulted
    }

    pub fn relay_health(&self) -> RelayHealth {
        self.health.lock().clone()
    }

    /// Stop cycling, switch the relay off and wait for the cycle task to finish.
    ///
    /// Non-zero levels are rejected with `DriverStopping` until the cycle task
    /// has ended. An off timer already in flight still runs to completion.
    pub async fn shutdown(&self) {
        let cycle = {
            let mut control = self.shared.control.lock();
            control.level = PowerLevel::OFF;
            control.stopping = true;
            control.cycle.take()
        };
        self.shared.send(RelayCommand::Off);

        if let Some(cycle) = cycle {
            if let Err(e) = cycle.await {
                error!(heater = %self.shared.name, error = %e, "Cycle task ended abnormally");
            }
        }
        self.shared.control.lock().stopping = false;
        info!(heater = %self.shared.name, "Duty-cycle driver stopped");
    }
}

impl Drop for DutyCycleDriver {
    fn drop(&mut self) {
        self.shared.control.lock().level = PowerLevel::OFF;
        self.shared.send(RelayCommand::Off);
    }
}

/// Cycling process: one iteration per window until the level reads zero
async fn run_cycle(shared: Arc<Shared>) {
    loop {
        let window_start = Instant::now();

        let level = {
            let mut control = shared.control.lock();
            if control.state == DriverState::Faulted {
                return;
            }
            if control.level.is_off() {
                // The relay is already off: the previous off timer was awaited.
                control.state = DriverState::Idle;
                control.cycle = None;
                debug!(heater = %shared.name, "Power level is zero; duty cycle idle");
                return;
            }
            control.level
        };

        let delay = match check_off_delay((shared.duty)(&level, shared.window), shared.window) {
            Ok(delay) => delay,
            Err(e) => {
                shared.fault(&e);
                return;
            }
        };

        shared.send(RelayCommand::On);
        let off_timer = arm_off_timer(shared.commands.clone(), delay);

        sleep_until(window_start + shared.window).await;

        // The off command must be queued before the next window's on command.
        if let Err(e) = off_timer.await {
            error!(heater = %shared.name, error = %e, "Off timer failed; forcing relay off");
            shared.send(RelayCommand::Off);
        }
    }
}

/// Queue an off command after `delay`
fn arm_off_timer(commands: mpsc::UnboundedSender<RelayCommand>, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep(delay).await;
        // A closed channel means the driver is gone and its drop already sent Off.
        let _ = commands.send(RelayCommand::Off);
    })
}

/// Apply relay commands in arrival order until every sender is dropped
async fn run_relay_actor(
    name: String,
    relay: Arc<dyn Relay>,
    mut commands: mpsc::UnboundedReceiver<RelayCommand>,
    health: Arc<Mutex<RelayHealth>>,
) {
    while let Some(command) = commands.recv().await {
        let relay = relay.clone();
        let result = tokio::task::spawn_blocking(move || match command {
            RelayCommand::On => relay.turn_on(),
            RelayCommand::Off => relay.turn_off(),
        })
        .await
        .unwrap_or_else(|e| Err(BrewError::invariant(format!("relay task panicked: {}", e))));

        let mut status = health.lock();
        match result {
            Ok(()) => {
                if status.consecutive_failures > 0 {
                    debug!(heater = %name, failures = status.consecutive_failures, "Relay recovered");
                }
                status.consecutive_failures = 0;
            }
            Err(e) => {
                status.consecutive_failures += 1;
                status.total_failures += 1;
                status.last_error = Some(e.to_string());
                warn!(heater = %name, ?command, error = %e, "Relay command failed");
            }
        }
    }
    debug!(heater = %name, "Relay actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::{FakeRelay, RelayAction};

    const WINDOW: Duration = Duration::from_secs(2);

    fn driver() -> (DutyCycleDriver, Arc<FakeRelay>) {
        let relay = Arc::new(FakeRelay::new());
        let driver = DutyCycleDriver::spawn("HLT", relay.clone(), WINDOW);
        (driver, relay)
    }

    /// Total on-time between paired On/Off events
    fn on_time(relay: &FakeRelay) -> Duration {
        let mut total = Duration::ZERO;
        let mut on_since = None;
        for event in relay.events() {
            match event.action {
                RelayAction::On => on_since = on_since.or(Some(event.at)),
                RelayAction::Off => {
                    if let Some(start) = on_since.take() {
                        total += event.at - start;
                    }
                }
            }
        }
        total
    }

    #[test]
    fn test_check_off_delay() {
        assert!(check_off_delay(Duration::ZERO, WINDOW).is_ok());
        assert!(check_off_delay(WINDOW, WINDOW).is_ok());
        let err = check_off_delay(WINDOW + Duration::from_millis(1), WINDOW).unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_idle() {
        let (driver, relay) = driver();
        assert_eq!(driver.state(), DriverState::Idle);
        assert_eq!(driver.current_power(), PowerLevel::OFF);
        sleep(WINDOW * 3).await;
        assert!(relay.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_duty_fraction_matches_level() {
        for level in [1, 25, 50, 75, 99] {
            let (driver, relay) = driver();
            let start = Instant::now();
            driver.set_power(level).unwrap();
            sleep(WINDOW * 10).await;

            let expected = WINDOW * 10 * level as u32 / 100;
            let measured = on_time(&relay);
            let error = if measured > expected { measured - expected } else { expected - measured };
            assert!(
                error <= WINDOW,
                "level {}: expected ~{:?}, measured {:?}",
                level,
                expected,
                measured
            );
            assert!(relay.events()[0].at - start < Duration::from_millis(1));
            driver.shutdown().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_overlap_for_all_levels() {
        for level in 1..=100 {
            let (driver, relay) = driver();
            driver.set_power(level).unwrap();
            sleep(WINDOW * 3 + Duration::from_millis(10)).await;
            driver.shutdown().await;

            let events = relay.events();
            assert!(!events.is_empty());
            // Strict alternation: every On is followed by its Off before the next On.
            for pair in events.windows(2) {
                if pair[1].action == RelayAction::On {
                    assert_eq!(pair[0].action, RelayAction::Off, "overlap at level {}", level);
                }
            }
            assert_eq!(events.last().map(|e| e.action), Some(RelayAction::Off));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_power_turns_off_every_window() {
        let (driver, relay) = driver();
        driver.set_power(100).unwrap();
        sleep(WINDOW + Duration::from_millis(10)).await;

        let ons = relay.count(RelayAction::On);
        let offs = relay.count(RelayAction::Off);
        assert_eq!(ons, 2);
        assert_eq!(offs, 1);
        driver.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_level_change_applies_next_window() {
        let (driver, relay) = driver();
        let start = Instant::now();
        driver.set_power(25).unwrap();

        sleep(Duration::from_millis(100)).await;
        driver.set_power(75).unwrap();
        assert_eq!(driver.current_power(), PowerLevel::HIGH);

        sleep(WINDOW * 2 - Duration::from_millis(200)).await;
        let events = relay.events();
        // First window still used 25%: off at 500ms.
        assert_eq!(events[1].action, RelayAction::Off);
        assert_eq!(events[1].at - start, Duration::from_millis(500));
        // Second window uses 75%: on at 2s, off at 3.5s.
        assert_eq!(events[2].at - start, WINDOW);
        assert_eq!(events[3].at - start, Duration::from_millis(3500));
        driver.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_stops_by_next_window() {
        let (driver, relay) = driver();
        driver.set_power(50).unwrap();
        sleep(Duration::from_millis(1500)).await;

        driver.set_power(0).unwrap();
        sleep(WINDOW * 3).await;

        assert_eq!(driver.state(), DriverState::Idle);
        assert_eq!(relay.count(RelayAction::On), 1);
        assert_eq!(relay.count(RelayAction::Off), 1);
        assert!(!relay.is_on());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restarts_after_idle() {
        let (driver, relay) = driver();
        driver.set_power(50).unwrap();
        driver.set_power(0).unwrap();
        sleep(WINDOW * 2).await;
        assert_eq!(driver.state(), DriverState::Idle);

        driver.set_power(50).unwrap();
        assert_eq!(driver.state(), DriverState::Active);
        sleep(WINDOW / 4).await;
        assert!(relay.is_on());
        driver.shutdown().await;
        assert!(!relay.is_on());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_level_rejected_and_forces_off() {
        let (driver, relay) = driver();
        driver.set_power(50).unwrap();
        sleep(Duration::from_millis(100)).await;
        assert!(relay.is_on());

        assert!(matches!(
            driver.set_power(101),
            Err(BrewError::InvalidPowerLevel { value: 101 })
        ));
        assert!(driver.set_power(-5).is_err());
        assert_eq!(driver.current_power(), PowerLevel::MED);

        sleep(Duration::from_millis(1)).await;
        assert!(!relay.is_on());
        assert_eq!(driver.state(), DriverState::Active);

        // The old level keeps cycling from the next window.
        sleep(WINDOW).await;
        assert_eq!(relay.count(RelayAction::On), 2);
        driver.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_relay_failures_are_reported() {
        let (driver, relay) = driver();
        relay.set_failing(true);
        driver.set_power(50).unwrap();
        sleep(WINDOW + Duration::from_millis(10)).await;

        let health = driver.relay_health();
        assert!(health.consecutive_failures >= 2);
        assert!(health.last_error.is_some());
        assert_eq!(driver.state(), DriverState::Active);

        relay.set_failing(false);
        sleep(WINDOW).await;
        assert_eq!(driver.relay_health().consecutive_failures, 0);
        driver.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_latches_and_forces_off() {
        let (driver, relay) = driver();
        driver.set_power(50).unwrap();
        sleep(Duration::from_millis(100)).await;

        driver
            .shared
            .fault(&BrewError::invariant("off delay exceeds window"));
        sleep(Duration::from_millis(1)).await;

        assert_eq!(driver.state(), DriverState::Faulted);
        assert!(!relay.is_on());
        assert!(matches!(driver.set_power(50), Err(BrewError::DriverFaulted(_))));

        sleep(WINDOW * 2).await;
        assert_eq!(relay.count(RelayAction::On), 1);
    }

    fn overrun(_level: &PowerLevel, window: Duration) -> Duration {
        window * 2
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlong_on_time_faults_before_switching_on() {
        let relay = Arc::new(FakeRelay::new());
        let driver = DutyCycleDriver::spawn_with_duty("HLT", relay.clone(), WINDOW, overrun);

        driver.set_power(50).unwrap();
        sleep(Duration::from_millis(10)).await;

        assert!(driver.is_faulted());
        assert_eq!(driver.current_power(), PowerLevel::OFF);
        assert_eq!(relay.count(RelayAction::On), 0);
        assert_eq!(relay.count(RelayAction::Off), 1);
        assert!(matches!(driver.set_power(25), Err(BrewError::DriverFaulted(_))));

        sleep(WINDOW * 2).await;
        assert_eq!(relay.count(RelayAction::On), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_levels_rejected_while_shutting_down() {
        let (driver, relay) = driver();
        driver.set_power(50).unwrap();
        sleep(Duration::from_millis(100)).await;

        let (_, during) = tokio::join!(driver.shutdown(), async {
            sleep(Duration::from_millis(10)).await;
            let rejected = driver.set_power(75);
            let zero = driver.set_power(0);
            (rejected, zero)
        });
        assert!(matches!(during.0, Err(BrewError::DriverStopping(_))));
        assert!(during.1.is_ok());

        assert_eq!(driver.state(), DriverState::Idle);
        assert_eq!(driver.current_power(), PowerLevel::OFF);
        sleep(WINDOW * 2).await;
        assert!(!relay.is_on());
        assert_eq!(relay.count(RelayAction::On), 1);

        // Once stopped, the driver can be started again.
        driver.set_power(25).unwrap();
        assert_eq!(driver.state(), DriverState::Active);
        driver.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_setters() {
        let (driver, _relay) = driver();
        let driver = Arc::new(driver);

        let mut handles = Vec::new();
        for level in [10, 20, 30, 40] {
            let driver = driver.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..50 {
                    driver.set_power(level).unwrap();
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let level = driver.current_power().percent();
        assert!([10, 20, 30, 40].contains(&level));
        driver.shutdown().await;
    }
}
