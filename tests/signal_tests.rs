/*
 * Signal handling tests for Brewberry
 *
 * Kept in their own test binary: a process can install the signal handler
 * only once, and a SIGTERM that is not trapped ends the whole binary.
 */

use std::process::Command;
use std::sync::Arc;
use std::time::{Duration, Instant};

use brewberry::{install_signal_handler, ControlLoopState};

fn send_signal(signal: &str) {
    let status = Command::new("kill")
        .args([signal, &std::process::id().to_string()])
        .status()
        .expect("kill should run");
    assert!(status.success());
}

fn wait_for_shutdown(state: &ControlLoopState) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if state.is_shutdown() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn test_sigterm_requests_shutdown() {
    let state = Arc::new(ControlLoopState::new());
    install_signal_handler(state.clone()).unwrap();
    assert!(!state.is_shutdown());

    send_signal("-TERM");
    assert!(wait_for_shutdown(&state), "SIGTERM did not reach the control loop");
}
