//! Rumble test

use std::time::{Duration, Instant};

use anyhow::bail;
use padbridge::{KeyboardState, PadDispatch, PadbridgeConfig, Providers};
use padbridge_pad::pad::MAX_PORTS;
use tracing::warn;

use super::CommandResult;

/// Time allowed for the pad to connect before giving up
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Drive both motors of `slot` for `duration_ms`, then stop them
pub fn rumble(
    config: PadbridgeConfig,
    slot: usize,
    large: u8,
    small: bool,
    duration_ms: u64,
) -> CommandResult {
    if slot >= MAX_PORTS {
        bail!("pad slot {slot} out of range (0-{})", MAX_PORTS - 1);
    }

    let mut dispatch = PadDispatch::start(config, || Providers::system(KeyboardState::new()))?;

    let start = Instant::now();
    while !dispatch.slots()[slot].read().is_connected() {
        if start.elapsed() > CONNECT_TIMEOUT {
            warn!("Pad {} did not connect", slot);
            dispatch.stop();
            bail!("pad {slot} is not connected");
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    println!("Rumble on pad {slot}: large={large} small={small} for {duration_ms} ms");
    dispatch.set_rumble(slot, large, small);
    std::thread::sleep(Duration::from_millis(duration_ms));
    dispatch.set_rumble(slot, 0, false);
    // Let the zero request reach the device before teardown
    std::thread::sleep(Duration::from_millis(50));

    dispatch.stop();
    Ok(())
}
