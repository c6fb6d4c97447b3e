//! Foreground pad polling

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use padbridge::{KeyboardState, LogicalPad, PadDispatch, PadbridgeConfig, Providers};
use padbridge_pad::pad::offset;
use tracing::info;

use super::{setup_interrupt_handler, CommandResult};

fn describe(slot: usize, pad: &LogicalPad) -> String {
    format!(
        "pad {slot} [{}] d1={:04x} d2={:04x} ls=({:3},{:3}) rs=({:3},{:3}) battery={}%{}",
        pad.device_name,
        pad.digital(offset::DIGITAL1),
        pad.digital(offset::DIGITAL2),
        pad.analog(offset::ANALOG_LEFT_X),
        pad.analog(offset::ANALOG_LEFT_Y),
        pad.analog(offset::ANALOG_RIGHT_X),
        pad.analog(offset::ANALOG_RIGHT_Y),
        pad.battery_level,
        if pad.cable_state { " (cable)" } else { "" },
    )
}

/// Run the dispatcher and print connected pads until Ctrl+C
pub fn run(config: PadbridgeConfig, interval_ms: u64) -> CommandResult {
    let running = setup_interrupt_handler();
    let mut dispatch = PadDispatch::start(config, || Providers::system(KeyboardState::new()))?;
    let interval = Duration::from_millis(interval_ms.max(1));

    info!("Polling pads. Press Ctrl+C to exit.");
    let mut last_print = Instant::now();
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(10));

        let info = dispatch.get_info();
        if last_print.elapsed() < interval {
            continue;
        }
        last_print = Instant::now();

        println!("{} of {} pads connected", info.now_connect, info.max_connect);
        for (slot, pad) in dispatch.get_pads().iter().enumerate() {
            if pad.is_connected() {
                println!("  {}", describe(slot, pad));
            }
        }
    }

    dispatch.stop();
    Ok(())
}
