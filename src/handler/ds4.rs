//! DualShock 4 backend over raw HID

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use padbridge_hid::calibration::{ACC_RES_PER_G, GYRO_RES_PER_DEG_S};
use padbridge_hid::protocol::{TOUCHPAD_HEIGHT, TOUCHPAD_WIDTH};
use padbridge_hid::{Connection, Ds4InputState, Ds4Session, HidProvider, OutputState, DS4_IDS};
use padbridge_pad::config::{HandlerKind, PadProfile};
use padbridge_pad::pad::{capability, offset, KeyCode};
use padbridge_pad::signal::{clamp_0_to_1023, clamp_0_to_255, scale_stick_input, AxisLimits};
use tracing::{info, warn};

use super::{resolve_layout, Binding};
use crate::dispatch::SharedPad;

/// Interval between scans for hot-plugged controllers
pub const ENUMERATE_INTERVAL: Duration = Duration::from_secs(2);

/// Sensor units per g on the logical pad
const MOTION_ONE_G: f32 = 113.0;

const CAPABILITY: u32 = capability::PS3_CONFORMITY
    | capability::PRESS_MODE
    | capability::HP_ANALOG_STICK
    | capability::ACTUATOR
    | capability::SENSOR_MODE;

/// Battery indicator ramp, 0xRRGG per raw battery level
const BATTERY_COLORS: [u16; 12] = [
    0xff00, 0xff33, 0xff66, 0xff99, 0xffcc, 0xffff, 0xccff, 0x99ff, 0x66ff, 0x33ff, 0x00ff, 0x00ff,
];

/// DS4 keycodes
pub mod key {
    use padbridge_pad::pad::KeyCode;

    pub const TRIANGLE: KeyCode = 1;
    pub const CIRCLE: KeyCode = 2;
    pub const CROSS: KeyCode = 3;
    pub const SQUARE: KeyCode = 4;
    pub const L1: KeyCode = 5;
    pub const L2: KeyCode = 6;
    pub const L3: KeyCode = 7;
    pub const R1: KeyCode = 8;
    pub const R2: KeyCode = 9;
    pub const R3: KeyCode = 10;
    pub const OPTIONS: KeyCode = 11;
    pub const SHARE: KeyCode = 12;
    pub const PS: KeyCode = 13;
    pub const TOUCHPAD: KeyCode = 14;
    pub const TOUCH_L: KeyCode = 15;
    pub const TOUCH_R: KeyCode = 16;
    pub const TOUCH_U: KeyCode = 17;
    pub const TOUCH_D: KeyCode = 18;
    pub const UP: KeyCode = 19;
    pub const DOWN: KeyCode = 20;
    pub const LEFT: KeyCode = 21;
    pub const RIGHT: KeyCode = 22;
    pub const LSX_NEG: KeyCode = 23;
    pub const LSX_POS: KeyCode = 24;
    pub const LSY_NEG: KeyCode = 25;
    pub const LSY_POS: KeyCode = 26;
    pub const RSX_NEG: KeyCode = 27;
    pub const RSX_POS: KeyCode = 28;
    pub const RSY_NEG: KeyCode = 29;
    pub const RSY_POS: KeyCode = 30;
}

const KEY_NAMES: &[(KeyCode, &str)] = &[
    (key::TRIANGLE, "Triangle"),
    (key::CIRCLE, "Circle"),
    (key::CROSS, "Cross"),
    (key::SQUARE, "Square"),
    (key::L1, "L1"),
    (key::L2, "L2"),
    (key::L3, "L3"),
    (key::R1, "R1"),
    (key::R2, "R2"),
    (key::R3, "R3"),
    (key::OPTIONS, "Options"),
    (key::SHARE, "Share"),
    (key::PS, "PS Button"),
    (key::TOUCHPAD, "Touch Pad"),
    (key::TOUCH_L, "Touch Left"),
    (key::TOUCH_R, "Touch Right"),
    (key::TOUCH_U, "Touch Up"),
    (key::TOUCH_D, "Touch Down"),
    (key::UP, "Up"),
    (key::DOWN, "Down"),
    (key::LEFT, "Left"),
    (key::RIGHT, "Right"),
    (key::LSX_NEG, "LS X-"),
    (key::LSX_POS, "LS X+"),
    (key::LSY_NEG, "LS Y-"),
    (key::LSY_POS, "LS Y+"),
    (key::RSX_NEG, "RS X-"),
    (key::RSX_POS, "RS X+"),
    (key::RSY_NEG, "RS Y-"),
    (key::RSY_POS, "RS Y+"),
];

fn key_code(name: &str) -> Option<KeyCode> {
    KEY_NAMES.iter().find(|(_, n)| *n == name).map(|(code, _)| *code)
}

fn pressed(value: bool) -> u16 {
    if value {
        255
    } else {
        0
    }
}

/// Negative and positive halves of a centered 8-bit axis
fn axis_halves(value: u8) -> (u16, u16) {
    let v = f32::from(value);
    (
        clamp_0_to_255((127.5 - v) * 2.0),
        clamp_0_to_255((v - 127.5) * 2.0),
    )
}

/// Backend key table for one decoded report
pub fn button_values(input: &Ds4InputState) -> HashMap<KeyCode, u16> {
    let mut values = HashMap::with_capacity(KEY_NAMES.len());

    let (lx_neg, lx_pos) = axis_halves(input.left_x);
    let (ly_up, ly_down) = axis_halves(input.left_y);
    let (rx_neg, rx_pos) = axis_halves(input.right_x);
    let (ry_up, ry_down) = axis_halves(input.right_y);
    values.insert(key::LSX_NEG, lx_neg);
    values.insert(key::LSX_POS, lx_pos);
    // Raw Y grows downwards
    values.insert(key::LSY_NEG, ly_down);
    values.insert(key::LSY_POS, ly_up);
    values.insert(key::RSX_NEG, rx_neg);
    values.insert(key::RSX_POS, rx_pos);
    values.insert(key::RSY_NEG, ry_down);
    values.insert(key::RSY_POS, ry_up);

    values.insert(key::UP, pressed(input.dpad.up));
    values.insert(key::DOWN, pressed(input.dpad.down));
    values.insert(key::LEFT, pressed(input.dpad.left));
    values.insert(key::RIGHT, pressed(input.dpad.right));

    values.insert(key::SQUARE, pressed(input.square));
    values.insert(key::CROSS, pressed(input.cross));
    values.insert(key::CIRCLE, pressed(input.circle));
    values.insert(key::TRIANGLE, pressed(input.triangle));
    values.insert(key::L1, pressed(input.l1));
    values.insert(key::R1, pressed(input.r1));
    values.insert(key::SHARE, pressed(input.share));
    values.insert(key::OPTIONS, pressed(input.options));
    values.insert(key::L3, pressed(input.l3));
    values.insert(key::R3, pressed(input.r3));
    values.insert(key::PS, pressed(input.ps));
    values.insert(key::TOUCHPAD, pressed(input.touchpad));
    values.insert(key::L2, u16::from(input.l2));
    values.insert(key::R2, u16::from(input.r2));

    // Last active contact wins
    if let Some(touch) = input.touches.last() {
        let x = scale_stick_input(i32::from(touch.x), 0, i32::from(TOUCHPAD_WIDTH));
        let y = scale_stick_input(i32::from(touch.y), 0, i32::from(TOUCHPAD_HEIGHT));
        values.insert(key::TOUCH_L, clamp_0_to_255((127.5 - x) * 2.0));
        values.insert(key::TOUCH_R, clamp_0_to_255((x - 127.5) * 2.0));
        values.insert(key::TOUCH_U, clamp_0_to_255((127.5 - y) * 2.0));
        values.insert(key::TOUCH_D, clamp_0_to_255((y - 127.5) * 2.0));
    }

    values
}

/// Logical sensor values: accel X/Y/Z and gyro yaw
pub fn sensor_values(input: &Ds4InputState) -> [u16; 4] {
    let accel = |raw: i16| {
        let g = -f32::from(raw) / ACC_RES_PER_G as f32;
        clamp_0_to_1023(g * MOTION_ONE_G + 512.0)
    };
    let yaw = -f32::from(input.gyro[1]) / GYRO_RES_PER_DEG_S as f32;
    [
        accel(input.accel[0]),
        accel(input.accel[1]),
        accel(input.accel[2]),
        clamp_0_to_1023(yaw * (123.0 / 90.0) + 512.0),
    ]
}

/// LED color for a raw battery level, scaled by `brightness` percent
pub fn battery_color(level: u8, brightness: u8) -> [u8; 3] {
    let color = BATTERY_COLORS
        .get(usize::from(level))
        .copied()
        .unwrap_or(BATTERY_COLORS[0]);
    let scale = |c: u16| (u32::from(c) * u32::from(brightness) / 100).min(255) as u8;
    [scale(color >> 8), scale(color & 0xff), 0]
}

/// Output state the binding wants, derived from the profile and session
fn desired_output(binding: &Binding, session: &Ds4Session) -> OutputState {
    let profile = &binding.profile;
    let [large, small] = binding.motor_speeds();
    let mut output = session.output();
    output.large_motor = large;
    output.small_motor = small;

    let [red, green, blue] = if profile.led_battery_indicator {
        battery_color(
            session.battery_level(),
            profile.led_battery_indicator_brightness,
        )
    } else {
        profile.led_color
    };
    output.red = red;
    output.green = green;
    output.blue = blue;

    if profile.led_low_battery_blink {
        let wireless = !session.cable_state();
        let low_battery = session.battery_level() < 2;
        let (on, off) = if wireless && low_battery { (100, 100) } else { (0, 0) };
        output.blink_on = on;
        output.blink_off = off;
    }
    output
}

struct Ds4Device {
    name: String,
    session: Ds4Session,
    binding: Option<Binding>,
}

pub struct Ds4Handler {
    provider: Box<dyn HidProvider>,
    devices: Vec<Ds4Device>,
    last_enumeration: Option<Instant>,
}

impl Ds4Handler {
    pub fn new(provider: Box<dyn HidProvider>) -> Self {
        Self {
            provider,
            devices: Vec::new(),
            last_enumeration: None,
        }
    }

    /// Pick up controllers attached since the last scan
    fn enumerate(&mut self) {
        self.last_enumeration = Some(Instant::now());
        let found = match self.provider.enumerate(DS4_IDS) {
            Ok(found) => found,
            Err(e) => {
                warn!("DS4 enumeration failed: {}", e);
                return;
            }
        };
        for info in found {
            if self.devices.iter().any(|d| d.session.path() == info.path) {
                continue;
            }
            let name = format!("DS4 Pad #{}", self.devices.len() + 1);
            info!(
                "Found {} ({:04x}:{:04x}, {:?}) at {}",
                name, info.vid, info.pid, info.transport_type, info.path
            );
            self.devices.push(Ds4Device {
                name,
                session: Ds4Session::new(info),
                binding: None,
            });
        }
    }

    pub fn list_devices(&mut self) -> Vec<String> {
        self.enumerate();
        self.devices.iter().map(|d| d.name.clone()).collect()
    }

    pub fn bind_pad(&mut self, pad: &Arc<SharedPad>, device: &str, profile: &PadProfile) -> bool {
        if !self.devices.iter().any(|d| d.name == device) {
            self.enumerate();
        }
        let Some(target) = self.devices.iter_mut().find(|d| d.name == device) else {
            return false;
        };
        if target.binding.is_some() {
            warn!("{} is already bound to another pad", device);
            return false;
        }

        let layout = resolve_layout(HandlerKind::Ds4, profile, key_code);
        target.binding = Some(Binding::new(pad, device, CAPABILITY, profile, layout));
        true
    }

    pub fn tick(&mut self) {
        if self
            .last_enumeration
            .map_or(true, |last| last.elapsed() >= ENUMERATE_INTERVAL)
        {
            self.enumerate();
        }

        let now = Instant::now();
        for device in &mut self.devices {
            let Some(binding) = device.binding.as_mut() else {
                continue;
            };

            let connection = device.session.update_connection(self.provider.as_mut());
            let connected = connection != Connection::Disconnected;
            binding.update_connection(connected);
            if !connected {
                continue;
            }

            if connection == Connection::Connected {
                let input = device.session.input();
                binding.apply(&button_values(input), &AxisLimits::BYTE);

                let sensors = sensor_values(input);
                let mut pad = binding.pad.write();
                for (offset, value) in [
                    offset::SENSOR_X,
                    offset::SENSOR_Y,
                    offset::SENSOR_Z,
                    offset::SENSOR_G,
                ]
                .into_iter()
                .zip(sensors)
                {
                    pad.set_sensor(offset, value);
                }
                pad.battery_level = (input.battery_level.saturating_mul(10)).min(100);
                pad.cable_state = input.cable;
            }

            let output = desired_output(binding, &device.session);
            device.session.set_output(output);
            device.session.flush_output(now);
        }
    }

    pub fn shutdown(&mut self) {
        for device in &mut self.devices {
            if device.binding.take().is_some() || device.session.is_open() {
                device.session.shutdown();
            }
        }
    }
}
