//! XInput backend
//!
//! Reads the four XInput user slots through an [`XInputSource`]. The system
//! source exists on Windows only; elsewhere the backend has no devices.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use padbridge_pad::config::{HandlerKind, PadProfile};
use padbridge_pad::pad::{capability, KeyCode};
use padbridge_pad::signal::AxisLimits;
use thiserror::Error;
use tracing::{debug, warn};

use super::{resolve_layout, Binding};
use crate::dispatch::SharedPad;

/// Number of XInput user slots
pub const MAX_USERS: u32 = 4;

/// Minimum delay between two rumble updates
pub const RUMBLE_INTERVAL: Duration = Duration::from_millis(20);

const CAPABILITY: u32 = capability::PS3_CONFORMITY
    | capability::PRESS_MODE
    | capability::HP_ANALOG_STICK
    | capability::ACTUATOR;

#[derive(Error, Debug)]
pub enum XInputError {
    #[error("XInput controller {0} is not connected")]
    NotConnected(u32),

    #[error("XInput library unavailable: {0}")]
    Unavailable(String),

    #[error("XInput call failed: {0}")]
    Call(String),
}

/// Button bits of the XInput gamepad record
pub mod button {
    pub const DPAD_UP: u16 = 0x0001;
    pub const DPAD_DOWN: u16 = 0x0002;
    pub const DPAD_LEFT: u16 = 0x0004;
    pub const DPAD_RIGHT: u16 = 0x0008;
    pub const START: u16 = 0x0010;
    pub const BACK: u16 = 0x0020;
    pub const LEFT_THUMB: u16 = 0x0040;
    pub const RIGHT_THUMB: u16 = 0x0080;
    pub const LEFT_SHOULDER: u16 = 0x0100;
    pub const RIGHT_SHOULDER: u16 = 0x0200;
    pub const GUIDE: u16 = 0x0400;
    pub const A: u16 = 0x1000;
    pub const B: u16 = 0x2000;
    pub const X: u16 = 0x4000;
    pub const Y: u16 = 0x8000;
}

/// One polled XInput gamepad record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XInputGamepad {
    pub buttons: u16,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub thumb_lx: i16,
    pub thumb_ly: i16,
    pub thumb_rx: i16,
    pub thumb_ry: i16,
}

/// Access to the XInput user slots
pub trait XInputSource {
    fn get_state(&mut self, user: u32) -> Result<XInputGamepad, XInputError>;

    /// Motor speeds are full 16-bit values, left is the large motor
    fn set_state(&mut self, user: u32, left_motor: u16, right_motor: u16)
        -> Result<(), XInputError>;
}

#[cfg(target_os = "windows")]
mod system {
    use rusty_xinput::{XInputHandle, XInputUsageError};

    use super::{XInputError, XInputGamepad, XInputSource};

    pub struct RustyXInput {
        handle: XInputHandle,
    }

    impl RustyXInput {
        pub fn load() -> Result<Self, XInputError> {
            let handle = XInputHandle::load_default()
                .map_err(|e| XInputError::Unavailable(format!("{e:?}")))?;
            Ok(Self { handle })
        }
    }

    fn map_error(user: u32, e: XInputUsageError) -> XInputError {
        match e {
            XInputUsageError::DeviceNotConnected => XInputError::NotConnected(user),
            other => XInputError::Call(format!("{other:?}")),
        }
    }

    impl XInputSource for RustyXInput {
        fn get_state(&mut self, user: u32) -> Result<XInputGamepad, XInputError> {
            let state = self.handle.get_state(user).map_err(|e| map_error(user, e))?;
            let (thumb_lx, thumb_ly) = state.left_stick_raw();
            let (thumb_rx, thumb_ry) = state.right_stick_raw();
            Ok(XInputGamepad {
                buttons: state.raw.Gamepad.wButtons,
                left_trigger: state.left_trigger(),
                right_trigger: state.right_trigger(),
                thumb_lx,
                thumb_ly,
                thumb_rx,
                thumb_ry,
            })
        }

        fn set_state(
            &mut self,
            user: u32,
            left_motor: u16,
            right_motor: u16,
        ) -> Result<(), XInputError> {
            self.handle
                .set_state(user, left_motor, right_motor)
                .map_err(|e| map_error(user, e))
        }
    }
}

/// The OS XInput source, if this platform has one
pub fn system_source() -> Option<Box<dyn XInputSource>> {
    #[cfg(target_os = "windows")]
    {
        match system::RustyXInput::load() {
            Ok(source) => return Some(Box::new(source)),
            Err(e) => warn!("{}", e),
        }
    }
    None
}

/// XInput keycodes
pub mod key {
    use padbridge_pad::pad::KeyCode;

    pub const A: KeyCode = 1;
    pub const B: KeyCode = 2;
    pub const X: KeyCode = 3;
    pub const Y: KeyCode = 4;
    pub const LEFT: KeyCode = 5;
    pub const RIGHT: KeyCode = 6;
    pub const UP: KeyCode = 7;
    pub const DOWN: KeyCode = 8;
    pub const LB: KeyCode = 9;
    pub const RB: KeyCode = 10;
    pub const BACK: KeyCode = 11;
    pub const START: KeyCode = 12;
    pub const LS: KeyCode = 13;
    pub const RS: KeyCode = 14;
    pub const GUIDE: KeyCode = 15;
    pub const LT: KeyCode = 16;
    pub const RT: KeyCode = 17;
    pub const LSX_NEG: KeyCode = 18;
    pub const LSX_POS: KeyCode = 19;
    pub const LSY_NEG: KeyCode = 20;
    pub const LSY_POS: KeyCode = 21;
    pub const RSX_NEG: KeyCode = 22;
    pub const RSX_POS: KeyCode = 23;
    pub const RSY_NEG: KeyCode = 24;
    pub const RSY_POS: KeyCode = 25;
}

const KEY_NAMES: &[(KeyCode, &str)] = &[
    (key::A, "A"),
    (key::B, "B"),
    (key::X, "X"),
    (key::Y, "Y"),
    (key::LEFT, "Left"),
    (key::RIGHT, "Right"),
    (key::UP, "Up"),
    (key::DOWN, "Down"),
    (key::LB, "LB"),
    (key::RB, "RB"),
    (key::BACK, "Back"),
    (key::START, "Start"),
    (key::LS, "LS"),
    (key::RS, "RS"),
    (key::GUIDE, "Guide"),
    (key::LT, "LT"),
    (key::RT, "RT"),
    (key::LSX_NEG, "LS X-"),
    (key::LSX_POS, "LS X+"),
    (key::LSY_NEG, "LS Y-"),
    (key::LSY_POS, "LS Y+"),
    (key::RSX_NEG, "RS X-"),
    (key::RSX_POS, "RS X+"),
    (key::RSY_NEG, "RS Y-"),
    (key::RSY_POS, "RS Y+"),
];

const BUTTON_KEYS: [(u16, KeyCode); 15] = [
    (button::A, key::A),
    (button::B, key::B),
    (button::X, key::X),
    (button::Y, key::Y),
    (button::DPAD_LEFT, key::LEFT),
    (button::DPAD_RIGHT, key::RIGHT),
    (button::DPAD_UP, key::UP),
    (button::DPAD_DOWN, key::DOWN),
    (button::LEFT_SHOULDER, key::LB),
    (button::RIGHT_SHOULDER, key::RB),
    (button::BACK, key::BACK),
    (button::START, key::START),
    (button::LEFT_THUMB, key::LS),
    (button::RIGHT_THUMB, key::RS),
    (button::GUIDE, key::GUIDE),
];

fn key_code(name: &str) -> Option<KeyCode> {
    KEY_NAMES.iter().find(|(_, n)| *n == name).map(|(code, _)| *code)
}

/// Negative and positive halves of a signed thumb axis, each in 0..=32767
fn thumb_halves(value: i16) -> (u16, u16) {
    let v = i32::from(value);
    let neg = if v < 0 { (v.abs() - 1) as u16 } else { 0 };
    let pos = if v > 0 { v as u16 } else { 0 };
    (neg, pos)
}

/// Backend key table for one gamepad record
pub fn button_values(state: &XInputGamepad) -> HashMap<KeyCode, u16> {
    let mut values = HashMap::with_capacity(KEY_NAMES.len());
    for (mask, code) in BUTTON_KEYS {
        values.insert(code, if state.buttons & mask != 0 { 255 } else { 0 });
    }
    values.insert(key::LT, u16::from(state.left_trigger));
    values.insert(key::RT, u16::from(state.right_trigger));

    for (value, neg, pos) in [
        (state.thumb_lx, key::LSX_NEG, key::LSX_POS),
        (state.thumb_ly, key::LSY_NEG, key::LSY_POS),
        (state.thumb_rx, key::RSX_NEG, key::RSX_POS),
        (state.thumb_ry, key::RSY_NEG, key::RSY_POS),
    ] {
        let (n, p) = thumb_halves(value);
        values.insert(neg, n);
        values.insert(pos, p);
    }
    values
}

struct XInputBinding {
    user: u32,
    binding: Binding,
    last_motors: [u8; 2],
    last_rumble: Option<Instant>,
}

pub struct XInputHandler {
    source: Box<dyn XInputSource>,
    bindings: Vec<XInputBinding>,
}

fn device_name(user: u32) -> String {
    format!("XInput Pad #{}", user + 1)
}

impl XInputHandler {
    pub fn new(source: Box<dyn XInputSource>) -> Self {
        Self {
            source,
            bindings: Vec::new(),
        }
    }

    pub fn list_devices(&mut self) -> Vec<String> {
        (0..MAX_USERS).map(device_name).collect()
    }

    pub fn bind_pad(&mut self, pad: &Arc<SharedPad>, device: &str, profile: &PadProfile) -> bool {
        let Some(user) = (0..MAX_USERS).find(|u| device_name(*u) == device) else {
            return false;
        };
        if self.bindings.iter().any(|b| b.user == user) {
            warn!("{} is already bound to another pad", device);
            return false;
        }
        let layout = resolve_layout(HandlerKind::XInput, profile, key_code);
        self.bindings.push(XInputBinding {
            user,
            binding: Binding::new(pad, device, CAPABILITY, profile, layout),
            last_motors: [0, 0],
            last_rumble: None,
        });
        true
    }

    pub fn tick(&mut self) {
        let now = Instant::now();
        for entry in &mut self.bindings {
            let state = match self.source.get_state(entry.user) {
                Ok(state) => Some(state),
                Err(XInputError::NotConnected(_)) => None,
                Err(e) => {
                    debug!("XInput poll of user {} failed: {}", entry.user, e);
                    None
                }
            };

            entry.binding.update_connection(state.is_some());
            let Some(state) = state else {
                entry.last_rumble = None;
                continue;
            };
            entry
                .binding
                .apply(&button_values(&state), &AxisLimits::WIDE);

            let motors = entry.binding.motor_speeds();
            let due = entry
                .last_rumble
                .map_or(true, |last| now.saturating_duration_since(last) >= RUMBLE_INTERVAL);
            if due && (motors != entry.last_motors || entry.last_rumble.is_none()) {
                let [large, small] = motors.map(|m| u16::from(m) * 257);
                match self.source.set_state(entry.user, large, small) {
                    Ok(()) => {
                        entry.last_motors = motors;
                        entry.last_rumble = Some(now);
                    }
                    Err(e) => debug!("XInput rumble on user {} failed: {}", entry.user, e),
                }
            }
        }
    }

    pub fn shutdown(&mut self) {
        for entry in self.bindings.drain(..) {
            if entry.binding.is_connected() {
                if let Err(e) = self.source.set_state(entry.user, 0, 0) {
                    debug!("Stopping rumble on user {} failed: {}", entry.user, e);
                }
            }
        }
    }
}
