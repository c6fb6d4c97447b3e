//! evdev backend for Linux joysticks
//!
//! Any `/dev/input/event*` node with key events and both ABS_X and ABS_Y is
//! treated as a joystick. State is read through ioctl snapshots each tick
//! instead of draining the event queue.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use evdev::{
    AbsoluteAxisType, Device, EventType, FFEffect, FFEffectData, FFEffectKind, FFEffectType,
    FFReplay, FFTrigger,
};
use padbridge_pad::config::{HandlerKind, PadProfile};
use padbridge_pad::pad::{capability, KeyCode};
use padbridge_pad::signal::{scale_stick_input, scale_stick_input2, AxisLimits};
use tracing::{debug, info, warn};

use super::{resolve_layout, unique_names, Binding};
use crate::dispatch::SharedPad;

/// Minimum delay between two rumble updates
pub const RUMBLE_INTERVAL: Duration = Duration::from_millis(20);

const CAPABILITY: u32 = capability::PS3_CONFORMITY
    | capability::PRESS_MODE
    | capability::HP_ANALOG_STICK
    | capability::ACTUATOR;

/// Keycode flag for the positive half of an absolute axis
pub const AXIS_POSITIVE: KeyCode = 0x1_0000;
/// Keycode flag for the negative half of an absolute axis
pub const AXIS_NEGATIVE: KeyCode = 0x2_0000;

const BUTTON_NAMES: &[(u16, &str)] = &[
    (0x120, "BTN_TRIGGER"),
    (0x121, "BTN_THUMB"),
    (0x122, "BTN_THUMB2"),
    (0x123, "BTN_TOP"),
    (0x124, "BTN_TOP2"),
    (0x125, "BTN_PINKIE"),
    (0x126, "BTN_BASE"),
    (0x127, "BTN_BASE2"),
    (0x128, "BTN_BASE3"),
    (0x129, "BTN_BASE4"),
    (0x12a, "BTN_BASE5"),
    (0x12b, "BTN_BASE6"),
    (0x130, "BTN_A"),
    (0x131, "BTN_B"),
    (0x132, "BTN_C"),
    (0x133, "BTN_X"),
    (0x134, "BTN_Y"),
    (0x135, "BTN_Z"),
    (0x136, "BTN_TL"),
    (0x137, "BTN_TR"),
    (0x138, "BTN_TL2"),
    (0x139, "BTN_TR2"),
    (0x13a, "BTN_SELECT"),
    (0x13b, "BTN_START"),
    (0x13c, "BTN_MODE"),
    (0x13d, "BTN_THUMBL"),
    (0x13e, "BTN_THUMBR"),
    (0x220, "BTN_DPAD_UP"),
    (0x221, "BTN_DPAD_DOWN"),
    (0x222, "BTN_DPAD_LEFT"),
    (0x223, "BTN_DPAD_RIGHT"),
];

const AXIS_NAMES: &[(u16, &str)] = &[
    (0x00, "ABS_X"),
    (0x01, "ABS_Y"),
    (0x02, "ABS_Z"),
    (0x03, "ABS_RX"),
    (0x04, "ABS_RY"),
    (0x05, "ABS_RZ"),
    (0x06, "ABS_THROTTLE"),
    (0x07, "ABS_RUDDER"),
    (0x08, "ABS_WHEEL"),
    (0x09, "ABS_GAS"),
    (0x0a, "ABS_BRAKE"),
    (0x10, "ABS_HAT0X"),
    (0x11, "ABS_HAT0Y"),
    (0x12, "ABS_HAT1X"),
    (0x13, "ABS_HAT1Y"),
    (0x14, "ABS_HAT2X"),
    (0x15, "ABS_HAT2Y"),
    (0x16, "ABS_HAT3X"),
    (0x17, "ABS_HAT3Y"),
];

/// Keycode for a key name: `BTN_*` or `ABS_*` with a `+`/`-` suffix
pub fn key_code(name: &str) -> Option<KeyCode> {
    if let Some((code, _)) = BUTTON_NAMES.iter().find(|(_, n)| *n == name) {
        return Some(KeyCode::from(*code));
    }
    let (axis, flag) = if let Some(axis) = name.strip_suffix('+') {
        (axis, AXIS_POSITIVE)
    } else if let Some(axis) = name.strip_suffix('-') {
        (axis, AXIS_NEGATIVE)
    } else {
        return None;
    };
    AXIS_NAMES
        .iter()
        .find(|(_, n)| *n == axis)
        .map(|(code, _)| flag | KeyCode::from(*code))
}

/// One absolute axis reading with its range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsAxis {
    pub code: u16,
    pub value: i32,
    pub minimum: i32,
    pub maximum: i32,
}

/// Backend key table from key and axis snapshots
///
/// Axes that cannot go negative are one-sided and land on the positive key.
pub fn button_values(keys: &[(u16, bool)], axes: &[AbsAxis]) -> HashMap<KeyCode, u16> {
    let mut values = HashMap::with_capacity(keys.len() + axes.len() * 2);
    for (code, down) in keys {
        values.insert(KeyCode::from(*code), if *down { 255 } else { 0 });
    }
    for axis in axes {
        let code = KeyCode::from(axis.code);
        if axis.minimum >= 0 {
            let value = scale_stick_input(axis.value, axis.minimum, axis.maximum);
            values.insert(AXIS_POSITIVE | code, value as u16);
            continue;
        }
        let value = scale_stick_input2(axis.value, axis.minimum, axis.maximum);
        let (neg, pos) = if value < 0.0 {
            (value.abs() as u16, 0)
        } else {
            (0, value as u16)
        };
        values.insert(AXIS_NEGATIVE | code, neg);
        values.insert(AXIS_POSITIVE | code, pos);
    }
    values
}

fn is_joystick(device: &Device) -> bool {
    device.supported_events().contains(EventType::KEY)
        && device.supported_absolute_axes().is_some_and(|axes| {
            axes.contains(AbsoluteAxisType::ABS_X) && axes.contains(AbsoluteAxisType::ABS_Y)
        })
}

/// Joystick nodes under their unique names, ordered by path
fn scan() -> Vec<(String, PathBuf)> {
    let mut found: Vec<(PathBuf, String)> = evdev::enumerate()
        .filter(|(_, device)| is_joystick(device))
        .map(|(path, device)| (path, device.name().unwrap_or("Unknown").to_string()))
        .collect();
    found.sort_by(|a, b| a.0.cmp(&b.0));

    let names = unique_names(found.iter().map(|(_, name)| name.clone()));
    names
        .into_iter()
        .zip(found.into_iter().map(|(path, _)| path))
        .collect()
}

fn read_state(device: &Device) -> io::Result<(Vec<(u16, bool)>, Vec<AbsAxis>)> {
    let key_state = device.get_key_state()?;
    let abs_state = device.get_abs_state()?;

    let keys = device
        .supported_keys()
        .map(|supported| {
            supported
                .iter()
                .map(|key| (key.code(), key_state.contains(key)))
                .collect()
        })
        .unwrap_or_default();

    let axes = device
        .supported_absolute_axes()
        .map(|supported| {
            supported
                .iter()
                .filter_map(|axis| {
                    let info = abs_state.get(usize::from(axis.0))?;
                    Some(AbsAxis {
                        code: axis.0,
                        value: info.value,
                        minimum: info.minimum,
                        maximum: info.maximum,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok((keys, axes))
}

fn rumble_data(large: u16, small: u16) -> FFEffectData {
    FFEffectData {
        direction: 0,
        trigger: FFTrigger {
            button: 0,
            interval: 0,
        },
        replay: FFReplay {
            length: 0,
            delay: 0,
        },
        kind: FFEffectKind::Rumble {
            strong_magnitude: large,
            weak_magnitude: small,
        },
    }
}

struct EvdevPad {
    name: String,
    path: PathBuf,
    device: Option<Device>,
    binding: Binding,
    effect: Option<FFEffect>,
    last_motors: [u8; 2],
    last_rumble: Option<Instant>,
}

impl EvdevPad {
    fn close(&mut self) {
        self.effect = None;
        self.device = None;
        self.last_rumble = None;
    }

    fn update_rumble(&mut self, now: Instant) -> io::Result<()> {
        let motors = self.binding.motor_speeds();
        if motors == self.last_motors {
            return Ok(());
        }
        if self
            .last_rumble
            .is_some_and(|last| now.saturating_duration_since(last) < RUMBLE_INTERVAL)
        {
            return Ok(());
        }
        let Some(device) = self.device.as_mut() else {
            return Ok(());
        };
        if !device
            .supported_ff()
            .is_some_and(|ff| ff.contains(FFEffectType::FF_RUMBLE))
        {
            return Ok(());
        }

        self.last_motors = motors;
        self.last_rumble = Some(now);
        let [large, small] = motors.map(|m| u16::from(m) * 257);
        if large == 0 && small == 0 {
            if let Some(effect) = self.effect.as_mut() {
                effect.stop()?;
            }
            return Ok(());
        }

        let data = rumble_data(large, small);
        match self.effect.as_mut() {
            Some(effect) => effect.update(data)?,
            None => self.effect = Some(device.upload_ff_effect(data)?),
        }
        if let Some(effect) = self.effect.as_mut() {
            effect.play(1)?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct EvdevHandler {
    pads: Vec<EvdevPad>,
}

impl EvdevHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list_devices(&mut self) -> Vec<String> {
        scan().into_iter().map(|(name, _)| name).collect()
    }

    pub fn bind_pad(&mut self, pad: &Arc<SharedPad>, device: &str, profile: &PadProfile) -> bool {
        let Some((name, path)) = scan().into_iter().find(|(name, _)| name == device) else {
            return false;
        };
        if self.pads.iter().any(|p| p.path == path) {
            warn!("{} is already bound to another pad", device);
            return false;
        }

        let opened = match Device::open(&path) {
            Ok(opened) => Some(opened),
            Err(e) => {
                warn!("Could not open {}: {}", path.display(), e);
                None
            }
        };
        let layout = resolve_layout(HandlerKind::Evdev, profile, key_code);
        self.pads.push(EvdevPad {
            binding: Binding::new(pad, &name, CAPABILITY, profile, layout),
            name,
            path,
            device: opened,
            effect: None,
            last_motors: [0, 0],
            last_rumble: None,
        });
        true
    }

    pub fn tick(&mut self) {
        let now = Instant::now();
        for pad in &mut self.pads {
            if pad.device.is_none() {
                match Device::open(&pad.path) {
                    Ok(device) => pad.device = Some(device),
                    Err(e) => debug!("Reopen of {} failed: {}", pad.path.display(), e),
                }
            }

            let state = pad.device.as_ref().map(read_state);
            let (keys, axes) = match state {
                Some(Ok(state)) => state,
                Some(Err(e)) => {
                    if e.raw_os_error() == Some(libc::ENODEV) {
                        info!("{} was removed", pad.name);
                    } else {
                        warn!("Reading {} failed: {}", pad.name, e);
                    }
                    pad.close();
                    pad.binding.update_connection(false);
                    continue;
                }
                None => {
                    pad.binding.update_connection(false);
                    continue;
                }
            };

            pad.binding.update_connection(true);
            pad.binding
                .apply(&button_values(&keys, &axes), &AxisLimits::BYTE);

            if let Err(e) = pad.update_rumble(now) {
                debug!("Rumble on {} failed: {}", pad.name, e);
            }
        }
    }

    pub fn shutdown(&mut self) {
        for mut pad in self.pads.drain(..) {
            if let Some(effect) = pad.effect.as_mut() {
                if let Err(e) = effect.stop() {
                    debug!("Stopping rumble on {} failed: {}", pad.name, e);
                }
            }
        }
    }
}
