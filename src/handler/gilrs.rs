//! Joystick SDK backend over gilrs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gilrs::ff::{BaseEffect, BaseEffectType, Effect, EffectBuilder, Replay, Ticks};
use gilrs::{Axis, Button, Gamepad, GamepadId, Gilrs, PowerInfo};
use padbridge_pad::config::{HandlerKind, PadProfile};
use padbridge_pad::pad::{capability, KeyCode};
use padbridge_pad::signal::AxisLimits;
use tracing::{debug, error, info, warn};

use super::{resolve_layout, unique_names, Binding};
use crate::dispatch::SharedPad;

/// Minimum delay between two rumble updates
pub const RUMBLE_INTERVAL: Duration = Duration::from_millis(20);

/// Unchanged rumble is replayed this often so the effect never runs out
pub const RUMBLE_REFRESH: Duration = Duration::from_millis(400);

const CAPABILITY: u32 = capability::PS3_CONFORMITY
    | capability::PRESS_MODE
    | capability::HP_ANALOG_STICK
    | capability::ACTUATOR;

/// gilrs keycodes
pub mod key {
    use padbridge_pad::pad::KeyCode;

    pub const A: KeyCode = 1;
    pub const B: KeyCode = 2;
    pub const X: KeyCode = 3;
    pub const Y: KeyCode = 4;
    pub const LB: KeyCode = 5;
    pub const RB: KeyCode = 6;
    pub const LT: KeyCode = 7;
    pub const RT: KeyCode = 8;
    pub const BACK: KeyCode = 9;
    pub const START: KeyCode = 10;
    pub const GUIDE: KeyCode = 11;
    pub const LS: KeyCode = 12;
    pub const RS: KeyCode = 13;
    pub const UP: KeyCode = 14;
    pub const DOWN: KeyCode = 15;
    pub const LEFT: KeyCode = 16;
    pub const RIGHT: KeyCode = 17;
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
    (key::LB, "LB"),
    (key::RB, "RB"),
    (key::LT, "LT"),
    (key::RT, "RT"),
    (key::BACK, "Back"),
    (key::START, "Start"),
    (key::GUIDE, "Guide"),
    (key::LS, "LS"),
    (key::RS, "RS"),
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

/// Digital buttons; triggers are read as analog values instead
const BUTTON_KEYS: [(Button, KeyCode); 15] = [
    (Button::South, key::A),
    (Button::East, key::B),
    (Button::West, key::X),
    (Button::North, key::Y),
    (Button::LeftTrigger, key::LB),
    (Button::RightTrigger, key::RB),
    (Button::Select, key::BACK),
    (Button::Start, key::START),
    (Button::Mode, key::GUIDE),
    (Button::LeftThumb, key::LS),
    (Button::RightThumb, key::RS),
    (Button::DPadUp, key::UP),
    (Button::DPadDown, key::DOWN),
    (Button::DPadLeft, key::LEFT),
    (Button::DPadRight, key::RIGHT),
];

const STICK_AXES: [Axis; 4] = [
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::RightStickX,
    Axis::RightStickY,
];

fn key_code(name: &str) -> Option<KeyCode> {
    KEY_NAMES.iter().find(|(_, n)| *n == name).map(|(code, _)| *code)
}

/// State of one gamepad copied out of gilrs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GamepadSnapshot {
    pub pressed: Vec<Button>,
    /// Analog trigger travel, 0..=1
    pub left_trigger: f32,
    pub right_trigger: f32,
    /// LX, LY, RX, RY in -1..=1, Y up positive
    pub axes: [f32; 4],
    pub power: Option<PowerInfo>,
}

impl GamepadSnapshot {
    fn capture(gamepad: &Gamepad<'_>) -> Self {
        let trigger = |button| gamepad.button_data(button).map_or(0.0, |d| d.value());
        Self {
            pressed: BUTTON_KEYS
                .iter()
                .map(|(button, _)| *button)
                .filter(|button| gamepad.is_pressed(*button))
                .collect(),
            left_trigger: trigger(Button::LeftTrigger2),
            right_trigger: trigger(Button::RightTrigger2),
            axes: STICK_AXES.map(|axis| gamepad.axis_data(axis).map_or(0.0, |d| d.value())),
            power: Some(gamepad.power_info()),
        }
    }
}

/// Battery percent and cable state from gilrs power info
pub fn battery_state(power: PowerInfo) -> (u8, bool) {
    match power {
        PowerInfo::Unknown => (100, false),
        PowerInfo::Wired => (100, true),
        PowerInfo::Discharging(level) => (level.min(100), false),
        PowerInfo::Charging(level) => (level.min(100), true),
        PowerInfo::Charged => (100, true),
    }
}

/// Backend key table for one snapshot
pub fn button_values(snapshot: &GamepadSnapshot) -> HashMap<KeyCode, u16> {
    let mut values = HashMap::with_capacity(KEY_NAMES.len());
    for (button, code) in BUTTON_KEYS {
        let down = snapshot.pressed.contains(&button);
        values.insert(code, if down { 255 } else { 0 });
    }

    let trigger = |v: f32| (v.clamp(0.0, 1.0) * 255.0) as u16;
    values.insert(key::LT, trigger(snapshot.left_trigger));
    values.insert(key::RT, trigger(snapshot.right_trigger));

    let thumb_max = AxisLimits::WIDE.thumb_max as f32;
    for (value, (neg, pos)) in snapshot.axes.iter().zip([
        (key::LSX_NEG, key::LSX_POS),
        (key::LSY_NEG, key::LSY_POS),
        (key::RSX_NEG, key::RSX_POS),
        (key::RSY_NEG, key::RSY_POS),
    ]) {
        let scaled = (value.clamp(-1.0, 1.0) * thumb_max) as i32;
        values.insert(neg, (-scaled).max(0) as u16);
        values.insert(pos, scaled.max(0) as u16);
    }
    values
}

struct GilrsBinding {
    name: String,
    binding: Binding,
    effect: Option<Effect>,
    last_motors: [u8; 2],
    last_rumble: Option<Instant>,
}

pub struct GilrsHandler {
    gilrs: Option<Gilrs>,
    bindings: Vec<GilrsBinding>,
}

impl Default for GilrsHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl GilrsHandler {
    pub fn new() -> Self {
        let gilrs = match Gilrs::new() {
            Ok(gilrs) => {
                info!("Initialized gilrs");
                Some(gilrs)
            }
            Err(gilrs::Error::NotImplemented(dummy)) => {
                warn!("gilrs has no backend on this platform");
                Some(dummy)
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                None
            }
        };
        Self {
            gilrs,
            bindings: Vec::new(),
        }
    }

    /// Connected gamepads under their unique names
    fn gamepads(gilrs: &Gilrs) -> Vec<(String, GamepadId)> {
        let pads: Vec<(GamepadId, String)> = gilrs
            .gamepads()
            .map(|(id, gamepad)| (id, gamepad.name().to_string()))
            .collect();
        let names = unique_names(pads.iter().map(|(_, name)| name.clone()));
        names
            .into_iter()
            .zip(pads.into_iter().map(|(id, _)| id))
            .collect()
    }

    pub fn list_devices(&mut self) -> Vec<String> {
        let Some(gilrs) = self.gilrs.as_mut() else {
            return Vec::new();
        };
        while gilrs.next_event().is_some() {}
        Self::gamepads(gilrs).into_iter().map(|(name, _)| name).collect()
    }

    pub fn bind_pad(&mut self, pad: &Arc<SharedPad>, device: &str, profile: &PadProfile) -> bool {
        if !self.list_devices().iter().any(|name| name == device) {
            return false;
        }
        if self.bindings.iter().any(|b| b.name == device) {
            warn!("{} is already bound to another pad", device);
            return false;
        }
        let layout = resolve_layout(HandlerKind::Gilrs, profile, key_code);
        self.bindings.push(GilrsBinding {
            name: device.to_string(),
            binding: Binding::new(pad, device, CAPABILITY, profile, layout),
            effect: None,
            last_motors: [0, 0],
            last_rumble: None,
        });
        true
    }

    pub fn tick(&mut self) {
        let Some(gilrs) = self.gilrs.as_mut() else {
            return;
        };
        while gilrs.next_event().is_some() {}

        let now = Instant::now();
        let connected = Self::gamepads(gilrs);
        for entry in &mut self.bindings {
            let id = connected
                .iter()
                .find(|(name, _)| *name == entry.name)
                .map(|(_, id)| *id);
            let snapshot = id
                .and_then(|id| gilrs.connected_gamepad(id))
                .map(|gamepad| GamepadSnapshot::capture(&gamepad));

            entry.binding.update_connection(snapshot.is_some());
            let (Some(id), Some(snapshot)) = (id, snapshot) else {
                entry.effect = None;
                entry.last_rumble = None;
                continue;
            };

            entry
                .binding
                .apply(&button_values(&snapshot), &AxisLimits::WIDE);
            if let Some(power) = snapshot.power {
                let (level, cable) = battery_state(power);
                entry.binding.set_battery(level, cable);
            }

            let motors = entry.binding.motor_speeds();
            let elapsed = entry
                .last_rumble
                .map(|last| now.saturating_duration_since(last));
            let due = match elapsed {
                None => true,
                Some(elapsed) if motors != entry.last_motors => elapsed >= RUMBLE_INTERVAL,
                Some(elapsed) => motors != [0, 0] && elapsed >= RUMBLE_REFRESH,
            };
            if due {
                entry.effect = play_rumble(gilrs, id, motors);
                entry.last_motors = motors;
                entry.last_rumble = Some(now);
            }
        }
    }

    pub fn shutdown(&mut self) {
        for entry in self.bindings.drain(..) {
            if let Some(effect) = entry.effect {
                if let Err(e) = effect.stop() {
                    debug!("Stopping rumble on {} failed: {}", entry.name, e);
                }
            }
        }
    }
}

/// Start a rumble effect; `None` when silent or unsupported
fn play_rumble(gilrs: &mut Gilrs, id: GamepadId, [large, small]: [u8; 2]) -> Option<Effect> {
    if large == 0 && small == 0 {
        return None;
    }
    if !gilrs.gamepad(id).is_ff_supported() {
        return None;
    }

    let scheduling = Replay {
        play_for: Ticks::from_ms((RUMBLE_REFRESH.as_millis() * 2) as u32),
        ..Default::default()
    };
    let effect = EffectBuilder::new()
        .add_effect(BaseEffect {
            kind: BaseEffectType::Strong {
                magnitude: u16::from(large) * 257,
            },
            scheduling,
            ..Default::default()
        })
        .add_effect(BaseEffect {
            kind: BaseEffectType::Weak {
                magnitude: u16::from(small) * 257,
            },
            scheduling,
            ..Default::default()
        })
        .gamepads(&[id])
        .finish(gilrs);

    match effect.and_then(|effect| effect.play().map(|()| effect)) {
        Ok(effect) => Some(effect),
        Err(e) => {
            debug!("gilrs rumble failed: {}", e);
            None
        }
    }
}
