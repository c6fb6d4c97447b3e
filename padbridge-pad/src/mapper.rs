//! Backend key values to logical pad values
//!
//! Backends decode their device into a `keycode -> 0..=N` table. The mapper
//! classifies each bound keycode as trigger, stick half or plain button,
//! applies the profile's thresholds and writes the result into the pad.

use std::collections::HashMap;

use tracing::info;

use crate::config::PadProfile;
use crate::pad::{port_status, KeyCode, LogicalPad};
use crate::signal::{
    convert_to_squircle_point, normalize_stick_deadzone, normalize_stick_input,
    normalize_trigger_input, AxisLimits,
};

/// How a keycode is treated when translated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    LeftTrigger,
    RightTrigger,
    LeftStick,
    RightStick,
    Button,
}

/// Translate one raw key value into (pressed, value)
///
/// Stick halves pressed past the deadzone, triggers past their threshold,
/// anything else when non-zero. `ignore_stick_threshold` is set when the
/// value feeds a stick axis, which applies its own radial deadzone later.
pub fn translate_button_press(
    class: KeyClass,
    raw: u16,
    ignore_stick_threshold: bool,
    ignore_trigger_threshold: bool,
    profile: &PadProfile,
    limits: &AxisLimits,
) -> (bool, u16) {
    match class {
        KeyClass::LeftTrigger | KeyClass::RightTrigger => {
            let threshold = if class == KeyClass::LeftTrigger {
                profile.left_trigger_threshold
            } else {
                profile.right_trigger_threshold
            } as i32;
            let pressed = i32::from(raw) > if ignore_trigger_threshold { 0 } else { threshold };
            let value = if pressed {
                normalize_trigger_input(raw, threshold, limits)
            } else {
                0
            };
            (pressed, value)
        }
        KeyClass::LeftStick | KeyClass::RightStick => {
            let (deadzone, multiplier) = if class == KeyClass::LeftStick {
                (profile.left_stick_deadzone, profile.left_stick_multiplier)
            } else {
                (profile.right_stick_deadzone, profile.right_stick_multiplier)
            };
            let deadzone = deadzone as i32;
            let pressed = i32::from(raw) > if ignore_stick_threshold { 0 } else { deadzone };
            let value = if pressed {
                normalize_stick_input(raw, deadzone, multiplier, ignore_stick_threshold, limits)
            } else {
                0
            };
            (pressed, value)
        }
        KeyClass::Button => (raw > 0, raw),
    }
}

/// Write buttons and sticks of `pad` from a backend key table
///
/// Opposite stick halves cancel; the signed result goes through the radial
/// deadzone and squircle correction. Y axes are stored inverted (up = 0).
pub fn apply_mapping(
    pad: &mut LogicalPad,
    values: &HashMap<KeyCode, u16>,
    classify: impl Fn(KeyCode) -> KeyClass,
    profile: &PadProfile,
    limits: &AxisLimits,
) {
    let value_of = |code: KeyCode| values.get(&code).copied().unwrap_or(0);

    for button in &mut pad.buttons {
        let (pressed, value) = translate_button_press(
            classify(button.key_code),
            value_of(button.key_code),
            false,
            false,
            profile,
            limits,
        );
        button.pressed = pressed;
        button.value = if pressed { value } else { 0 };
    }

    let mut stick_val = [0i32; 4];
    for (i, stick) in pad.sticks.iter().take(4).enumerate() {
        let (_, val_min) = translate_button_press(
            classify(stick.key_min),
            value_of(stick.key_min),
            true,
            false,
            profile,
            limits,
        );
        let (_, val_max) = translate_button_press(
            classify(stick.key_max),
            value_of(stick.key_max),
            true,
            false,
            profile,
            limits,
        );
        stick_val[i] = i32::from(val_max) - i32::from(val_min);
    }

    let (mut lx, mut ly) =
        normalize_stick_deadzone(stick_val[0], stick_val[1], profile.left_stick_deadzone, limits);
    let (mut rx, mut ry) =
        normalize_stick_deadzone(stick_val[2], stick_val[3], profile.right_stick_deadzone, limits);

    if profile.left_squircle != 0 {
        (lx, ly) = convert_to_squircle_point(lx, ly, profile.left_squircle);
    }
    if profile.right_squircle != 0 {
        (rx, ry) = convert_to_squircle_point(rx, ry, profile.right_squircle);
    }

    let out = [lx, 255 - ly, rx, 255 - ry];
    for (stick, value) in pad.sticks.iter_mut().zip(out) {
        stick.value = value;
    }
}

/// A connection state change reported once per transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEdge {
    Connected,
    Disconnected,
}

/// Tracks the last known connection state of one binding
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    connected: bool,
}

impl ConnectionTracker {
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Record the current state and flag the pad on a transition
    ///
    /// A connect sets CONNECTED and ASSIGN_CHANGES, a disconnect clears
    /// CONNECTED and sets ASSIGN_CHANGES. Repeated states change nothing.
    pub fn update(&mut self, pad: &mut LogicalPad, connected: bool) -> Option<ConnectionEdge> {
        if connected == self.connected {
            return None;
        }
        self.connected = connected;
        if connected {
            info!("{} connected", pad.device_name);
            pad.port_status |= port_status::CONNECTED | port_status::ASSIGN_CHANGES;
            Some(ConnectionEdge::Connected)
        } else {
            info!("{} disconnected", pad.device_name);
            pad.port_status &= !port_status::CONNECTED;
            pad.port_status |= port_status::ASSIGN_CHANGES;
            pad.clear_input();
            Some(ConnectionEdge::Disconnected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HandlerKind;
    use crate::pad::{capability, digital1, digital2, offset, StandardLayout};

    const L2: KeyCode = 5;
    const CROSS: KeyCode = 3;
    const UP: KeyCode = 14;
    const LS_LEFT: KeyCode = 18;
    const LS_RIGHT: KeyCode = 19;
    const LS_DOWN: KeyCode = 20;
    const LS_UP: KeyCode = 21;

    fn layout() -> StandardLayout {
        StandardLayout {
            triangle: 1,
            circle: 2,
            cross: CROSS,
            square: 4,
            l2: L2,
            r2: 6,
            l1: 7,
            r1: 8,
            start: 9,
            select: 10,
            l3: 11,
            r3: 12,
            ps: 13,
            up: UP,
            down: 15,
            left: 16,
            right: 17,
            ls_left: LS_LEFT,
            ls_right: LS_RIGHT,
            ls_down: LS_DOWN,
            ls_up: LS_UP,
            rs_left: 22,
            rs_right: 23,
            rs_down: 24,
            rs_up: 25,
        }
    }

    fn classify(code: KeyCode) -> KeyClass {
        match code {
            L2 => KeyClass::LeftTrigger,
            6 => KeyClass::RightTrigger,
            18..=21 => KeyClass::LeftStick,
            22..=25 => KeyClass::RightStick,
            _ => KeyClass::Button,
        }
    }

    fn pad() -> LogicalPad {
        let mut pad = LogicalPad::default();
        pad.init("Test Pad", capability::PS3_CONFORMITY, &layout());
        pad
    }

    #[test]
    fn test_trigger_threshold() {
        let mut profile = PadProfile::for_handler(HandlerKind::Ds4);
        profile.left_trigger_threshold = 30;
        let limits = AxisLimits::BYTE;
        assert_eq!(
            translate_button_press(KeyClass::LeftTrigger, 20, false, false, &profile, &limits),
            (false, 0)
        );
        assert_eq!(
            translate_button_press(KeyClass::LeftTrigger, 255, false, false, &profile, &limits),
            (true, 255)
        );
        // ignoring the threshold only affects the pressed state
        let (pressed, value) =
            translate_button_press(KeyClass::LeftTrigger, 20, false, true, &profile, &limits);
        assert!(pressed);
        assert_eq!(value, 0);
    }

    #[test]
    fn test_stick_half_deadzone() {
        let profile = PadProfile::for_handler(HandlerKind::Ds4);
        let limits = AxisLimits::BYTE;
        assert_eq!(
            translate_button_press(KeyClass::LeftStick, 30, false, false, &profile, &limits),
            (false, 0)
        );
        assert_eq!(
            translate_button_press(KeyClass::LeftStick, 30, true, false, &profile, &limits),
            (true, 30)
        );
    }

    #[test]
    fn test_plain_button() {
        let profile = PadProfile::for_handler(HandlerKind::Ds4);
        let limits = AxisLimits::BYTE;
        assert_eq!(
            translate_button_press(KeyClass::Button, 0, false, false, &profile, &limits),
            (false, 0)
        );
        assert_eq!(
            translate_button_press(KeyClass::Button, 255, false, false, &profile, &limits),
            (true, 255)
        );
    }

    #[test]
    fn test_apply_mapping_buttons() {
        let mut pad = pad();
        let profile = PadProfile::for_handler(HandlerKind::Ds4);
        let values = HashMap::from([(CROSS, 255), (UP, 255), (L2, 128)]);
        apply_mapping(&mut pad, &values, classify, &profile, &AxisLimits::BYTE);

        assert_eq!(
            pad.digital(offset::DIGITAL2),
            digital2::CROSS | digital2::L2
        );
        assert_eq!(pad.digital(offset::DIGITAL1), digital1::UP);
        let l2 = pad.buttons.iter().find(|b| b.key_code == L2).unwrap();
        assert_eq!(l2.value, 128);
    }

    #[test]
    fn test_apply_mapping_neutral_sticks() {
        let mut pad = pad();
        let mut profile = PadProfile::for_handler(HandlerKind::Ds4);
        profile.left_squircle = 0;
        profile.right_squircle = 0;
        apply_mapping(&mut pad, &HashMap::new(), classify, &profile, &AxisLimits::BYTE);
        let values: Vec<u16> = pad.sticks.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![127, 128, 127, 128]);

        // squircling nudges the resting point by at most one step
        let profile = PadProfile::for_handler(HandlerKind::Ds4);
        apply_mapping(&mut pad, &HashMap::new(), classify, &profile, &AxisLimits::BYTE);
        for stick in &pad.sticks {
            assert!(stick.value.abs_diff(128) <= 2, "{}", stick.value);
        }
    }

    #[test]
    fn test_apply_mapping_inverts_y() {
        let mut pad = pad();
        let mut profile = PadProfile::for_handler(HandlerKind::Ds4);
        profile.left_squircle = 0;
        let values = HashMap::from([(LS_UP, 255), (LS_RIGHT, 255)]);
        apply_mapping(&mut pad, &values, classify, &profile, &AxisLimits::BYTE);

        // full right and full up
        assert!(pad.analog(offset::ANALOG_LEFT_X) > 200);
        assert!(pad.analog(offset::ANALOG_LEFT_Y) < 55);
    }

    #[test]
    fn test_opposite_halves_cancel() {
        let mut pad = pad();
        let mut profile = PadProfile::for_handler(HandlerKind::Ds4);
        profile.left_squircle = 0;
        let values = HashMap::from([(LS_LEFT, 200), (LS_RIGHT, 200)]);
        apply_mapping(&mut pad, &values, classify, &profile, &AxisLimits::BYTE);
        assert_eq!(pad.analog(offset::ANALOG_LEFT_X), 127);
    }

    #[test]
    fn test_connection_edges_once() {
        let mut pad = pad();
        let mut tracker = ConnectionTracker::default();

        assert_eq!(tracker.update(&mut pad, false), None);
        assert_eq!(pad.port_status, port_status::DISCONNECTED);

        assert_eq!(tracker.update(&mut pad, true), Some(ConnectionEdge::Connected));
        assert_eq!(
            pad.port_status,
            port_status::CONNECTED | port_status::ASSIGN_CHANGES
        );
        assert_eq!(tracker.update(&mut pad, true), None);

        pad.port_status &= !port_status::ASSIGN_CHANGES;
        assert_eq!(
            tracker.update(&mut pad, false),
            Some(ConnectionEdge::Disconnected)
        );
        assert_eq!(pad.port_status, port_status::ASSIGN_CHANGES);

        pad.port_status &= !port_status::ASSIGN_CHANGES;
        assert_eq!(tracker.update(&mut pad, false), None);
        assert_eq!(pad.port_status, port_status::DISCONNECTED);
    }
}
