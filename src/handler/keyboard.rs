//! Keyboard backend
//!
//! The host window feeds key presses into a [`KeyboardState`]; every bound
//! pad reads pressed keys as full-scale values.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use padbridge_pad::config::{HandlerKind, PadProfile};
use padbridge_pad::pad::{capability, KeyCode};
use padbridge_pad::signal::AxisLimits;
use parking_lot::RwLock;

use super::{resolve_layout, Binding};
use crate::dispatch::SharedPad;

/// The single device this backend exposes
pub const DEVICE_NAME: &str = "Keyboard";

const CAPABILITY: u32 = capability::PS3_CONFORMITY | capability::PRESS_MODE;

/// Key names the backend understands; the keycode is the index plus one
const KEY_NAMES: &[&str] = &[
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R", "S",
    "T", "U", "V", "W", "X", "Y", "Z", "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "Up",
    "Down", "Left", "Right", "Enter", "Space", "Backspace", "Tab", "Escape", "Shift", "Ctrl",
    "Alt", "Insert", "Delete", "Home", "End", "PageUp", "PageDown", "F1", "F2", "F3", "F4", "F5",
    "F6", "F7", "F8", "F9", "F10", "F11", "F12",
];

fn key_code(name: &str) -> Option<KeyCode> {
    KEY_NAMES
        .iter()
        .position(|n| n.eq_ignore_ascii_case(name))
        .map(|i| i as KeyCode + 1)
}

/// Host-fed set of pressed key names
#[derive(Debug, Clone, Default)]
pub struct KeyboardState {
    pressed: Arc<RwLock<HashSet<KeyCode>>>,
}

impl KeyboardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a key as held; unknown names are ignored
    pub fn press(&self, name: &str) {
        if let Some(code) = key_code(name) {
            self.pressed.write().insert(code);
        }
    }

    pub fn release(&self, name: &str) {
        if let Some(code) = key_code(name) {
            self.pressed.write().remove(&code);
        }
    }

    pub fn release_all(&self) {
        self.pressed.write().clear();
    }

    fn values(&self) -> HashMap<KeyCode, u16> {
        self.pressed.read().iter().map(|code| (*code, 255)).collect()
    }
}

pub struct KeyboardHandler {
    state: KeyboardState,
    bindings: Vec<Binding>,
}

impl KeyboardHandler {
    pub fn new(state: KeyboardState) -> Self {
        Self {
            state,
            bindings: Vec::new(),
        }
    }

    pub fn list_devices(&mut self) -> Vec<String> {
        vec![DEVICE_NAME.to_string()]
    }

    pub fn bind_pad(&mut self, pad: &Arc<SharedPad>, device: &str, profile: &PadProfile) -> bool {
        if device != DEVICE_NAME {
            return false;
        }
        let layout = resolve_layout(HandlerKind::Keyboard, profile, key_code);
        self.bindings
            .push(Binding::new(pad, DEVICE_NAME, CAPABILITY, profile, layout));
        true
    }

    pub fn tick(&mut self) {
        let values = self.state.values();
        for binding in &mut self.bindings {
            binding.update_connection(true);
            binding.apply(&values, &AxisLimits::BYTE);
            binding.motors();
        }
    }

    pub fn shutdown(&mut self) {
        self.bindings.clear();
    }
}
