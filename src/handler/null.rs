//! Null backend: binds any pad and keeps it disconnected

use std::sync::Arc;

use padbridge_pad::config::PadProfile;
use padbridge_pad::pad::{capability, port_status, StandardLayout};

use crate::dispatch::SharedPad;

pub const DEVICE_NAME: &str = "Default Null Device";

#[derive(Default)]
pub struct NullHandler {
    pads: Vec<Arc<SharedPad>>,
}

impl NullHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list_devices(&mut self) -> Vec<String> {
        vec![DEVICE_NAME.to_string()]
    }

    pub fn bind_pad(&mut self, pad: &Arc<SharedPad>, device: &str, _profile: &PadProfile) -> bool {
        let name = if device.is_empty() { DEVICE_NAME } else { device };
        pad.write().init(
            name,
            capability::PS3_CONFORMITY | capability::PRESS_MODE,
            &StandardLayout::default(),
        );
        pad.set_motors(0, 0);
        self.pads.push(Arc::clone(pad));
        true
    }

    pub fn tick(&mut self) {}

    pub fn shutdown(&mut self) {
        for pad in self.pads.drain(..) {
            pad.write().port_status = port_status::DISCONNECTED;
        }
    }
}
