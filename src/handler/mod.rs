//! Backend handlers
//!
//! One handler per backend kind. A handler owns its device sessions and the
//! pads bound to them; the dispatch thread calls [`Backend::tick`] on every
//! handler once per loop iteration.

pub mod ds4;
#[cfg(target_os = "linux")]
pub mod evdev;
pub mod gilrs;
pub mod keyboard;
pub mod null;
pub mod xinput;

use std::collections::HashMap;
use std::sync::Arc;

use padbridge_pad::config::{HandlerKind, PadControl, PadProfile};
use padbridge_pad::mapper::{apply_mapping, ConnectionEdge, ConnectionTracker, KeyClass};
use padbridge_pad::pad::{KeyCode, StandardLayout};
use padbridge_pad::signal::AxisLimits;
use tracing::warn;

use crate::dispatch::{Providers, SharedPad};

pub use self::ds4::Ds4Handler;
#[cfg(target_os = "linux")]
pub use self::evdev::EvdevHandler;
pub use self::gilrs::GilrsHandler;
pub use self::keyboard::{KeyboardHandler, KeyboardState};
pub use self::null::NullHandler;
pub use self::xinput::{XInputError, XInputHandler, XInputSource};

/// Every supported backend, matched exhaustively by dispatch
pub enum Backend {
    Null(NullHandler),
    Keyboard(KeyboardHandler),
    Ds4(Ds4Handler),
    XInput(XInputHandler),
    Gilrs(GilrsHandler),
    #[cfg(target_os = "linux")]
    Evdev(EvdevHandler),
}

impl Backend {
    /// Build the handler for `kind`, taking the OS provider it needs
    ///
    /// Returns `None` when the provider is missing or the backend does not
    /// exist on this platform.
    pub fn create(kind: HandlerKind, providers: &mut Providers) -> Option<Self> {
        match kind {
            HandlerKind::Null => Some(Backend::Null(NullHandler::new())),
            HandlerKind::Keyboard => Some(Backend::Keyboard(KeyboardHandler::new(
                providers.keyboard.clone(),
            ))),
            HandlerKind::Ds4 => providers.hid.take().map(|p| Backend::Ds4(Ds4Handler::new(p))),
            HandlerKind::XInput => providers
                .xinput
                .take()
                .map(|s| Backend::XInput(XInputHandler::new(s))),
            HandlerKind::Gilrs => Some(Backend::Gilrs(GilrsHandler::new())),
            #[cfg(target_os = "linux")]
            HandlerKind::Evdev => Some(Backend::Evdev(EvdevHandler::new())),
            #[cfg(not(target_os = "linux"))]
            HandlerKind::Evdev => None,
        }
    }

    pub fn kind(&self) -> HandlerKind {
        match self {
            Backend::Null(_) => HandlerKind::Null,
            Backend::Keyboard(_) => HandlerKind::Keyboard,
            Backend::Ds4(_) => HandlerKind::Ds4,
            Backend::XInput(_) => HandlerKind::XInput,
            Backend::Gilrs(_) => HandlerKind::Gilrs,
            #[cfg(target_os = "linux")]
            Backend::Evdev(_) => HandlerKind::Evdev,
        }
    }

    /// Names of the devices this backend can currently bind
    pub fn list_devices(&mut self) -> Vec<String> {
        match self {
            Backend::Null(h) => h.list_devices(),
            Backend::Keyboard(h) => h.list_devices(),
            Backend::Ds4(h) => h.list_devices(),
            Backend::XInput(h) => h.list_devices(),
            Backend::Gilrs(h) => h.list_devices(),
            #[cfg(target_os = "linux")]
            Backend::Evdev(h) => h.list_devices(),
        }
    }

    /// Bind `pad` to the named device; false if the device is unknown
    pub fn bind_pad(&mut self, pad: &Arc<SharedPad>, device: &str, profile: &PadProfile) -> bool {
        match self {
            Backend::Null(h) => h.bind_pad(pad, device, profile),
            Backend::Keyboard(h) => h.bind_pad(pad, device, profile),
            Backend::Ds4(h) => h.bind_pad(pad, device, profile),
            Backend::XInput(h) => h.bind_pad(pad, device, profile),
            Backend::Gilrs(h) => h.bind_pad(pad, device, profile),
            #[cfg(target_os = "linux")]
            Backend::Evdev(h) => h.bind_pad(pad, device, profile),
        }
    }

    /// Poll every bound device once and push pending output
    pub fn tick(&mut self) {
        match self {
            Backend::Null(h) => h.tick(),
            Backend::Keyboard(h) => h.tick(),
            Backend::Ds4(h) => h.tick(),
            Backend::XInput(h) => h.tick(),
            Backend::Gilrs(h) => h.tick(),
            #[cfg(target_os = "linux")]
            Backend::Evdev(h) => h.tick(),
        }
    }

    /// Stop rumble, close handles and release every binding
    pub fn shutdown(&mut self) {
        match self {
            Backend::Null(h) => h.shutdown(),
            Backend::Keyboard(h) => h.shutdown(),
            Backend::Ds4(h) => h.shutdown(),
            Backend::XInput(h) => h.shutdown(),
            Backend::Gilrs(h) => h.shutdown(),
            #[cfg(target_os = "linux")]
            Backend::Evdev(h) => h.shutdown(),
        }
    }
}

/// Mutable keycode slot of `layout` for a control
fn layout_slot(layout: &mut StandardLayout, control: PadControl) -> &mut KeyCode {
    match control {
        PadControl::Triangle => &mut layout.triangle,
        PadControl::Circle => &mut layout.circle,
        PadControl::Cross => &mut layout.cross,
        PadControl::Square => &mut layout.square,
        PadControl::L1 => &mut layout.l1,
        PadControl::L2 => &mut layout.l2,
        PadControl::L3 => &mut layout.l3,
        PadControl::R1 => &mut layout.r1,
        PadControl::R2 => &mut layout.r2,
        PadControl::R3 => &mut layout.r3,
        PadControl::Start => &mut layout.start,
        PadControl::Select => &mut layout.select,
        PadControl::Ps => &mut layout.ps,
        PadControl::Up => &mut layout.up,
        PadControl::Down => &mut layout.down,
        PadControl::Left => &mut layout.left,
        PadControl::Right => &mut layout.right,
        PadControl::LsLeft => &mut layout.ls_left,
        PadControl::LsRight => &mut layout.ls_right,
        PadControl::LsDown => &mut layout.ls_down,
        PadControl::LsUp => &mut layout.ls_up,
        PadControl::RsLeft => &mut layout.rs_left,
        PadControl::RsRight => &mut layout.rs_right,
        PadControl::RsDown => &mut layout.rs_down,
        PadControl::RsUp => &mut layout.rs_up,
    }
}

/// Resolve the profile's remap table into backend keycodes
///
/// Unknown names fall back to the backend's default name for that control.
pub(crate) fn resolve_layout(
    kind: HandlerKind,
    profile: &PadProfile,
    lookup: impl Fn(&str) -> Option<KeyCode>,
) -> StandardLayout {
    let mut layout = StandardLayout::default();
    for control in PadControl::ALL {
        let name = profile.button_name(control, kind);
        let code = match lookup(name) {
            Some(code) => code,
            None => {
                let fallback = PadProfile::default_button_name(control, kind);
                warn!(
                    "Unknown {} key {:?} for {:?}, using default {:?}",
                    kind, name, control, fallback
                );
                lookup(fallback).unwrap_or_default()
            }
        };
        *layout_slot(&mut layout, control) = code;
    }
    layout
}

/// Number repeated device names: the second "Pad" becomes "2. Pad"
pub(crate) fn unique_names<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen: HashMap<String, u32> = HashMap::new();
    names
        .into_iter()
        .map(|name| match seen.get_mut(&name) {
            Some(count) => {
                *count += 1;
                format!("{}. {}", count, name)
            }
            None => {
                seen.insert(name.clone(), 1);
                name
            }
        })
        .collect()
}

/// Threshold class of a keycode within a bound layout
fn classify(layout: &StandardLayout, code: KeyCode) -> KeyClass {
    if code == layout.l2 {
        KeyClass::LeftTrigger
    } else if code == layout.r2 {
        KeyClass::RightTrigger
    } else if [layout.ls_left, layout.ls_right, layout.ls_down, layout.ls_up].contains(&code) {
        KeyClass::LeftStick
    } else if [layout.rs_left, layout.rs_right, layout.rs_down, layout.rs_up].contains(&code) {
        KeyClass::RightStick
    } else {
        KeyClass::Button
    }
}

/// A pad bound to one physical device
pub(crate) struct Binding {
    pub pad: Arc<SharedPad>,
    pub profile: PadProfile,
    pub layout: StandardLayout,
    tracker: ConnectionTracker,
}

impl Binding {
    /// Initialize `pad` for `device_name` and remember the binding
    pub fn new(
        pad: &Arc<SharedPad>,
        device_name: &str,
        capability: u32,
        profile: &PadProfile,
        layout: StandardLayout,
    ) -> Self {
        pad.write().init(device_name, capability, &layout);
        pad.set_motors(0, 0);
        Self {
            pad: Arc::clone(pad),
            profile: profile.clone(),
            layout,
            tracker: ConnectionTracker::default(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.tracker.is_connected()
    }

    /// Record this tick's connection state, flagging the pad on a change
    pub fn update_connection(&mut self, connected: bool) -> Option<ConnectionEdge> {
        let mut pad = self.pad.write();
        self.tracker.update(&mut pad, connected)
    }

    /// Map a backend key table onto the pad
    pub fn apply(&self, values: &HashMap<KeyCode, u16>, limits: &AxisLimits) {
        let layout = &self.layout;
        let mut pad = self.pad.write();
        apply_mapping(
            &mut pad,
            values,
            |code| classify(layout, code),
            &self.profile,
            limits,
        );
    }

    /// Latch the requested motor speeds into the pad and return them as [large, small]
    pub fn motors(&self) -> [u8; 2] {
        let motors = self.pad.motors();
        let mut pad = self.pad.write();
        for motor in &mut pad.motors {
            motor.value = if motor.is_large { motors[0] } else { motors[1] };
        }
        motors
    }

    /// Motor speeds after the profile's swap/enable flags, as [large, small]
    pub fn motor_speeds(&self) -> [u8; 2] {
        let motors = self.motors();
        [
            self.profile.large_motor_speed(motors),
            self.profile.small_motor_speed(motors),
        ]
    }

    pub fn set_battery(&self, level: u8, cable: bool) {
        let mut pad = self.pad.write();
        pad.battery_level = level;
        pad.cable_state = cable;
    }
}
