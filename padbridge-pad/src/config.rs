//! Pad configuration
//!
//! Stored as TOML. Each player slot names a backend, a device and a profile
//! holding the remap table and stick/trigger/LED/rumble tuning. Missing
//! profile fields take the backend's defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::pad::MAX_PORTS;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("unknown handler \"{0}\"")]
    UnknownHandler(String),
}

/// Input backend kinds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    #[default]
    Null,
    Keyboard,
    Ds4,
    XInput,
    Gilrs,
    Evdev,
}

impl HandlerKind {
    pub const ALL: [HandlerKind; 6] = [
        HandlerKind::Null,
        HandlerKind::Keyboard,
        HandlerKind::Ds4,
        HandlerKind::XInput,
        HandlerKind::Gilrs,
        HandlerKind::Evdev,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            HandlerKind::Null => "null",
            HandlerKind::Keyboard => "keyboard",
            HandlerKind::Ds4 => "ds4",
            HandlerKind::XInput => "xinput",
            HandlerKind::Gilrs => "gilrs",
            HandlerKind::Evdev => "evdev",
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HandlerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HandlerKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownHandler(s.to_string()))
    }
}

/// Remappable pad controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PadControl {
    Triangle,
    Circle,
    Cross,
    Square,
    L1,
    L2,
    L3,
    R1,
    R2,
    R3,
    Start,
    Select,
    Ps,
    Up,
    Down,
    Left,
    Right,
    LsLeft,
    LsRight,
    LsDown,
    LsUp,
    RsLeft,
    RsRight,
    RsDown,
    RsUp,
}

impl PadControl {
    pub const ALL: [PadControl; 25] = [
        PadControl::Triangle,
        PadControl::Circle,
        PadControl::Cross,
        PadControl::Square,
        PadControl::L1,
        PadControl::L2,
        PadControl::L3,
        PadControl::R1,
        PadControl::R2,
        PadControl::R3,
        PadControl::Start,
        PadControl::Select,
        PadControl::Ps,
        PadControl::Up,
        PadControl::Down,
        PadControl::Left,
        PadControl::Right,
        PadControl::LsLeft,
        PadControl::LsRight,
        PadControl::LsDown,
        PadControl::LsUp,
        PadControl::RsLeft,
        PadControl::RsRight,
        PadControl::RsDown,
        PadControl::RsUp,
    ];
}

/// Default key names per control, in [`PadControl::ALL`] order
fn default_button_names(kind: HandlerKind) -> [&'static str; 25] {
    match kind {
        HandlerKind::Ds4 => [
            "Triangle", "Circle", "Cross", "Square", "L1", "L2", "L3", "R1", "R2", "R3",
            "Options", "Share", "PS Button", "Up", "Down", "Left", "Right", "LS X-", "LS X+",
            "LS Y-", "LS Y+", "RS X-", "RS X+", "RS Y-", "RS Y+",
        ],
        HandlerKind::XInput | HandlerKind::Gilrs => [
            "Y", "B", "A", "X", "LB", "LT", "LS", "RB", "RT", "RS", "Start", "Back", "Guide",
            "Up", "Down", "Left", "Right", "LS X-", "LS X+", "LS Y-", "LS Y+", "RS X-", "RS X+",
            "RS Y-", "RS Y+",
        ],
        HandlerKind::Evdev => [
            "BTN_Y", "BTN_B", "BTN_A", "BTN_X", "BTN_TL", "ABS_Z+", "BTN_THUMBL", "BTN_TR",
            "ABS_RZ+", "BTN_THUMBR", "BTN_START", "BTN_SELECT", "BTN_MODE", "ABS_HAT0Y-",
            "ABS_HAT0Y+", "ABS_HAT0X-", "ABS_HAT0X+", "ABS_X-", "ABS_X+", "ABS_Y+", "ABS_Y-",
            "ABS_RX-", "ABS_RX+", "ABS_RY+", "ABS_RY-",
        ],
        HandlerKind::Keyboard => [
            "V", "C", "X", "Z", "Q", "R", "F", "E", "T", "G", "Enter", "Space", "Backspace",
            "Up", "Down", "Left", "Right", "A", "D", "S", "W", "Delete", "End", "PageDown",
            "Home",
        ],
        HandlerKind::Null => [""; 25],
    }
}

/// Per-player tuning and remap table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PadProfile {
    /// Control -> backend key name
    pub buttons: BTreeMap<PadControl, String>,
    pub left_stick_deadzone: u32,
    pub right_stick_deadzone: u32,
    pub left_trigger_threshold: u32,
    pub right_trigger_threshold: u32,
    /// Percent
    pub left_stick_multiplier: i32,
    pub right_stick_multiplier: i32,
    /// Squircle factor, 0 disables
    pub left_squircle: i32,
    pub right_squircle: i32,
    pub led_color: [u8; 3],
    pub led_low_battery_blink: bool,
    pub led_battery_indicator: bool,
    pub led_battery_indicator_brightness: u8,
    pub switch_vibration_motors: bool,
    pub enable_vibration_motor_large: bool,
    pub enable_vibration_motor_small: bool,
}

impl Default for PadProfile {
    fn default() -> Self {
        Self::for_handler(HandlerKind::Null)
    }
}

impl PadProfile {
    /// Defaults tuned for the given backend's raw ranges
    pub fn for_handler(kind: HandlerKind) -> Self {
        let buttons = if kind == HandlerKind::Null {
            BTreeMap::new()
        } else {
            PadControl::ALL
                .into_iter()
                .zip(default_button_names(kind))
                .map(|(control, name)| (control, name.to_string()))
                .collect()
        };

        let (stick_deadzone, trigger_threshold, squircle) = match kind {
            HandlerKind::Ds4 => (40, 0, 8000),
            HandlerKind::XInput => (7849, 30, 8000),
            HandlerKind::Gilrs => (8000, 0, 8000),
            HandlerKind::Evdev => (30, 0, 5000),
            HandlerKind::Keyboard | HandlerKind::Null => (0, 0, 0),
        };
        let right_stick_deadzone = if kind == HandlerKind::XInput {
            8689
        } else {
            stick_deadzone
        };

        Self {
            buttons,
            left_stick_deadzone: stick_deadzone,
            right_stick_deadzone,
            left_trigger_threshold: trigger_threshold,
            right_trigger_threshold: trigger_threshold,
            left_stick_multiplier: 100,
            right_stick_multiplier: 100,
            left_squircle: squircle,
            right_squircle: squircle,
            led_color: [0, 0, 20],
            led_low_battery_blink: true,
            led_battery_indicator: false,
            led_battery_indicator_brightness: 10,
            switch_vibration_motors: false,
            enable_vibration_motor_large: true,
            enable_vibration_motor_small: true,
        }
    }

    /// Configured key name for a control, falling back to the backend default
    pub fn button_name(&self, control: PadControl, kind: HandlerKind) -> &str {
        match self.buttons.get(&control) {
            Some(name) => name,
            None => Self::default_button_name(control, kind),
        }
    }

    pub fn default_button_name(control: PadControl, kind: HandlerKind) -> &'static str {
        let index = PadControl::ALL
            .iter()
            .position(|c| *c == control)
            .unwrap_or_default();
        default_button_names(kind)[index]
    }

    /// Large motor speed after swap/enable flags; `motors` is [large, small]
    pub fn large_motor_speed(&self, motors: [u8; 2]) -> u8 {
        let index = if self.switch_vibration_motors { 1 } else { 0 };
        if self.enable_vibration_motor_large {
            motors[index]
        } else {
            0
        }
    }

    /// Small motor speed after swap/enable flags; `motors` is [large, small]
    pub fn small_motor_speed(&self, motors: [u8; 2]) -> u8 {
        let index = if self.switch_vibration_motors { 0 } else { 1 };
        if self.enable_vibration_motor_small {
            motors[index]
        } else {
            0
        }
    }
}

/// One logical pad slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PlayerRepr")]
pub struct PlayerConfig {
    pub handler: HandlerKind,
    /// Device name as listed by the backend
    pub device: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<PadProfile>,
}

impl PlayerConfig {
    pub fn new(handler: HandlerKind, device: impl Into<String>) -> Self {
        Self {
            handler,
            device: device.into(),
            profile: None,
        }
    }

    /// Profile to bind with
    pub fn effective_profile(&self) -> PadProfile {
        self.profile
            .clone()
            .unwrap_or_else(|| PadProfile::for_handler(self.handler))
    }
}

/// On-disk player entry; profile fields left out keep the handler defaults
#[derive(Deserialize)]
struct PlayerRepr {
    handler: HandlerKind,
    #[serde(default)]
    device: String,
    #[serde(default)]
    profile: Option<ProfilePatch>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct ProfilePatch {
    buttons: BTreeMap<PadControl, String>,
    left_stick_deadzone: Option<u32>,
    right_stick_deadzone: Option<u32>,
    left_trigger_threshold: Option<u32>,
    right_trigger_threshold: Option<u32>,
    left_stick_multiplier: Option<i32>,
    right_stick_multiplier: Option<i32>,
    left_squircle: Option<i32>,
    right_squircle: Option<i32>,
    led_color: Option<[u8; 3]>,
    led_low_battery_blink: Option<bool>,
    led_battery_indicator: Option<bool>,
    led_battery_indicator_brightness: Option<u8>,
    switch_vibration_motors: Option<bool>,
    enable_vibration_motor_large: Option<bool>,
    enable_vibration_motor_small: Option<bool>,
}

impl ProfilePatch {
    fn apply(self, base: &mut PadProfile) {
        base.buttons.extend(self.buttons);
        macro_rules! patch {
            ($($field:ident),*) => {
                $(if let Some(value) = self.$field {
                    base.$field = value;
                })*
            };
        }
        patch!(
            left_stick_deadzone,
            right_stick_deadzone,
            left_trigger_threshold,
            right_trigger_threshold,
            left_stick_multiplier,
            right_stick_multiplier,
            left_squircle,
            right_squircle,
            led_color,
            led_low_battery_blink,
            led_battery_indicator,
            led_battery_indicator_brightness,
            switch_vibration_motors,
            enable_vibration_motor_large,
            enable_vibration_motor_small
        );
    }
}

impl From<PlayerRepr> for PlayerConfig {
    fn from(repr: PlayerRepr) -> Self {
        let profile = repr.profile.map(|patch| {
            let mut profile = PadProfile::for_handler(repr.handler);
            patch.apply(&mut profile);
            profile
        });
        Self {
            handler: repr.handler,
            device: repr.device,
            profile,
        }
    }
}

/// Complete pad configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PadbridgeConfig {
    /// Player slots in port order; entries past the port limit are ignored
    #[serde(default)]
    pub players: Vec<PlayerConfig>,
}

impl PadbridgeConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("padbridge")
            .join("pads.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Configured slots, capped at the port limit
    pub fn active_players(&self) -> &[PlayerConfig] {
        &self.players[..self.players.len().min(MAX_PORTS)]
    }
}
