//! Logical pad model and input shaping for padbridge
//!
//! Backend-independent pieces: the pad slot layout consumers read, the
//! signal math that turns raw backend values into pad values, the mapper that
//! applies a profile, and the TOML configuration.

pub mod config;
pub mod mapper;
pub mod pad;
pub mod signal;

pub use config::{ConfigError, HandlerKind, PadControl, PadProfile, PadbridgeConfig, PlayerConfig};
pub use mapper::{apply_mapping, translate_button_press, ConnectionEdge, ConnectionTracker, KeyClass};
pub use pad::{
    AnalogSensor, AnalogStick, Button, KeyCode, LogicalPad, PadInfo, StandardLayout, VibrateMotor,
    MAX_PORTS,
};
pub use signal::AxisLimits;
