//! DS4 protocol layer for padbridge
//!
//! This crate talks to DualShock 4 compatible controllers over raw HID:
//!
//! - USB (wired controllers and the Sony wireless adapter)
//! - Bluetooth (full input reports with CRC-32 trailers)
//!
//! Report decoding and encoding are plain functions over byte buffers. All
//! OS access goes through the [`HidProvider`] / [`HidDevice`] traits so the
//! connection state machine in [`Ds4Session`] can be driven by a mock.

pub mod calibration;
pub mod crc;
pub mod device_registry;
pub mod error;
pub mod feature;
pub mod hid;
pub mod input;
pub mod output;
pub mod protocol;
pub mod session;
pub mod types;

pub use calibration::{apply_calibration, CalibrationData, CalibrationSet};
pub use device_registry::{is_dongle, is_ds4, DS4_IDS};
pub use error::{CalibrationError, TransportError};
pub use feature::FirmwareInfo;
pub use hid::{HidApiProvider, HidDevice, HidProvider};
pub use input::{decode_dpad, Ds4InputState, DpadState, FrameOutcome, TouchContact};
pub use output::OutputState;
pub use session::{Ds4Session, MIN_OUTPUT_INTERVAL};
pub use types::{Connection, ConnectionState, DataStatus, HidDeviceInfo, TransportType};
