//! Transport and calibration error types

use thiserror::Error;

/// Errors that can occur while talking to a HID device
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Unexpected report: id 0x{id:02X}, {len} bytes")]
    UnexpectedReport { id: u8, len: usize },

    #[error("Short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("Checksum mismatch: reported 0x{reported:08X}, computed 0x{computed:08X}")]
    ChecksumError { reported: u32, computed: u32 },

    // HID-specific errors
    #[error("HID error: {0}")]
    HidError(String),

    #[error("HID permission denied: {0}")]
    HidPermissionDenied(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<hidapi::HidError> for TransportError {
    fn from(e: hidapi::HidError) -> Self {
        let msg = e.to_string();
        if msg.contains("Permission denied") || msg.contains("EPERM") {
            TransportError::HidPermissionDenied(msg)
        } else {
            TransportError::HidError(msg)
        }
    }
}

/// Reasons a calibration fetch produced no usable data
#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("calibration feature report 0x{report_id:02X} failed: {source}")]
    Transport {
        report_id: u8,
        #[source]
        source: TransportError,
    },

    #[error("calibration report too short: {len} of {expected} bytes")]
    ShortReport { len: usize, expected: usize },

    #[error("calibration report id 0x{actual:02X}, expected 0x{expected:02X}")]
    WrongReportId { expected: u8, actual: u8 },

    #[error("calibration CRC failed {attempts} times")]
    ChecksumExhausted { attempts: u32 },

    #[error("calibration denominator is zero for axis {axis}")]
    ZeroDenominator { axis: &'static str },
}
