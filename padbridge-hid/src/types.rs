//! Common types for the HID layer

use serde::Serialize;

/// How a controller is attached to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TransportType {
    /// Direct USB cable
    Usb,
    /// Sony wireless adapter (USB on the host side)
    Dongle,
    /// Bluetooth Classic HID
    Bluetooth,
}

impl TransportType {
    /// Check if this transport is wireless
    pub fn is_wireless(&self) -> bool {
        matches!(self, Self::Dongle | Self::Bluetooth)
    }

    /// Bluetooth reports carry a prefix and a trailing CRC
    pub fn is_bluetooth(&self) -> bool {
        matches!(self, Self::Bluetooth)
    }
}

/// Device identification information
#[derive(Debug, Clone, Serialize)]
pub struct HidDeviceInfo {
    /// USB Vendor ID
    pub vid: u16,
    /// USB Product ID
    pub pid: u16,
    /// Transport type
    pub transport_type: TransportType,
    /// OS device path, used to reopen the device after a disconnect
    pub path: String,
    /// Serial number reported by the OS, if any
    pub serial: Option<String>,
    /// Product name if available
    pub product_name: Option<String>,
}

/// Result of one non-blocking read attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataStatus {
    /// A fresh, validated report was copied into the session buffer
    NewData,
    /// Nothing usable arrived this tick
    NoNewData,
    /// The handle failed and has to be recycled
    ReadError,
}

/// Connection state of a physical device session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// A handle is being (re)opened
    Connecting,
    Connected,
}

/// Outcome of a session's per-tick connection check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    /// Connected and a new report was decoded
    Connected,
    /// Connected but no new report this tick
    NoData,
    Disconnected,
}
