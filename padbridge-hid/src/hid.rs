//! HID capability provider
//!
//! Sessions never touch `hidapi` directly. They go through [`HidProvider`]
//! (enumerate/open) and [`HidDevice`] (read/write/feature reports), so the
//! codec and the connection state machine run unchanged against an
//! in-memory device in tests.

use std::collections::HashSet;
use std::ffi::CString;

use hidapi::HidApi;
use tracing::debug;

use crate::device_registry;
use crate::error::TransportError;
use crate::types::{HidDeviceInfo, TransportType};

/// An open HID handle
///
/// Buffers follow hidapi conventions: byte 0 is the report id.
pub trait HidDevice {
    /// Read one input report; `Ok(0)` means nothing pending in non-blocking mode
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write one output report
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Fetch a feature report; `buf[0]` selects the report id
    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Switch between blocking and non-blocking reads
    fn set_nonblocking(&mut self, nonblocking: bool) -> Result<(), TransportError>;
}

/// Enumerates and opens HID devices
pub trait HidProvider {
    /// List attached devices matching any of the VID/PID pairs
    fn enumerate(&mut self, ids: &[(u16, u16)]) -> Result<Vec<HidDeviceInfo>, TransportError>;

    /// Open a previously enumerated device by path
    fn open(&mut self, info: &HidDeviceInfo) -> Result<Box<dyn HidDevice>, TransportError>;
}

/// [`HidProvider`] backed by the system hidapi library
pub struct HidApiProvider {
    api: HidApi,
}

impl HidApiProvider {
    pub fn new() -> Result<Self, TransportError> {
        Ok(Self {
            api: HidApi::new()?,
        })
    }
}

fn transport_type_of(info: &hidapi::DeviceInfo) -> TransportType {
    if matches!(info.bus_type(), hidapi::BusType::Bluetooth) {
        TransportType::Bluetooth
    } else if device_registry::is_dongle(info.vendor_id(), info.product_id()) {
        TransportType::Dongle
    } else {
        TransportType::Usb
    }
}

impl HidProvider for HidApiProvider {
    fn enumerate(&mut self, ids: &[(u16, u16)]) -> Result<Vec<HidDeviceInfo>, TransportError> {
        self.api.refresh_devices()?;

        let mut seen = HashSet::new();
        let mut devices = Vec::new();
        for info in self.api.device_list() {
            if !ids.contains(&(info.vendor_id(), info.product_id())) {
                continue;
            }
            let path = info.path().to_string_lossy().into_owned();
            if !seen.insert(path.clone()) {
                continue;
            }
            debug!(
                "Found HID device {:04x}:{:04x} at {}",
                info.vendor_id(),
                info.product_id(),
                path
            );
            devices.push(HidDeviceInfo {
                vid: info.vendor_id(),
                pid: info.product_id(),
                transport_type: transport_type_of(info),
                path,
                serial: info.serial_number().map(str::to_owned),
                product_name: info.product_string().map(str::to_owned),
            });
        }
        Ok(devices)
    }

    fn open(&mut self, info: &HidDeviceInfo) -> Result<Box<dyn HidDevice>, TransportError> {
        let path = CString::new(info.path.as_str())
            .map_err(|e| TransportError::Internal(format!("invalid device path: {e}")))?;
        let device = self.api.open_path(&path)?;
        Ok(Box::new(HidApiDevice { device }))
    }
}

struct HidApiDevice {
    device: hidapi::HidDevice,
}

impl HidDevice for HidApiDevice {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        Ok(self.device.read(buf)?)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        Ok(self.device.write(data)?)
    }

    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        Ok(self.device.get_feature_report(buf)?)
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> Result<(), TransportError> {
        Ok(self.device.set_blocking_mode(!nonblocking)?)
    }
}
