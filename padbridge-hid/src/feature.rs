//! Identity and mode feature reports

use tracing::debug;

use crate::error::TransportError;
use crate::hid::HidDevice;
use crate::protocol::{report_id, size};

/// Hardware and firmware versions from feature report 0xA3
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FirmwareInfo {
    pub hw_version: u32,
    pub fw_version: u32,
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn get_exact(device: &mut dyn HidDevice, id: u8, buf: &mut [u8]) -> Result<(), TransportError> {
    buf[0] = id;
    let len = device.get_feature_report(buf)?;
    if len != buf.len() || buf[0] != id {
        return Err(TransportError::UnexpectedReport { id: buf[0], len });
    }
    Ok(())
}

/// Read the controller MAC address as a serial string
///
/// Only wired controllers answer; the address is stored little-endian in
/// bytes 1..7.
pub fn read_serial(device: &mut dyn HidDevice) -> Result<String, TransportError> {
    let mut buf = [0u8; size::SERIAL];
    get_exact(device, report_id::SERIAL, &mut buf)?;
    let serial = buf[1..7]
        .iter()
        .rev()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":");
    Ok(serial)
}

/// Read hardware and firmware versions
pub fn read_firmware_info(device: &mut dyn HidDevice) -> Result<FirmwareInfo, TransportError> {
    let mut buf = [0u8; size::FIRMWARE_INFO];
    get_exact(device, report_id::FIRMWARE_INFO, &mut buf)?;
    Ok(FirmwareInfo {
        hw_version: read_u32(&buf, 35),
        fw_version: read_u32(&buf, 41),
    })
}

/// Ask a Bluetooth controller to switch from reduced to full input reports
///
/// Reading the 0x02 feature report is what flips the mode; the content is
/// ignored.
pub fn request_full_reports(device: &mut dyn HidDevice) -> Result<(), TransportError> {
    let mut buf = [0u8; size::BT_ENABLE_FULL_REPORTS];
    buf[0] = report_id::BT_ENABLE_FULL_REPORTS;
    let len = device.get_feature_report(&mut buf)?;
    debug!("Requested full input reports ({} byte reply)", len);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FeatureOnly {
        reply: Vec<u8>,
        requested: Vec<u8>,
    }

    impl HidDevice for FeatureOnly {
        fn read(&mut self, _buf: &mut [u8]) -> Result<usize, TransportError> {
            Ok(0)
        }
        fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
            Ok(data.len())
        }
        fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
            self.requested.push(buf[0]);
            let n = self.reply.len().min(buf.len());
            buf[..n].copy_from_slice(&self.reply[..n]);
            Ok(n)
        }
        fn set_nonblocking(&mut self, _nonblocking: bool) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[test]
    fn test_serial_from_mac() {
        let mut dev = FeatureOnly {
            reply: vec![0x81, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11],
            requested: Vec::new(),
        };
        assert_eq!(read_serial(&mut dev).unwrap(), "11:22:33:44:55:66");
        assert_eq!(dev.requested, vec![0x81]);
    }

    #[test]
    fn test_serial_wrong_size() {
        let mut dev = FeatureOnly {
            reply: vec![0x81, 0x00],
            requested: Vec::new(),
        };
        assert!(matches!(
            read_serial(&mut dev),
            Err(TransportError::UnexpectedReport { id: 0x81, len: 2 })
        ));
    }

    #[test]
    fn test_firmware_info() {
        let mut reply = vec![0u8; 49];
        reply[0] = 0xA3;
        reply[35..39].copy_from_slice(&0x0100u32.to_le_bytes());
        reply[41..45].copy_from_slice(&0x8001u32.to_le_bytes());
        let mut dev = FeatureOnly {
            reply,
            requested: Vec::new(),
        };
        let info = read_firmware_info(&mut dev).unwrap();
        assert_eq!(info.hw_version, 0x0100);
        assert_eq!(info.fw_version, 0x8001);
    }

    #[test]
    fn test_full_report_request_uses_0x02() {
        let mut dev = FeatureOnly {
            reply: vec![0x02; 64],
            requested: Vec::new(),
        };
        request_full_reports(&mut dev).unwrap();
        assert_eq!(dev.requested, vec![0x02]);
    }
}
