//! Device registry - DS4 detection by VID/PID
//!
//! The transport (USB vs Bluetooth) comes from the OS bus type; the registry
//! only tells which devices speak the DS4 protocol and which of them is the
//! Sony wireless adapter.

/// Sony vendor ID
pub const SONY_VID: u16 = 0x054C;

/// Zeroplus vendor ID (third party DS4 clones)
pub const ZEROPLUS_VID: u16 = 0x0C12;

/// Sony wireless adapter (CUH-ZWA1)
pub const PID_DONGLE: u16 = 0x0BA0;

/// First generation controller (CUH-ZCT1x)
pub const PID_ZCT1: u16 = 0x05C4;

/// Second generation controller (CUH-ZCT2x)
pub const PID_ZCT2: u16 = 0x09CC;

/// Zeroplus clone
pub const PID_ZEROPLUS: u16 = 0x0E20;

/// Every VID/PID pair handled by the DS4 backend
pub const DS4_IDS: &[(u16, u16)] = &[
    (SONY_VID, PID_DONGLE),
    (SONY_VID, PID_ZCT1),
    (SONY_VID, PID_ZCT2),
    (ZEROPLUS_VID, PID_ZEROPLUS),
];

/// Check if a VID/PID pair speaks the DS4 protocol
#[inline]
pub fn is_ds4(vid: u16, pid: u16) -> bool {
    DS4_IDS.contains(&(vid, pid))
}

/// Check if a VID/PID pair is the wireless adapter
///
/// The adapter enumerates even with no controller paired; the input report
/// then flags the controller as absent.
#[inline]
pub fn is_dongle(vid: u16, pid: u16) -> bool {
    vid == SONY_VID && pid == PID_DONGLE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_ds4_ids() {
        assert!(is_ds4(0x054C, 0x05C4));
        assert!(is_ds4(0x054C, 0x09CC));
        assert!(is_ds4(0x054C, 0x0BA0));
        assert!(is_ds4(0x0C12, 0x0E20));
    }

    #[test]
    fn test_foreign_ids_rejected() {
        assert!(!is_ds4(0x054C, 0x0CE6)); // DualSense
        assert!(!is_ds4(0x045E, 0x028E)); // Xbox 360
        assert!(!is_ds4(0x0C12, 0x05C4)); // wrong vendor for the pid
    }

    #[test]
    fn test_dongle_detection() {
        assert!(is_dongle(0x054C, 0x0BA0));
        assert!(!is_dongle(0x054C, 0x05C4));
        assert!(!is_dongle(0x0C12, 0x0BA0));
    }
}
