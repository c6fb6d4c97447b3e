//! Output report encoding (rumble and lightbar)

use zerocopy::{FromZeros, IntoBytes};

use crate::crc;
use crate::protocol::{offset, output, report_id, size, OutputCommon};

/// Desired rumble and lightbar state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputState {
    /// Small (high frequency) motor
    pub small_motor: u8,
    /// Large (low frequency) motor
    pub large_motor: u8,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    /// Blink on time in 10 ms units, 0 for steady light
    pub blink_on: u8,
    /// Blink off time in 10 ms units
    pub blink_off: u8,
}

impl OutputState {
    fn to_common(self) -> OutputCommon {
        let mut common = OutputCommon::new_zeroed();
        common.valid_flag0 = output::VALID_FLAGS;
        common.motor_right = self.small_motor;
        common.motor_left = self.large_motor;
        common.lightbar_red = self.red;
        common.lightbar_green = self.green;
        common.lightbar_blue = self.blue;
        common.lightbar_blink_on = self.blink_on;
        common.lightbar_blink_off = self.blink_off;
        common
    }
}

/// Build the complete output report for the given connection type
pub fn encode_output_report(state: &OutputState, bluetooth: bool) -> Vec<u8> {
    let common = state.to_common();

    if bluetooth {
        let mut buf = vec![0u8; size::BT_OUTPUT];
        buf[0] = report_id::BT_OUTPUT;
        buf[offset::BT_OUTPUT_HW_CONTROL] = output::BT_HW_CONTROL;
        buf[offset::BT_OUTPUT_COMMON..offset::BT_OUTPUT_COMMON + size::OUTPUT_COMMON]
            .copy_from_slice(common.as_bytes());
        crc::write_bt_crc(crc::SEED_OUTPUT, &mut buf);
        buf
    } else {
        let mut buf = vec![0u8; size::USB_OUTPUT];
        buf[0] = report_id::USB_OUTPUT;
        buf[offset::USB_OUTPUT_COMMON..offset::USB_OUTPUT_COMMON + size::OUTPUT_COMMON]
            .copy_from_slice(common.as_bytes());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OutputState {
        OutputState {
            small_motor: 255,
            large_motor: 200,
            red: 0x11,
            green: 0x22,
            blue: 0x33,
            blink_on: 100,
            blink_off: 50,
        }
    }

    #[test]
    fn test_usb_layout() {
        let buf = encode_output_report(&sample(), false);
        assert_eq!(buf.len(), 32);
        assert_eq!(buf[0], 0x05);
        assert_eq!(buf[1], 0x07);
        assert_eq!(buf[4], 255);
        assert_eq!(buf[5], 200);
        assert_eq!(&buf[6..9], &[0x11, 0x22, 0x33]);
        assert_eq!(buf[9], 100);
        assert_eq!(buf[10], 50);
        assert!(buf[11..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_bluetooth_layout() {
        let buf = encode_output_report(&sample(), true);
        assert_eq!(buf.len(), 78);
        assert_eq!(buf[0], 0x11);
        assert_eq!(buf[1], 0xC4);
        assert_eq!(buf[3], 0x07);
        assert_eq!(buf[6], 255);
        assert_eq!(buf[7], 200);
        assert_eq!(&buf[8..11], &[0x11, 0x22, 0x33]);
        assert_eq!(buf[11], 100);
        assert_eq!(buf[12], 50);
        assert!(crc::verify_bt_crc(crc::SEED_OUTPUT, &buf).is_ok());
    }

    #[test]
    fn test_idle_report_keeps_flags() {
        let buf = encode_output_report(&OutputState::default(), false);
        assert_eq!(buf[1], output::VALID_FLAGS);
        assert!(buf[2..].iter().all(|&b| b == 0));
    }
}
