//! DS4 wire protocol constants and report layouts
//!
//! Report ids, sizes and byte offsets are named here once; the decode and
//! encode functions in [`crate::input`], [`crate::output`] and
//! [`crate::calibration`] only refer to these names.

use zerocopy::little_endian::{I16, U16};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Report ids (byte 0 of every report)
pub mod report_id {
    /// USB input report, also sent over Bluetooth before full reports are enabled
    pub const USB_INPUT: u8 = 0x01;
    /// Bluetooth full input report
    pub const BT_INPUT: u8 = 0x11;
    /// USB output report (rumble / lightbar)
    pub const USB_OUTPUT: u8 = 0x05;
    /// Bluetooth output report (rumble / lightbar)
    pub const BT_OUTPUT: u8 = 0x11;
    /// USB calibration feature report
    pub const USB_CALIBRATION: u8 = 0x02;
    /// Bluetooth calibration feature report
    pub const BT_CALIBRATION: u8 = 0x05;
    /// Feature request that switches a Bluetooth controller to full reports
    pub const BT_ENABLE_FULL_REPORTS: u8 = 0x02;
    /// Pairing info feature report (MAC address, wired only)
    pub const SERIAL: u8 = 0x81;
    /// Hardware / firmware version feature report
    pub const FIRMWARE_INFO: u8 = 0xA3;
}

/// Report sizes in bytes, report id included
pub mod size {
    pub const USB_INPUT: usize = 64;
    pub const BT_INPUT: usize = 78;
    pub const USB_OUTPUT: usize = 32;
    pub const BT_OUTPUT: usize = 78;
    pub const USB_CALIBRATION: usize = 37;
    pub const BT_CALIBRATION: usize = 41;
    pub const BT_ENABLE_FULL_REPORTS: usize = 64;
    pub const SERIAL: usize = 7;
    pub const FIRMWARE_INFO: usize = 49;
    /// Shared block of every input report
    pub const INPUT_COMMON: usize = 32;
    /// Shared block of every output report
    pub const OUTPUT_COMMON: usize = 31;
    pub const TOUCH_REPORT: usize = 9;
}

/// Offsets inside full input and output reports
pub mod offset {
    /// Start of the common block in a USB input report
    pub const USB_PAYLOAD: usize = 1;
    /// Start of the common block in a Bluetooth input report (two prefix bytes)
    pub const BT_PAYLOAD: usize = 3;

    pub const USB_TOUCH_COUNT: usize = 33;
    pub const USB_TOUCH_REPORTS: usize = 34;
    pub const BT_TOUCH_COUNT: usize = 35;
    pub const BT_TOUCH_REPORTS: usize = 36;

    /// Start of the common block in a USB output report
    pub const USB_OUTPUT_COMMON: usize = 1;
    /// Bluetooth output: hardware control byte
    pub const BT_OUTPUT_HW_CONTROL: usize = 1;
    /// Start of the common block in a Bluetooth output report
    pub const BT_OUTPUT_COMMON: usize = 3;
}

/// Offsets inside the 32-byte input common block
pub mod common {
    pub const LEFT_X: usize = 0;
    pub const LEFT_Y: usize = 1;
    pub const RIGHT_X: usize = 2;
    pub const RIGHT_Y: usize = 3;
    pub const BUTTONS: usize = 4;
    pub const L2: usize = 7;
    pub const R2: usize = 8;
    pub const TIMESTAMP: usize = 9;
    pub const TEMPERATURE: usize = 11;
    /// Gyro pitch/yaw/roll followed by accel X/Y/Z, six little-endian i16
    pub const INERTIAL: usize = 12;
    pub const ACCEL: usize = 18;
    /// Battery level (low nibble) and cable state (bit 4)
    pub const STATUS: usize = 29;
    /// Wireless adapter: bit 2 set while no controller is paired
    pub const DONGLE_STATUS: usize = 30;
}

/// Button bit masks
pub mod button {
    /// buttons[0]
    pub const DPAD_MASK: u8 = 0x0F;
    pub const SQUARE: u8 = 1 << 4;
    pub const CROSS: u8 = 1 << 5;
    pub const CIRCLE: u8 = 1 << 6;
    pub const TRIANGLE: u8 = 1 << 7;
    /// buttons[1]
    pub const L1: u8 = 1 << 0;
    pub const R1: u8 = 1 << 1;
    pub const SHARE: u8 = 1 << 4;
    pub const OPTIONS: u8 = 1 << 5;
    pub const L3: u8 = 1 << 6;
    pub const R3: u8 = 1 << 7;
    /// buttons[2]
    pub const PS: u8 = 1 << 0;
    pub const TOUCHPAD: u8 = 1 << 1;
}

/// Status byte fields
pub mod status {
    pub const BATTERY_MASK: u8 = 0x0F;
    pub const CABLE_BIT: u8 = 1 << 4;
    pub const DONGLE_NO_CONTROLLER: u8 = 1 << 2;
}

/// Output report constants
pub mod output {
    /// Rumble, lightbar and blink fields are valid
    pub const VALID_FLAGS: u8 = 0x07;
    /// Bluetooth: enable CRC and HID output
    pub const BT_HW_CONTROL: u8 = 0xC4;
}

/// Touchpad resolution
pub const TOUCHPAD_WIDTH: u16 = 1920;
pub const TOUCHPAD_HEIGHT: u16 = 942;
/// Contact byte bit set while a finger is lifted
pub const TOUCH_POINT_INACTIVE: u8 = 0x80;

/// Common block of every input report
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct InputCommon {
    pub x: u8,
    pub y: u8,
    pub rx: u8,
    pub ry: u8,
    pub buttons: [u8; 3],
    pub z: u8,
    pub rz: u8,
    pub sensor_timestamp: U16,
    pub sensor_temperature: u8,
    pub gyro: [I16; 3],
    pub accel: [I16; 3],
    _reserved2: [u8; 5],
    pub status: [u8; 2],
    _reserved3: u8,
}

/// One finger on the touchpad
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct TouchPoint {
    pub contact: u8,
    pub x_lo: u8,
    /// Low nibble: x bits 8..12, high nibble: y bits 0..4
    pub xy_mid: u8,
    pub y_hi: u8,
}

impl TouchPoint {
    pub fn is_active(&self) -> bool {
        self.contact & TOUCH_POINT_INACTIVE == 0
    }

    pub fn x(&self) -> u16 {
        (u16::from(self.xy_mid & 0x0F) << 8) | u16::from(self.x_lo)
    }

    pub fn y(&self) -> u16 {
        (u16::from(self.y_hi) << 4) | u16::from(self.xy_mid >> 4)
    }
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct TouchReport {
    pub timestamp: u8,
    pub points: [TouchPoint; 2],
}

/// Common block of every output report
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct OutputCommon {
    pub valid_flag0: u8,
    pub valid_flag1: u8,
    _reserved: u8,
    /// Small (high frequency) motor
    pub motor_right: u8,
    /// Large (low frequency) motor
    pub motor_left: u8,
    pub lightbar_red: u8,
    pub lightbar_green: u8,
    pub lightbar_blue: u8,
    pub lightbar_blink_on: u8,
    pub lightbar_blink_off: u8,
    _reserved2: [u8; 21],
}

/// Where the pieces of a full input report live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportLayout {
    pub len: usize,
    pub payload: usize,
    pub touch_count: usize,
    pub touch_reports: usize,
    pub max_touch_reports: usize,
}

impl ReportLayout {
    pub const USB: Self = Self {
        len: size::USB_INPUT,
        payload: offset::USB_PAYLOAD,
        touch_count: offset::USB_TOUCH_COUNT,
        touch_reports: offset::USB_TOUCH_REPORTS,
        max_touch_reports: 3,
    };

    pub const BLUETOOTH: Self = Self {
        len: size::BT_INPUT,
        payload: offset::BT_PAYLOAD,
        touch_count: offset::BT_TOUCH_COUNT,
        touch_reports: offset::BT_TOUCH_REPORTS,
        max_touch_reports: 4,
    };
}
