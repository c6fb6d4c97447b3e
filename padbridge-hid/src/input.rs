//! Input report classification and decoding

use zerocopy::FromBytes;

use crate::crc;
use crate::protocol::{button, report_id, size, status, InputCommon, ReportLayout, TouchReport};

/// D-pad directions decoded from the hat nibble
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DpadState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl DpadState {
    pub const fn new(up: bool, down: bool, left: bool, right: bool) -> Self {
        Self {
            up,
            down,
            left,
            right,
        }
    }
}

/// Decode the hat switch in the low nibble of `buttons[0]`
///
/// Values 0..=7 run clockwise from up, 8 is neutral.
///
/// # Panics
///
/// Any other value means the report is not a DS4 input report and the
/// decoder state is unusable; this is treated as a programming error.
pub fn decode_dpad(hat: u8) -> DpadState {
    match hat {
        0x00 => DpadState::new(true, false, false, false),
        0x01 => DpadState::new(true, false, false, true),
        0x02 => DpadState::new(false, false, false, true),
        0x03 => DpadState::new(false, true, false, true),
        0x04 => DpadState::new(false, true, false, false),
        0x05 => DpadState::new(false, true, true, false),
        0x06 => DpadState::new(false, false, true, false),
        0x07 => DpadState::new(true, false, true, false),
        0x08 => DpadState::default(),
        other => panic!("ds4 dpad state encountered unexpected input: 0x{other:02X}"),
    }
}

/// What to do with one raw frame read from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A full input report laid out as described
    Report(ReportLayout),
    /// A Bluetooth controller still sends reduced reports and has to be asked
    /// for full ones
    NeedsFullReports,
    /// Bluetooth report with a bad CRC; skip it
    Dropped { reported: u32, computed: u32 },
    /// Unknown report id or size
    Malformed { id: u8, len: usize },
}

/// Classify a raw frame (`buf` holds exactly the bytes read)
pub fn classify_frame(buf: &[u8], bluetooth: bool) -> FrameOutcome {
    let id = buf.first().copied().unwrap_or(0);
    let len = buf.len();

    if bluetooth {
        if id == report_id::USB_INPUT {
            return FrameOutcome::NeedsFullReports;
        }
        if id != report_id::BT_INPUT || len != size::BT_INPUT {
            return FrameOutcome::Malformed { id, len };
        }
        return match crc::verify_bt_crc(crc::SEED_INPUT, buf) {
            Ok(()) => FrameOutcome::Report(ReportLayout::BLUETOOTH),
            Err((reported, computed)) => FrameOutcome::Dropped { reported, computed },
        };
    }

    if id != report_id::USB_INPUT || len != size::USB_INPUT {
        return FrameOutcome::Malformed { id, len };
    }
    FrameOutcome::Report(ReportLayout::USB)
}

/// An active touchpad contact in pad coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchContact {
    pub x: u16,
    pub y: u16,
}

/// Decoded full input report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ds4InputState {
    pub left_x: u8,
    pub left_y: u8,
    pub right_x: u8,
    pub right_y: u8,
    pub l2: u8,
    pub r2: u8,
    pub dpad: DpadState,
    pub square: bool,
    pub cross: bool,
    pub circle: bool,
    pub triangle: bool,
    pub l1: bool,
    pub r1: bool,
    pub share: bool,
    pub options: bool,
    pub l3: bool,
    pub r3: bool,
    pub ps: bool,
    pub touchpad: bool,
    pub timestamp: u16,
    pub temperature: u8,
    /// Pitch, yaw, roll
    pub gyro: [i16; 3],
    /// X, Y, Z
    pub accel: [i16; 3],
    /// Raw battery level, 0..=10 (11 while charging full)
    pub battery_level: u8,
    pub cable: bool,
    /// Wireless adapter reports no paired controller
    pub dongle_no_controller: bool,
    /// Active contacts, oldest touch report first
    pub touches: Vec<TouchContact>,
}

/// Decode a full input report classified with `layout`
///
/// `report` must be at least `layout.len` bytes; shorter input decodes to
/// the default state.
pub fn decode_report(report: &[u8], layout: ReportLayout) -> Ds4InputState {
    let Some(block) = report.get(layout.payload..layout.payload + size::INPUT_COMMON) else {
        return Ds4InputState::default();
    };
    let Ok(common) = InputCommon::read_from_bytes(block) else {
        return Ds4InputState::default();
    };

    let b0 = common.buttons[0];
    let b1 = common.buttons[1];
    let b2 = common.buttons[2];

    let mut touches = Vec::new();
    let count = usize::from(report.get(layout.touch_count).copied().unwrap_or(0))
        .min(layout.max_touch_reports);
    for i in 0..count {
        let at = layout.touch_reports + i * size::TOUCH_REPORT;
        let Some(bytes) = report.get(at..at + size::TOUCH_REPORT) else {
            break;
        };
        let Ok(touch) = TouchReport::read_from_bytes(bytes) else {
            break;
        };
        touches.extend(
            touch
                .points
                .iter()
                .filter(|p| p.is_active())
                .map(|p| TouchContact { x: p.x(), y: p.y() }),
        );
    }

    Ds4InputState {
        left_x: common.x,
        left_y: common.y,
        right_x: common.rx,
        right_y: common.ry,
        l2: common.z,
        r2: common.rz,
        dpad: decode_dpad(b0 & button::DPAD_MASK),
        square: b0 & button::SQUARE != 0,
        cross: b0 & button::CROSS != 0,
        circle: b0 & button::CIRCLE != 0,
        triangle: b0 & button::TRIANGLE != 0,
        l1: b1 & button::L1 != 0,
        r1: b1 & button::R1 != 0,
        share: b1 & button::SHARE != 0,
        options: b1 & button::OPTIONS != 0,
        l3: b1 & button::L3 != 0,
        r3: b1 & button::R3 != 0,
        ps: b2 & button::PS != 0,
        touchpad: b2 & button::TOUCHPAD != 0,
        timestamp: common.sensor_timestamp.get(),
        temperature: common.sensor_temperature,
        gyro: common.gyro.map(|v| v.get()),
        accel: common.accel.map(|v| v.get()),
        battery_level: common.status[0] & status::BATTERY_MASK,
        cable: common.status[0] & status::CABLE_BIT != 0,
        dongle_no_controller: common.status[1] & status::DONGLE_NO_CONTROLLER != 0,
        touches,
    }
}
