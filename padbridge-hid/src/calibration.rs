//! Inertial sensor calibration
//!
//! The controller reports per-axis bias and plus/minus reference points in a
//! feature report. They are turned into fixed-point scale factors that map raw
//! gyro counts to [`GYRO_RES_PER_DEG_S`] per degree/s and raw accel counts to
//! [`ACC_RES_PER_G`] per g.

use tracing::{debug, warn};

use crate::crc;
use crate::error::CalibrationError;
use crate::hid::HidDevice;
use crate::protocol::{report_id, size};

/// Accelerometer counts per g after calibration
pub const ACC_RES_PER_G: i32 = 8192;

/// Gyro counts per degree/s after calibration
///
/// The sensor could resolve more, 86 keeps values inside 16 bits.
pub const GYRO_RES_PER_DEG_S: i32 = 86;

/// Bluetooth calibration fetch attempts before giving up
pub const CALIBRATION_ATTEMPTS: u32 = 3;

/// Fixed-point calibration of one inertial axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationData {
    pub bias: i16,
    pub sens_numer: i32,
    pub sens_denom: i32,
}

impl Default for CalibrationData {
    fn default() -> Self {
        Self {
            bias: 0,
            sens_numer: 1,
            sens_denom: 1,
        }
    }
}

/// Inertial axes, in report order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibAxis {
    Pitch,
    Yaw,
    Roll,
    X,
    Y,
    Z,
}

impl CalibAxis {
    pub const ALL: [CalibAxis; 6] = [
        CalibAxis::Pitch,
        CalibAxis::Yaw,
        CalibAxis::Roll,
        CalibAxis::X,
        CalibAxis::Y,
        CalibAxis::Z,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CalibAxis::Pitch => "pitch",
            CalibAxis::Yaw => "yaw",
            CalibAxis::Roll => "roll",
            CalibAxis::X => "accel x",
            CalibAxis::Y => "accel y",
            CalibAxis::Z => "accel z",
        }
    }
}

/// Calibration for all six axes, indexed like [`CalibAxis::ALL`]
pub type CalibrationSet = [CalibrationData; 6];

/// Scale a raw sample: `quot * biased + (rem * biased) / denom`
///
/// Splitting the ratio keeps the intermediate product small; the result
/// saturates to the i16 range.
pub fn apply_calibration(raw: i16, calib: &CalibrationData) -> i16 {
    if calib.sens_denom == 0 {
        return raw;
    }
    let biased = i64::from(raw) - i64::from(calib.bias);
    let numer = i64::from(calib.sens_numer);
    let denom = i64::from(calib.sens_denom);
    let quot = numer / denom;
    let rem = numer % denom;
    let output = quot * biased + (rem * biased) / denom;
    output.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16
}

/// Calibrate the six little-endian inertial samples starting at `start`
pub fn apply_calibration_in_place(buf: &mut [u8], start: usize, calib: &CalibrationSet) {
    for (i, data) in calib.iter().enumerate() {
        let at = start + i * 2;
        let Some(bytes) = buf.get_mut(at..at + 2) else {
            return;
        };
        let raw = i16::from_le_bytes([bytes[0], bytes[1]]);
        bytes.copy_from_slice(&apply_calibration(raw, data).to_le_bytes());
    }
}

fn read_s16(buf: &[u8], at: usize) -> i16 {
    i16::from_le_bytes([buf[at], buf[at + 1]])
}

fn saturate_i16(value: i32) -> i16 {
    value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

/// Parse a calibration feature report (report id at byte 0)
///
/// The gyro reference points come in two layouts: alternating plus/minus per
/// axis (wired first-party controllers) or all plus values followed by all
/// minus values (Bluetooth, some clones).
pub fn parse_calibration(buf: &[u8]) -> Result<CalibrationSet, CalibrationError> {
    if buf.len() < size::USB_CALIBRATION {
        return Err(CalibrationError::ShortReport {
            len: buf.len(),
            expected: size::USB_CALIBRATION,
        });
    }

    let pitch_bias = read_s16(buf, 1);
    let yaw_bias = read_s16(buf, 3);
    let roll_bias = read_s16(buf, 5);

    let (pitch_plus, pitch_neg, yaw_plus, yaw_neg, roll_plus, roll_neg) =
        if read_s16(buf, 9) < 0 && read_s16(buf, 7) > 0 {
            (
                read_s16(buf, 7),
                read_s16(buf, 9),
                read_s16(buf, 11),
                read_s16(buf, 13),
                read_s16(buf, 15),
                read_s16(buf, 17),
            )
        } else {
            (
                read_s16(buf, 7),
                read_s16(buf, 13),
                read_s16(buf, 9),
                read_s16(buf, 15),
                read_s16(buf, 11),
                read_s16(buf, 17),
            )
        };

    if pitch_plus <= 0 || yaw_plus <= 0 || roll_plus <= 0 || pitch_neg >= 0 || yaw_neg >= 0 || roll_neg >= 0
    {
        warn!(
            "Calibration reference points look wrong: pitch {}/{}, yaw {}/{}, roll {}/{}",
            pitch_plus, pitch_neg, yaw_plus, yaw_neg, roll_plus, roll_neg
        );
    }

    let gyro_speed_scale = i32::from(read_s16(buf, 19)) + i32::from(read_s16(buf, 21));
    let gyro_numer = gyro_speed_scale * GYRO_RES_PER_DEG_S;

    let gyro = |bias: i16, plus: i16, neg: i16| CalibrationData {
        bias,
        sens_numer: gyro_numer,
        sens_denom: i32::from(plus) - i32::from(neg),
    };

    let accel = |plus_at: usize| {
        let plus = i32::from(read_s16(buf, plus_at));
        let neg = i32::from(read_s16(buf, plus_at + 2));
        let range = plus - neg;
        CalibrationData {
            bias: saturate_i16(plus - range / 2),
            sens_numer: 2 * ACC_RES_PER_G,
            sens_denom: range,
        }
    };

    let set = [
        gyro(pitch_bias, pitch_plus, pitch_neg),
        gyro(yaw_bias, yaw_plus, yaw_neg),
        gyro(roll_bias, roll_plus, roll_neg),
        accel(23),
        accel(27),
        accel(31),
    ];

    // A wireless adapter with no controller paired reports all zeros
    for (axis, data) in CalibAxis::ALL.iter().zip(set.iter()) {
        if data.sens_denom == 0 {
            return Err(CalibrationError::ZeroDenominator { axis: axis.name() });
        }
    }

    Ok(set)
}

fn get_feature(
    device: &mut dyn HidDevice,
    id: u8,
    buf: &mut [u8],
) -> Result<(), CalibrationError> {
    buf.fill(0);
    buf[0] = id;
    let len = device
        .get_feature_report(buf)
        .map_err(|source| CalibrationError::Transport {
            report_id: id,
            source,
        })?;
    if len != buf.len() {
        return Err(CalibrationError::ShortReport {
            len,
            expected: buf.len(),
        });
    }
    if buf[0] != id {
        return Err(CalibrationError::WrongReportId {
            expected: id,
            actual: buf[0],
        });
    }
    Ok(())
}

/// Request and parse the calibration feature report
///
/// Bluetooth reports carry a CRC; a mismatch is retried up to
/// [`CALIBRATION_ATTEMPTS`] times.
pub fn fetch_calibration(
    device: &mut dyn HidDevice,
    bluetooth: bool,
) -> Result<CalibrationSet, CalibrationError> {
    if !bluetooth {
        let mut buf = [0u8; size::USB_CALIBRATION];
        get_feature(device, report_id::USB_CALIBRATION, &mut buf)?;
        return parse_calibration(&buf);
    }

    let mut buf = [0u8; size::BT_CALIBRATION];
    for attempt in 1..=CALIBRATION_ATTEMPTS {
        get_feature(device, report_id::BT_CALIBRATION, &mut buf)?;
        match crc::verify_bt_crc(crc::SEED_FEATURE, &buf) {
            Ok(()) => {
                debug!("Calibration report CRC ok after {} attempt(s)", attempt);
                return parse_calibration(&buf);
            }
            Err((reported, computed)) => {
                warn!(
                    "Calibration CRC check failed (attempt {}/{}): received 0x{:08X}, expected 0x{:08X}",
                    attempt, CALIBRATION_ATTEMPTS, reported, computed
                );
            }
        }
    }

    Err(CalibrationError::ChecksumExhausted {
        attempts: CALIBRATION_ATTEMPTS,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Calibration report as sent by a wired first-party controller
    pub(crate) fn usb_calibration_report() -> [u8; size::USB_CALIBRATION] {
        let mut buf = [0u8; size::USB_CALIBRATION];
        buf[0] = report_id::USB_CALIBRATION;
        let put = |buf: &mut [u8], at: usize, v: i16| {
            buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
        };
        put(&mut buf, 1, 2); // pitch bias
        put(&mut buf, 3, -3); // yaw bias
        put(&mut buf, 5, 1); // roll bias
        // alternating layout
        put(&mut buf, 7, 8800);
        put(&mut buf, 9, -8800);
        put(&mut buf, 11, 8900);
        put(&mut buf, 13, -8700);
        put(&mut buf, 15, 8850);
        put(&mut buf, 17, -8850);
        put(&mut buf, 19, 540);
        put(&mut buf, 21, 540);
        put(&mut buf, 23, 8200);
        put(&mut buf, 25, -8100);
        put(&mut buf, 27, 8300);
        put(&mut buf, 29, -8000);
        put(&mut buf, 31, 8192);
        put(&mut buf, 33, -8192);
        buf
    }

    #[test]
    fn test_identity_calibration() {
        let calib = CalibrationData::default();
        assert_eq!(apply_calibration(1234, &calib), 1234);
        assert_eq!(apply_calibration(-32768, &calib), -32768);
    }

    #[test]
    fn test_bias_and_scale() {
        let calib = CalibrationData {
            bias: 10,
            sens_numer: 3,
            sens_denom: 2,
        };
        // (110 - 10) * 3 / 2
        assert_eq!(apply_calibration(110, &calib), 150);
        assert_eq!(apply_calibration(-90, &calib), -150);
    }

    #[test]
    fn test_saturates_instead_of_wrapping() {
        let calib = CalibrationData {
            bias: 0,
            sens_numer: 1000,
            sens_denom: 1,
        };
        assert_eq!(apply_calibration(i16::MAX, &calib), i16::MAX);
        assert_eq!(apply_calibration(i16::MIN, &calib), i16::MIN);

        let inverted = CalibrationData {
            bias: 0,
            sens_numer: -2,
            sens_denom: 1,
        };
        assert_eq!(apply_calibration(i16::MIN, &inverted), i16::MAX);
    }

    #[test]
    fn test_large_numerator_does_not_overflow() {
        // numer * raw would overflow i32, the split form must not
        let calib = CalibrationData {
            bias: 0,
            sens_numer: 1080 * GYRO_RES_PER_DEG_S * 1000,
            sens_denom: 17600 * 1000,
        };
        let out = apply_calibration(3000, &calib);
        assert!((out as i32 - 3000 * 1080 * 86 / 17600).abs() <= 1);
    }

    #[test]
    fn test_parse_alternating_layout() {
        let set = parse_calibration(&usb_calibration_report()).unwrap();
        let pitch = set[0];
        assert_eq!(pitch.bias, 2);
        assert_eq!(pitch.sens_numer, 1080 * GYRO_RES_PER_DEG_S);
        assert_eq!(pitch.sens_denom, 17600);
        assert_eq!(set[1].sens_denom, 8900 + 8700);
        assert_eq!(set[2].sens_denom, 17700);

        let accel_x = set[3];
        assert_eq!(accel_x.sens_denom, 16300);
        assert_eq!(accel_x.bias, (8200 - 16300 / 2) as i16);
        assert_eq!(accel_x.sens_numer, 2 * ACC_RES_PER_G);
        assert_eq!(set[5].bias, 0);
    }

    #[test]
    fn test_parse_grouped_layout() {
        let mut buf = [0u8; size::USB_CALIBRATION];
        buf[0] = report_id::USB_CALIBRATION;
        let values: [(usize, i16); 14] = [
            (7, 9000),   // pitch+
            (9, 9100),   // yaw+
            (11, 9200),  // roll+
            (13, -9000), // pitch-
            (15, -9100), // yaw-
            (17, -9200), // roll-
            (19, 500),
            (21, 500),
            (23, 100),
            (25, -100),
            (27, 100),
            (29, -100),
            (31, 100),
            (33, -100),
        ];
        for (at, v) in values {
            buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
        }
        let set = parse_calibration(&buf).unwrap();
        assert_eq!(set[0].sens_denom, 18000);
        assert_eq!(set[1].sens_denom, 18200);
        assert_eq!(set[2].sens_denom, 18400);
    }

    #[test]
    fn test_zero_denominator_rejects_whole_set() {
        let mut buf = usb_calibration_report();
        // accel Z plus == minus
        buf[31..33].copy_from_slice(&100i16.to_le_bytes());
        buf[33..35].copy_from_slice(&100i16.to_le_bytes());
        let err = parse_calibration(&buf).unwrap_err();
        assert!(matches!(err, CalibrationError::ZeroDenominator { axis: "accel z" }));
    }

    #[test]
    fn test_all_zero_report_rejected() {
        let mut buf = [0u8; size::USB_CALIBRATION];
        buf[0] = report_id::USB_CALIBRATION;
        assert!(parse_calibration(&buf).is_err());
    }

    #[test]
    fn test_short_report_rejected() {
        assert!(matches!(
            parse_calibration(&[0x02, 0x00, 0x00]),
            Err(CalibrationError::ShortReport { len: 3, .. })
        ));
    }

    #[test]
    fn test_apply_in_place() {
        let mut buf = [0u8; 16];
        buf[2..4].copy_from_slice(&100i16.to_le_bytes());
        buf[12..14].copy_from_slice(&(-50i16).to_le_bytes());
        let mut set = [CalibrationData::default(); 6];
        set[0] = CalibrationData {
            bias: 0,
            sens_numer: 2,
            sens_denom: 1,
        };
        set[5].bias = 10;
        apply_calibration_in_place(&mut buf, 2, &set);
        assert_eq!(i16::from_le_bytes([buf[2], buf[3]]), 200);
        assert_eq!(i16::from_le_bytes([buf[12], buf[13]]), -60);
    }
}
