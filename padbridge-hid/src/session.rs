//! DS4 device session
//!
//! A [`Ds4Session`] owns at most one open handle to a physical controller and
//! walks it through `Disconnected -> Connecting -> Connected`. Read errors and
//! malformed reports drop the handle; the next [`Ds4Session::update_connection`]
//! reopens it through the [`HidProvider`].

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::calibration::{self, CalibrationSet};
use crate::device_registry;
use crate::error::TransportError;
use crate::feature::{self, FirmwareInfo};
use crate::hid::{HidDevice, HidProvider};
use crate::input::{self, Ds4InputState, FrameOutcome};
use crate::output::{self, OutputState};
use crate::protocol::{common, size, status, ReportLayout};
use crate::types::{Connection, ConnectionState, DataStatus, HidDeviceInfo};

/// Unchanged output is re-sent after this long
pub const MIN_OUTPUT_INTERVAL: Duration = Duration::from_millis(300);

pub struct Ds4Session {
    info: HidDeviceInfo,
    device: Option<Box<dyn HidDevice>>,
    state: ConnectionState,
    serial: String,
    firmware: FirmwareInfo,
    calibration: Option<CalibrationSet>,
    /// Set once a fetch was tried for the currently paired controller
    calibration_tried: bool,
    /// Last accepted report, calibration applied
    report: [u8; size::BT_INPUT],
    input: Ds4InputState,
    controller_present: bool,
    output: OutputState,
    output_dirty: bool,
    last_output: Option<Instant>,
}

impl Ds4Session {
    pub fn new(info: HidDeviceInfo) -> Self {
        let serial = info.serial.clone().unwrap_or_else(|| info.path.clone());
        Self {
            info,
            device: None,
            state: ConnectionState::Disconnected,
            serial,
            firmware: FirmwareInfo::default(),
            calibration: None,
            calibration_tried: false,
            report: [0u8; size::BT_INPUT],
            input: Ds4InputState::default(),
            controller_present: true,
            output: OutputState::default(),
            output_dirty: true,
            last_output: None,
        }
    }

    pub fn info(&self) -> &HidDeviceInfo {
        &self.info
    }

    pub fn path(&self) -> &str {
        &self.info.path
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn firmware(&self) -> FirmwareInfo {
        self.firmware
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    pub fn is_bluetooth(&self) -> bool {
        self.info.transport_type.is_bluetooth()
    }

    pub fn is_wireless(&self) -> bool {
        self.info.transport_type.is_wireless()
    }

    pub fn is_dongle(&self) -> bool {
        device_registry::is_dongle(self.info.vid, self.info.pid)
    }

    pub fn has_calib_data(&self) -> bool {
        self.calibration.is_some()
    }

    /// Raw battery level from the last report (0..=11)
    pub fn battery_level(&self) -> u8 {
        self.input.battery_level
    }

    pub fn cable_state(&self) -> bool {
        self.input.cable
    }

    /// Decoded view of the last accepted report
    pub fn input(&self) -> &Ds4InputState {
        &self.input
    }

    /// Last accepted report bytes, calibration applied
    pub fn raw_report(&self) -> &[u8] {
        let len = if self.is_bluetooth() {
            size::BT_INPUT
        } else {
            size::USB_INPUT
        };
        &self.report[..len]
    }

    pub fn output(&self) -> OutputState {
        self.output
    }

    /// Open the device and prepare it for polling
    ///
    /// Calibration is fetched only when missing; a failed fetch leaves the
    /// session uncalibrated but usable.
    pub fn open(&mut self, provider: &mut dyn HidProvider) -> Result<(), TransportError> {
        self.state = ConnectionState::Connecting;
        let mut device = match provider.open(&self.info) {
            Ok(device) => device,
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                return Err(e);
            }
        };

        if !self.is_bluetooth() {
            match feature::read_serial(device.as_mut()) {
                Ok(serial) => self.serial = serial,
                Err(e) => debug!("No serial from feature report on {}: {}", self.info.path, e),
            }
        }

        if self.calibration.is_none() {
            self.calibration_tried = true;
            match calibration::fetch_calibration(device.as_mut(), self.is_bluetooth()) {
                Ok(set) => self.calibration = Some(set),
                Err(e) => warn!("Calibration unavailable for {}: {}", self.serial, e),
            }
        }

        match feature::read_firmware_info(device.as_mut()) {
            Ok(firmware) => {
                debug!(
                    "Firmware: hw_version 0x{:x}, fw_version 0x{:x}",
                    firmware.hw_version, firmware.fw_version
                );
                self.firmware = firmware;
            }
            Err(e) => warn!("Could not read firmware version of {}: {}", self.serial, e),
        }

        if let Err(e) = device.set_nonblocking(true) {
            self.state = ConnectionState::Disconnected;
            return Err(e);
        }

        self.device = Some(device);
        self.state = ConnectionState::Connected;
        self.output_dirty = true;
        if let Err(e) = self.send_output() {
            warn!("Initial output report to {} failed: {}", self.serial, e);
        }

        info!(
            "Opened DS4 {} (bluetooth={}, calibrated={}) at {}",
            self.serial,
            self.is_bluetooth(),
            self.has_calib_data(),
            self.info.path
        );
        Ok(())
    }

    /// Drop the handle; the next connection check reopens it
    pub fn close(&mut self) {
        if self.device.take().is_some() {
            debug!("Closed DS4 handle {}", self.info.path);
        }
        self.state = ConnectionState::Disconnected;
        self.last_output = None;
    }

    /// Per-tick connection check: reopen if needed, then read one frame
    pub fn update_connection(&mut self, provider: &mut dyn HidProvider) -> Connection {
        if self.device.is_none() {
            if let Err(e) = self.open(provider) {
                debug!("Reopen of {} failed: {}", self.info.path, e);
                return Connection::Disconnected;
            }
        }

        let status = self.read_frame();
        if status == DataStatus::ReadError {
            self.close();
            return Connection::Disconnected;
        }

        // The adapter stays open without a paired controller
        if !self.controller_present {
            return Connection::Disconnected;
        }

        if status == DataStatus::NewData {
            Connection::Connected
        } else {
            Connection::NoData
        }
    }

    /// Read and validate one frame, updating the stable report buffer
    pub fn read_frame(&mut self) -> DataStatus {
        let bluetooth = self.is_bluetooth();
        let Some(device) = self.device.as_mut() else {
            return DataStatus::ReadError;
        };

        let mut buf = [0u8; size::BT_INPUT];
        let want = if bluetooth {
            size::BT_INPUT
        } else {
            size::USB_INPUT
        };
        let len = match device.read(&mut buf[..want]) {
            Ok(0) => return DataStatus::NoNewData,
            Ok(len) => len,
            Err(e) => {
                debug!("Read from {} failed: {}", self.info.path, e);
                return DataStatus::ReadError;
            }
        };
        let frame = &mut buf[..len];

        let layout = match input::classify_frame(frame, bluetooth) {
            FrameOutcome::Report(layout) => layout,
            FrameOutcome::NeedsFullReports => {
                if let Err(e) = feature::request_full_reports(device.as_mut()) {
                    warn!("Full report request to {} failed: {}", self.info.path, e);
                }
                return DataStatus::NoNewData;
            }
            FrameOutcome::Dropped { reported, computed } => {
                debug!(
                    "Data packet CRC check failed, ignoring: received 0x{:08X}, expected 0x{:08X}",
                    reported, computed
                );
                return DataStatus::NoNewData;
            }
            FrameOutcome::Malformed { id, len } => {
                warn!(
                    "Unexpected report from {}: id 0x{:02X}, {} bytes",
                    self.info.path, id, len
                );
                return DataStatus::ReadError;
            }
        };

        if !bluetooth {
            self.check_controller_present(frame, layout);
        }

        if let Some(set) = &self.calibration {
            calibration::apply_calibration_in_place(frame, layout.payload + common::INERTIAL, set);
        }

        self.report[..len].copy_from_slice(frame);
        self.input = input::decode_report(&self.report[..len], layout);
        DataStatus::NewData
    }

    fn check_controller_present(&mut self, frame: &[u8], layout: ReportLayout) {
        let present = !self.is_dongle()
            || frame[layout.payload + common::DONGLE_STATUS] & status::DONGLE_NO_CONTROLLER == 0;

        if present != self.controller_present {
            info!(
                "Controller {} on adapter {}",
                if present { "paired" } else { "gone" },
                self.info.path
            );
            self.controller_present = present;
            self.calibration_tried = false;
        }

        if present && self.calibration.is_none() && !self.calibration_tried {
            self.calibration_tried = true;
            if let Some(device) = self.device.as_mut() {
                match calibration::fetch_calibration(device.as_mut(), false) {
                    Ok(set) => self.calibration = Some(set),
                    Err(e) => warn!("Calibration unavailable for {}: {}", self.serial, e),
                }
            }
        }
    }

    /// Stage new output; it is sent by the next [`Ds4Session::flush_output`]
    pub fn set_output(&mut self, state: OutputState) {
        if state != self.output {
            self.output = state;
            self.output_dirty = true;
        }
    }

    /// Send staged output if it changed or the refresh interval elapsed
    ///
    /// Returns whether a report was written. A failed write recycles the
    /// handle.
    pub fn flush_output(&mut self, now: Instant) -> bool {
        if self.device.is_none() {
            return false;
        }
        let due = self.output_dirty
            || self
                .last_output
                .map_or(true, |last| now.saturating_duration_since(last) >= MIN_OUTPUT_INTERVAL);
        if !due {
            return false;
        }
        match self.send_output() {
            Ok(()) => {
                self.last_output = Some(now);
                true
            }
            Err(e) => {
                warn!("Output report to {} failed: {}", self.serial, e);
                self.close();
                false
            }
        }
    }

    /// Write the current output state
    pub fn send_output(&mut self) -> Result<(), TransportError> {
        let bluetooth = self.is_bluetooth();
        let device = self.device.as_mut().ok_or(TransportError::Disconnected)?;
        let report = output::encode_output_report(&self.output, bluetooth);
        let written = device.write(&report)?;
        if written != report.len() {
            return Err(TransportError::ShortWrite {
                written,
                expected: report.len(),
            });
        }
        self.output_dirty = false;
        Ok(())
    }

    /// Stop rumble and blinking, then close
    pub fn shutdown(&mut self) {
        self.output.small_motor = 0;
        self.output.large_motor = 0;
        self.output.blink_on = 0;
        self.output.blink_off = 0;
        if self.device.is_some() {
            if let Err(e) = self.send_output() {
                debug!("Final output report to {} failed: {}", self.serial, e);
            }
        }
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::tests::usb_calibration_report;
    use crate::crc;
    use crate::input::tests::{bt_report, usb_report};
    use crate::protocol::{button, offset, report_id};
    use crate::types::TransportType;
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};
    use std::rc::Rc;

    #[derive(Default)]
    struct MockState {
        reads: VecDeque<Option<Vec<u8>>>,
        features: HashMap<u8, Vec<u8>>,
        feature_requests: Vec<u8>,
        writes: Vec<Vec<u8>>,
        opens: usize,
        fail_open: bool,
    }

    impl MockState {
        fn requests_for(&self, id: u8) -> usize {
            self.feature_requests.iter().filter(|&&r| r == id).count()
        }
    }

    struct MockDevice(Rc<RefCell<MockState>>);

    impl HidDevice for MockDevice {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
            match self.0.borrow_mut().reads.pop_front() {
                None => Ok(0),
                Some(None) => Err(TransportError::HidError("read failed".into())),
                Some(Some(data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                }
            }
        }

        fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
            self.0.borrow_mut().writes.push(data.to_vec());
            Ok(data.len())
        }

        fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
            let mut state = self.0.borrow_mut();
            state.feature_requests.push(buf[0]);
            let reply = state
                .features
                .get(&buf[0])
                .cloned()
                .ok_or_else(|| TransportError::HidError("no such report".into()))?;
            let n = reply.len().min(buf.len());
            buf[..n].copy_from_slice(&reply[..n]);
            Ok(n)
        }

        fn set_nonblocking(&mut self, _nonblocking: bool) -> Result<(), TransportError> {
            Ok(())
        }
    }

    struct MockProvider(Rc<RefCell<MockState>>);

    impl HidProvider for MockProvider {
        fn enumerate(&mut self, _ids: &[(u16, u16)]) -> Result<Vec<HidDeviceInfo>, TransportError> {
            Ok(Vec::new())
        }

        fn open(&mut self, _info: &HidDeviceInfo) -> Result<Box<dyn HidDevice>, TransportError> {
            let mut state = self.0.borrow_mut();
            if state.fail_open {
                return Err(TransportError::DeviceNotFound("gone".into()));
            }
            state.opens += 1;
            Ok(Box::new(MockDevice(self.0.clone())))
        }
    }

    fn info(transport_type: TransportType, pid: u16) -> HidDeviceInfo {
        HidDeviceInfo {
            vid: device_registry::SONY_VID,
            pid,
            transport_type,
            path: "/dev/hidraw9".into(),
            serial: None,
            product_name: Some("Wireless Controller".into()),
        }
    }

    fn setup(transport_type: TransportType, pid: u16) -> (Ds4Session, MockProvider, Rc<RefCell<MockState>>) {
        let state = Rc::new(RefCell::new(MockState::default()));
        let mut firmware = vec![0u8; size::FIRMWARE_INFO];
        firmware[0] = report_id::FIRMWARE_INFO;
        state.borrow_mut().features.insert(report_id::FIRMWARE_INFO, firmware);
        (
            Ds4Session::new(info(transport_type, pid)),
            MockProvider(state.clone()),
            state,
        )
    }

    fn bt_calibration_report(valid_crc: bool) -> Vec<u8> {
        let mut buf = vec![0u8; size::BT_CALIBRATION];
        buf[..size::USB_CALIBRATION].copy_from_slice(&usb_calibration_report());
        buf[0] = report_id::BT_CALIBRATION;
        crc::write_bt_crc(crc::SEED_FEATURE, &mut buf);
        if !valid_crc {
            buf[size::BT_CALIBRATION - 1] ^= 0xFF;
        }
        buf
    }

    #[test]
    fn test_bluetooth_calibration_crc_exhausted() {
        let (mut session, mut provider, state) = setup(TransportType::Bluetooth, device_registry::PID_ZCT2);
        state
            .borrow_mut()
            .features
            .insert(report_id::BT_CALIBRATION, bt_calibration_report(false));

        session.open(&mut provider).unwrap();
        assert!(!session.has_calib_data());
        assert_eq!(state.borrow().requests_for(report_id::BT_CALIBRATION), 3);

        let frame = bt_report(|buf| {
            buf[offset::BT_PAYLOAD + common::BUTTONS] = 0x08 | button::CROSS;
            buf[offset::BT_PAYLOAD + common::INERTIAL..offset::BT_PAYLOAD + common::INERTIAL + 2]
                .copy_from_slice(&1000i16.to_le_bytes());
        });
        state.borrow_mut().reads.push_back(Some(frame));

        assert_eq!(session.update_connection(&mut provider), Connection::Connected);
        assert!(session.input().cross);
        assert_eq!(session.input().gyro[0], 1000);
    }

    #[test]
    fn test_bluetooth_calibration_ok() {
        let (mut session, mut provider, state) = setup(TransportType::Bluetooth, device_registry::PID_ZCT2);
        state
            .borrow_mut()
            .features
            .insert(report_id::BT_CALIBRATION, bt_calibration_report(true));
        session.open(&mut provider).unwrap();
        assert!(session.has_calib_data());
        assert_eq!(state.borrow().requests_for(report_id::BT_CALIBRATION), 1);
    }

    #[test]
    fn test_corrupt_live_packet_dropped() {
        let (mut session, mut provider, state) = setup(TransportType::Bluetooth, device_registry::PID_ZCT2);
        session.open(&mut provider).unwrap();

        let mut frame = bt_report(|buf| buf[offset::BT_PAYLOAD + common::LEFT_X] = 0x10);
        frame[20] ^= 0x01;
        state.borrow_mut().reads.push_back(Some(frame));

        assert_eq!(session.update_connection(&mut provider), Connection::NoData);
        assert_eq!(session.state(), ConnectionState::Connected);
        assert!(session.is_open());
        assert_eq!(session.input(), &Ds4InputState::default());
    }

    #[test]
    fn test_reduced_report_requests_full_mode() {
        let (mut session, mut provider, state) = setup(TransportType::Bluetooth, device_registry::PID_ZCT1);
        session.open(&mut provider).unwrap();
        state.borrow_mut().reads.push_back(Some(vec![0x01, 0x80, 0x80, 0x80, 0x80, 0x08, 0, 0, 0, 0]));

        assert_eq!(session.read_frame(), DataStatus::NoNewData);
        assert_eq!(
            state.borrow().requests_for(report_id::BT_ENABLE_FULL_REPORTS),
            1
        );
    }

    #[test]
    fn test_usb_gyro_calibrated() {
        let (mut session, mut provider, state) = setup(TransportType::Usb, device_registry::PID_ZCT1);
        state
            .borrow_mut()
            .features
            .insert(report_id::USB_CALIBRATION, usb_calibration_report().to_vec());
        session.open(&mut provider).unwrap();
        assert!(session.has_calib_data());

        let mut frame = usb_report();
        let at = offset::USB_PAYLOAD + common::INERTIAL;
        frame[at..at + 2].copy_from_slice(&1762i16.to_le_bytes());
        state.borrow_mut().reads.push_back(Some(frame));

        assert_eq!(session.read_frame(), DataStatus::NewData);
        // (1762 - 2) * 1080 * 86 / 17600
        assert_eq!(session.input().gyro[0], 9288);
    }

    #[test]
    fn test_read_error_recycles_handle() {
        let (mut session, mut provider, state) = setup(TransportType::Usb, device_registry::PID_ZCT1);
        state
            .borrow_mut()
            .features
            .insert(report_id::USB_CALIBRATION, usb_calibration_report().to_vec());
        session.open(&mut provider).unwrap();
        state.borrow_mut().reads.push_back(None);

        assert_eq!(session.update_connection(&mut provider), Connection::Disconnected);
        assert!(!session.is_open());
        assert_eq!(session.state(), ConnectionState::Disconnected);

        // reopened next tick without refetching calibration
        state.borrow_mut().reads.push_back(Some(usb_report()));
        assert_eq!(session.update_connection(&mut provider), Connection::Connected);
        assert_eq!(state.borrow().opens, 2);
        assert_eq!(state.borrow().requests_for(report_id::USB_CALIBRATION), 1);
    }

    #[test]
    fn test_malformed_report_recycles_handle() {
        let (mut session, mut provider, state) = setup(TransportType::Usb, device_registry::PID_ZCT1);
        session.open(&mut provider).unwrap();
        state.borrow_mut().reads.push_back(Some(vec![0x07; 20]));

        assert_eq!(session.update_connection(&mut provider), Connection::Disconnected);
        assert!(!session.is_open());
    }

    #[test]
    fn test_reopen_failure_stays_disconnected() {
        let (mut session, mut provider, state) = setup(TransportType::Usb, device_registry::PID_ZCT1);
        state.borrow_mut().fail_open = true;
        assert_eq!(session.update_connection(&mut provider), Connection::Disconnected);
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_dongle_without_controller() {
        let (mut session, mut provider, state) = setup(TransportType::Dongle, device_registry::PID_DONGLE);
        session.open(&mut provider).unwrap();
        assert!(!session.has_calib_data());

        let mut absent = usb_report();
        absent[offset::USB_PAYLOAD + common::DONGLE_STATUS] = status::DONGLE_NO_CONTROLLER;
        state.borrow_mut().reads.push_back(Some(absent));
        assert_eq!(session.update_connection(&mut provider), Connection::Disconnected);
        assert!(session.is_open());

        // controller pairs, calibration becomes available
        state
            .borrow_mut()
            .features
            .insert(report_id::USB_CALIBRATION, usb_calibration_report().to_vec());
        state.borrow_mut().reads.push_back(Some(usb_report()));
        assert_eq!(session.update_connection(&mut provider), Connection::Connected);
        assert!(session.has_calib_data());
    }

    #[test]
    fn test_output_refresh_interval() {
        let (mut session, mut provider, state) = setup(TransportType::Usb, device_registry::PID_ZCT1);
        session.open(&mut provider).unwrap();
        let initial_writes = state.borrow().writes.len();
        assert_eq!(initial_writes, 1);

        let start = Instant::now();
        session.set_output(OutputState {
            large_motor: 200,
            small_motor: 255,
            ..OutputState::default()
        });
        assert!(session.flush_output(start));
        assert!(!session.flush_output(start + Duration::from_millis(100)));
        assert!(session.flush_output(start + Duration::from_millis(301)));

        let state = state.borrow();
        let writes = &state.writes;
        assert_eq!(writes.len(), 3);
        assert_eq!(writes[1][4], 255);
        assert_eq!(writes[1][5], 200);
    }

    #[test]
    fn test_shutdown_stops_rumble() {
        let (mut session, mut provider, state) = setup(TransportType::Usb, device_registry::PID_ZCT1);
        session.open(&mut provider).unwrap();
        session.set_output(OutputState {
            large_motor: 80,
            small_motor: 255,
            blink_on: 100,
            blink_off: 100,
            blue: 20,
            ..OutputState::default()
        });
        session.shutdown();

        assert!(!session.is_open());
        let last = state.borrow().writes.last().cloned().unwrap();
        assert_eq!(&last[4..6], &[0, 0]);
        assert_eq!(&last[9..11], &[0, 0]);
        assert_eq!(last[8], 20);
    }
}
