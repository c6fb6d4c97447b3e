//! Dispatch integration tests against an in-memory DS4

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use padbridge::{HandlerKind, KeyboardState, PadDispatch, PadbridgeConfig, PlayerConfig, Providers};
use padbridge_hid::protocol::{common, offset as report_offset, report_id, size};
use padbridge_hid::{HidDevice, HidDeviceInfo, HidProvider, TransportError, TransportType};
use padbridge_pad::pad::{digital2, offset, port_status};
use parking_lot::Mutex;

#[derive(Default)]
struct MockState {
    reads: VecDeque<Vec<u8>>,
    writes: Vec<Vec<u8>>,
    fail_read: bool,
}

type Shared = Arc<Mutex<MockState>>;

struct MockDevice(Shared);

impl HidDevice for MockDevice {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut state = self.0.lock();
        if state.fail_read {
            return Err(TransportError::Disconnected);
        }
        match state.reads.pop_front() {
            Some(report) => {
                let len = report.len().min(buf.len());
                buf[..len].copy_from_slice(&report[..len]);
                Ok(len)
            }
            None => Ok(0),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        self.0.lock().writes.push(data.to_vec());
        Ok(data.len())
    }

    fn get_feature_report(&mut self, _buf: &mut [u8]) -> Result<usize, TransportError> {
        Err(TransportError::HidError("unsupported".into()))
    }

    fn set_nonblocking(&mut self, _nonblocking: bool) -> Result<(), TransportError> {
        Ok(())
    }
}

struct MockProvider(Shared);

impl HidProvider for MockProvider {
    fn enumerate(&mut self, _ids: &[(u16, u16)]) -> Result<Vec<HidDeviceInfo>, TransportError> {
        Ok(vec![HidDeviceInfo {
            vid: 0x054C,
            pid: 0x05C4,
            transport_type: TransportType::Usb,
            path: "mock-ds4".into(),
            serial: None,
            product_name: Some("Wireless Controller".into()),
        }])
    }

    fn open(&mut self, _info: &HidDeviceInfo) -> Result<Box<dyn HidDevice>, TransportError> {
        Ok(Box::new(MockDevice(Arc::clone(&self.0))))
    }
}

/// Wired USB report with centered sticks and Cross held
fn cross_report() -> Vec<u8> {
    let mut buf = vec![0u8; size::USB_INPUT];
    buf[0] = report_id::USB_INPUT;
    let p = report_offset::USB_PAYLOAD;
    for axis in [common::LEFT_X, common::LEFT_Y, common::RIGHT_X, common::RIGHT_Y] {
        buf[p + axis] = 0x80;
    }
    buf[p + common::BUTTONS] = 0x08 | 0x20;
    buf[p + common::STATUS] = 0x10 | 0x05;
    buf
}

fn start_ds4() -> (PadDispatch, Shared) {
    let state: Shared = Arc::new(Mutex::new(MockState::default()));
    state.lock().reads.push_back(cross_report());

    let config = PadbridgeConfig {
        players: vec![PlayerConfig::new(HandlerKind::Ds4, "DS4 Pad #1")],
    };
    let provider_state = Arc::clone(&state);
    let dispatch = PadDispatch::start(config, move || Providers {
        hid: Some(Box::new(MockProvider(provider_state))),
        xinput: None,
        keyboard: KeyboardState::new(),
    })
    .unwrap();
    (dispatch, state)
}

fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn test_ds4_connects_and_reports_buttons() {
    let (mut dispatch, _state) = start_ds4();

    assert!(wait_for(|| dispatch.slots()[0].read().is_connected()));
    assert!(wait_for(|| {
        dispatch.get_pads()[0].digital(offset::DIGITAL2) & digital2::CROSS != 0
    }));

    let info = dispatch.get_info();
    assert_eq!(info.now_connect, 1);
    assert_ne!(info.port_status[0] & port_status::ASSIGN_CHANGES, 0);
    let info = dispatch.get_info();
    assert_eq!(info.port_status[0] & port_status::ASSIGN_CHANGES, 0);

    dispatch.stop();
}

#[test]
fn test_rumble_reaches_output_report() {
    let (mut dispatch, state) = start_ds4();
    assert!(wait_for(|| dispatch.slots()[0].read().is_connected()));
    std::thread::sleep(Duration::from_millis(50));
    let led_before = match state.lock().writes.last() {
        Some(report) => report[6..9].to_vec(),
        None => panic!("no output report after connecting"),
    };

    dispatch.set_rumble(0, 200, true);
    assert!(wait_for(|| {
        state
            .lock()
            .writes
            .iter()
            .any(|w| w.len() == size::USB_OUTPUT && w[5] == 200 && w[4] == 255)
    }));

    let writes = state.lock().writes.clone();
    let report = writes
        .iter()
        .find(|w| w[5] == 200 && w[4] == 255)
        .unwrap();
    assert_eq!(report[0], report_id::USB_OUTPUT);
    assert_eq!(report[6..9], led_before[..]);

    dispatch.stop();
    // shutdown silences the motors
    let writes = state.lock().writes.clone();
    let last = writes.last().unwrap();
    assert_eq!(last[4], 0);
    assert_eq!(last[5], 0);
}

#[test]
fn test_read_error_disconnects_once() {
    let (mut dispatch, state) = start_ds4();
    assert!(wait_for(|| dispatch.slots()[0].read().is_connected()));
    dispatch.get_info();

    state.lock().fail_read = true;
    assert!(wait_for(|| !dispatch.slots()[0].read().is_connected()));
    let status = dispatch.slots()[0].read().port_status;
    assert_ne!(status & port_status::ASSIGN_CHANGES, 0);

    let info = dispatch.get_info();
    assert_eq!(info.now_connect, 0);

    // stays disconnected without raising the change flag again
    std::thread::sleep(Duration::from_millis(50));
    let status = dispatch.slots()[0].read().port_status;
    assert_eq!(status & port_status::CONNECTED, 0);
    assert_eq!(status & port_status::ASSIGN_CHANGES, 0);

    dispatch.stop();
}

#[test]
fn test_intercept_and_disable() {
    let (mut dispatch, _state) = start_ds4();
    assert!(wait_for(|| {
        dispatch.get_pads()[0].digital(offset::DIGITAL2) & digital2::CROSS != 0
    }));

    dispatch.set_intercepted(true);
    assert_eq!(dispatch.get_pads()[0].digital(offset::DIGITAL2), 0);
    assert_ne!(dispatch.get_info().system_info & padbridge_pad::pad::pad_info::INTERCEPTED, 0);
    dispatch.set_intercepted(false);
    assert_ne!(dispatch.get_pads()[0].digital(offset::DIGITAL2) & digital2::CROSS, 0);

    dispatch.set_enabled(false);
    assert!(!dispatch.is_enabled());
    dispatch.set_enabled(true);

    dispatch.reset();
    assert!(wait_for(|| dispatch.slots()[0].read().is_connected()));
    dispatch.stop();
}
