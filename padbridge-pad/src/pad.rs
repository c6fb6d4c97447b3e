//! Logical pad model
//!
//! A [`LogicalPad`] is what consumers see: port status bits, digital buttons
//! packed into two bitfields, four analog stick axes, motion sensors and two
//! vibration motors. Backends only ever write backend keycodes and 0..=255
//! values into it; the bit layout below is fixed.

use serde::Serialize;

/// Maximum number of logical pads
pub const MAX_PORTS: usize = 7;

/// Port status bits
pub mod port_status {
    pub const DISCONNECTED: u32 = 0x0;
    pub const CONNECTED: u32 = 0x1;
    /// Set on every connect/disconnect; cleared when the consumer reads pad info
    pub const ASSIGN_CHANGES: u32 = 0x2;
}

/// Port settings
pub mod port_setting {
    pub const PRESS_ON: u32 = 0x2;
    pub const SENSOR_ON: u32 = 0x4;
}

/// Device capability bits
pub mod capability {
    pub const PS3_CONFORMITY: u32 = 0x1;
    pub const PRESS_MODE: u32 = 0x2;
    pub const SENSOR_MODE: u32 = 0x4;
    pub const HP_ANALOG_STICK: u32 = 0x8;
    pub const ACTUATOR: u32 = 0x10;
}

/// Device type reported for every pad
pub const DEVICE_TYPE_STANDARD: u32 = 0;

/// Pad info system bits
pub mod pad_info {
    pub const INTERCEPTED: u32 = 0x1;
}

/// Offsets into the pad data block
pub mod offset {
    pub const DIGITAL1: u32 = 2;
    pub const DIGITAL2: u32 = 3;
    pub const ANALOG_RIGHT_X: u32 = 4;
    pub const ANALOG_RIGHT_Y: u32 = 5;
    pub const ANALOG_LEFT_X: u32 = 6;
    pub const ANALOG_LEFT_Y: u32 = 7;
    pub const SENSOR_X: u32 = 20;
    pub const SENSOR_Y: u32 = 21;
    pub const SENSOR_Z: u32 = 22;
    pub const SENSOR_G: u32 = 23;
}

/// Button bits at [`offset::DIGITAL1`]
pub mod digital1 {
    pub const SELECT: u16 = 0x01;
    pub const L3: u16 = 0x02;
    pub const R3: u16 = 0x04;
    pub const START: u16 = 0x08;
    pub const UP: u16 = 0x10;
    pub const RIGHT: u16 = 0x20;
    pub const DOWN: u16 = 0x40;
    pub const LEFT: u16 = 0x80;
    /// Outside the eight bits a real pad reports
    pub const PS: u16 = 0x100;
}

/// Button bits at [`offset::DIGITAL2`]
pub mod digital2 {
    pub const L2: u16 = 0x01;
    pub const R2: u16 = 0x02;
    pub const L1: u16 = 0x04;
    pub const R1: u16 = 0x08;
    pub const TRIANGLE: u16 = 0x10;
    pub const CIRCLE: u16 = 0x20;
    pub const CROSS: u16 = 0x40;
    pub const SQUARE: u16 = 0x80;
}

/// Neutral sensor readings (X, Y, Z, G)
pub const DEFAULT_SENSOR_VALUES: [u16; 4] = [512, 399, 512, 512];

/// A backend keycode. Each backend defines its own numbering.
pub type KeyCode = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub offset: u32,
    pub out_key_code: u16,
    pub key_code: KeyCode,
    pub pressed: bool,
    pub value: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalogStick {
    pub offset: u32,
    /// Key for left / down
    pub key_min: KeyCode,
    /// Key for right / up
    pub key_max: KeyCode,
    pub value: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalogSensor {
    pub offset: u32,
    pub value: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VibrateMotor {
    pub is_large: bool,
    pub value: u8,
}

/// Backend keycodes for every control of the standard layout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StandardLayout {
    pub triangle: KeyCode,
    pub circle: KeyCode,
    pub cross: KeyCode,
    pub square: KeyCode,
    pub l2: KeyCode,
    pub r2: KeyCode,
    pub l1: KeyCode,
    pub r1: KeyCode,
    pub start: KeyCode,
    pub select: KeyCode,
    pub l3: KeyCode,
    pub r3: KeyCode,
    pub ps: KeyCode,
    pub up: KeyCode,
    pub down: KeyCode,
    pub left: KeyCode,
    pub right: KeyCode,
    pub ls_left: KeyCode,
    pub ls_right: KeyCode,
    pub ls_down: KeyCode,
    pub ls_up: KeyCode,
    pub rs_left: KeyCode,
    pub rs_right: KeyCode,
    pub rs_down: KeyCode,
    pub rs_up: KeyCode,
}

/// One logical controller slot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogicalPad {
    pub port_status: u32,
    pub port_setting: u32,
    pub device_capability: u32,
    pub device_type: u32,
    /// Name of the bound physical device, empty when unbound
    pub device_name: String,
    pub buttons: Vec<Button>,
    pub sticks: Vec<AnalogStick>,
    pub sensors: Vec<AnalogSensor>,
    pub motors: Vec<VibrateMotor>,
    /// Battery percentage, 100 when wired or unknown
    pub battery_level: u8,
    pub cable_state: bool,
}

impl LogicalPad {
    /// Reset the slot and fill it with the standard control set
    ///
    /// Buttons are added in a fixed order: face buttons, shoulders, start,
    /// select, stick clicks, PS, then the d-pad.
    pub fn init(&mut self, device_name: &str, capability: u32, layout: &StandardLayout) {
        *self = LogicalPad {
            port_status: port_status::DISCONNECTED,
            port_setting: port_setting::PRESS_ON,
            device_capability: capability,
            device_type: DEVICE_TYPE_STANDARD,
            device_name: device_name.to_string(),
            battery_level: 100,
            ..LogicalPad::default()
        };

        let digital = [
            (offset::DIGITAL2, layout.triangle, digital2::TRIANGLE),
            (offset::DIGITAL2, layout.circle, digital2::CIRCLE),
            (offset::DIGITAL2, layout.cross, digital2::CROSS),
            (offset::DIGITAL2, layout.square, digital2::SQUARE),
            (offset::DIGITAL2, layout.l2, digital2::L2),
            (offset::DIGITAL2, layout.r2, digital2::R2),
            (offset::DIGITAL2, layout.l1, digital2::L1),
            (offset::DIGITAL2, layout.r1, digital2::R1),
            (offset::DIGITAL1, layout.start, digital1::START),
            (offset::DIGITAL1, layout.select, digital1::SELECT),
            (offset::DIGITAL1, layout.l3, digital1::L3),
            (offset::DIGITAL1, layout.r3, digital1::R3),
            (offset::DIGITAL1, layout.ps, digital1::PS),
            (offset::DIGITAL1, layout.up, digital1::UP),
            (offset::DIGITAL1, layout.down, digital1::DOWN),
            (offset::DIGITAL1, layout.left, digital1::LEFT),
            (offset::DIGITAL1, layout.right, digital1::RIGHT),
        ];
        self.buttons = digital
            .into_iter()
            .map(|(offset, key_code, out_key_code)| Button {
                offset,
                out_key_code,
                key_code,
                pressed: false,
                value: 0,
            })
            .collect();

        let sticks = [
            (offset::ANALOG_LEFT_X, layout.ls_left, layout.ls_right),
            (offset::ANALOG_LEFT_Y, layout.ls_down, layout.ls_up),
            (offset::ANALOG_RIGHT_X, layout.rs_left, layout.rs_right),
            (offset::ANALOG_RIGHT_Y, layout.rs_down, layout.rs_up),
        ];
        self.sticks = sticks
            .into_iter()
            .map(|(offset, key_min, key_max)| AnalogStick {
                offset,
                key_min,
                key_max,
                value: 128,
            })
            .collect();

        self.sensors = [
            offset::SENSOR_X,
            offset::SENSOR_Y,
            offset::SENSOR_Z,
            offset::SENSOR_G,
        ]
        .into_iter()
        .zip(DEFAULT_SENSOR_VALUES)
        .map(|(offset, value)| AnalogSensor { offset, value })
        .collect();

        self.motors = vec![
            VibrateMotor {
                is_large: true,
                value: 0,
            },
            VibrateMotor {
                is_large: false,
                value: 0,
            },
        ];
    }

    pub fn is_connected(&self) -> bool {
        self.port_status & port_status::CONNECTED != 0
    }

    /// Packed button bits at the given offset
    pub fn digital(&self, offset: u32) -> u16 {
        self.buttons
            .iter()
            .filter(|b| b.offset == offset && b.pressed)
            .fold(0, |acc, b| acc | b.out_key_code)
    }

    /// Analog stick value at the given offset, 128 when absent
    pub fn analog(&self, offset: u32) -> u16 {
        self.sticks
            .iter()
            .find(|s| s.offset == offset)
            .map_or(128, |s| s.value)
    }

    /// Sensor value at the given offset
    pub fn sensor(&self, offset: u32) -> Option<u16> {
        self.sensors.iter().find(|s| s.offset == offset).map(|s| s.value)
    }

    pub fn set_sensor(&mut self, offset: u32, value: u16) {
        if let Some(sensor) = self.sensors.iter_mut().find(|s| s.offset == offset) {
            sensor.value = value;
        }
    }

    /// Return every control to its neutral value
    pub fn clear_input(&mut self) {
        for button in &mut self.buttons {
            button.pressed = false;
            button.value = 0;
        }
        for stick in &mut self.sticks {
            stick.value = 128;
        }
        for (sensor, value) in self.sensors.iter_mut().zip(DEFAULT_SENSOR_VALUES) {
            sensor.value = value;
        }
    }
}

/// Summary of all slots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PadInfo {
    pub max_connect: u32,
    pub now_connect: u32,
    /// [`pad_info`] bits
    pub system_info: u32,
    pub port_status: [u32; MAX_PORTS],
    pub port_setting: [u32; MAX_PORTS],
    pub device_capability: [u32; MAX_PORTS],
    pub device_type: [u32; MAX_PORTS],
}
