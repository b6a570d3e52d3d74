//! # Controller Slot State
//!
//! The in-memory representation of one DSU controller slot.
//!
//! ## Button Bitmasks
//!
//! | Byte | Bit | Button |
//! |------|-----|--------|
//! | buttons1 | 0 | Share |
//! | buttons1 | 1 | L3 (left stick click) |
//! | buttons1 | 2 | R3 (right stick click) |
//! | buttons1 | 3 | Options |
//! | buttons1 | 4-7 | D-Pad Up, Right, Down, Left |
//! | buttons2 | 0 | L2 (digital) |
//! | buttons2 | 1 | R2 (digital) |
//! | buttons2 | 2 | L1 |
//! | buttons2 | 3 | R1 |
//! | buttons2 | 4 | Y / Triangle |
//! | buttons2 | 5 | B / Circle |
//! | buttons2 | 6 | A / Cross |
//! | buttons2 | 7 | X / Square |

use crate::dsu::protocol::{
    BATTERY_FULL, BATTERY_NONE, SLOT_STATE_CONNECTED, SLOT_STATE_DISCONNECTED,
};

/// Stick axis center value
pub const AXIS_CENTER: u8 = 128;

/// Analog value for a released trigger or button
pub const ANALOG_RELEASED: u8 = 0;

/// Analog value for a fully pressed button
pub const ANALOG_PRESSED: u8 = 255;

// buttons1
pub const BUTTON1_SHARE: u8 = 0x01;
pub const BUTTON1_L3: u8 = 0x02;
pub const BUTTON1_R3: u8 = 0x04;
pub const BUTTON1_OPTIONS: u8 = 0x08;
pub const BUTTON1_DPAD_UP: u8 = 0x10;
pub const BUTTON1_DPAD_RIGHT: u8 = 0x20;
pub const BUTTON1_DPAD_DOWN: u8 = 0x40;
pub const BUTTON1_DPAD_LEFT: u8 = 0x80;

// buttons2
pub const BUTTON2_L2: u8 = 0x01;
pub const BUTTON2_R2: u8 = 0x02;
pub const BUTTON2_L1: u8 = 0x04;
pub const BUTTON2_R1: u8 = 0x08;
pub const BUTTON2_Y: u8 = 0x10;
pub const BUTTON2_B: u8 = 0x20;
pub const BUTTON2_A: u8 = 0x40;
pub const BUTTON2_X: u8 = 0x80;

/// Synthetic MAC reported for a slot: five zero bytes then `slot + 1`
#[must_use]
pub const fn slot_mac(slot_id: u8) -> [u8; 6] {
    [0, 0, 0, 0, 0, slot_id.wrapping_add(1)]
}

/// State of a single controller slot.
///
/// Fields hold wire-ready values: sticks and analogs in 0-255, acceleration
/// in g, angular velocity in degrees per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerSlot {
    /// Slot index (0-3)
    pub slot_id: u8,

    /// Whether this slot has received input since its last disconnect
    pub connected: bool,

    /// Counter written into the next data packet
    pub packet_number: u32,

    /// Synthetic device MAC
    pub mac: [u8; 6],

    /// Digital buttons (Share, L3, R3, Options, D-Pad)
    pub buttons1: u8,

    /// Digital buttons (L2, R2, L1, R1, Y, B, A, X)
    pub buttons2: u8,

    pub left_stick_x: u8,
    pub left_stick_y: u8,
    pub right_stick_x: u8,
    pub right_stick_y: u8,

    /// Grip analogs, reported as shoulders
    pub analog_l1: u8,
    pub analog_r1: u8,

    /// Trigger analogs
    pub analog_l2: u8,
    pub analog_r2: u8,

    /// Accelerometer x, y, z in g
    pub accel: [f32; 3],

    /// Gyroscope x, y, z in deg/s
    pub gyro: [f32; 3],
}

impl ControllerSlot {
    /// Creates a disconnected slot with centered sticks and released buttons.
    ///
    /// # Examples
    ///
    /// ```
    /// use vr_dsu_bridge::controller::state::ControllerSlot;
    ///
    /// let slot = ControllerSlot::new(2);
    /// assert_eq!(slot.mac, [0, 0, 0, 0, 0, 3]);
    /// assert_eq!(slot.left_stick_x, 128);
    /// assert!(!slot.connected);
    /// ```
    #[must_use]
    pub fn new(slot_id: u8) -> Self {
        Self {
            slot_id,
            connected: false,
            packet_number: 0,
            mac: slot_mac(slot_id),
            buttons1: 0,
            buttons2: 0,
            left_stick_x: AXIS_CENTER,
            left_stick_y: AXIS_CENTER,
            right_stick_x: AXIS_CENTER,
            right_stick_y: AXIS_CENTER,
            analog_l1: ANALOG_RELEASED,
            analog_r1: ANALOG_RELEASED,
            analog_l2: ANALOG_RELEASED,
            analog_r2: ANALOG_RELEASED,
            accel: [0.0; 3],
            gyro: [0.0; 3],
        }
    }

    /// Slot state byte for the shared info block
    #[must_use]
    pub fn slot_state(&self) -> u8 {
        if self.connected {
            SLOT_STATE_CONNECTED
        } else {
            SLOT_STATE_DISCONNECTED
        }
    }

    /// Battery byte for the shared info block
    #[must_use]
    pub fn battery(&self) -> u8 {
        if self.connected {
            BATTERY_FULL
        } else {
            BATTERY_NONE
        }
    }

    /// Analog face buttons in wire order (Y, B, A, X), derived from `buttons2`.
    ///
    /// # Examples
    ///
    /// ```
    /// use vr_dsu_bridge::controller::state::{ControllerSlot, BUTTON2_A};
    ///
    /// let mut slot = ControllerSlot::new(0);
    /// slot.buttons2 = BUTTON2_A;
    /// assert_eq!(slot.analog_face_buttons(), [0, 0, 255, 0]);
    /// ```
    #[must_use]
    pub fn analog_face_buttons(&self) -> [u8; 4] {
        [BUTTON2_Y, BUTTON2_B, BUTTON2_A, BUTTON2_X].map(|mask| {
            if self.buttons2 & mask != 0 {
                ANALOG_PRESSED
            } else {
                ANALOG_RELEASED
            }
        })
    }

    /// Shoulder and trigger analogs in wire order (R1, L1, R2, L2)
    #[must_use]
    pub fn analog_shoulders(&self) -> [u8; 4] {
        [self.analog_r1, self.analog_l1, self.analog_r2, self.analog_l2]
    }

    /// Stick axes in wire order (LX, LY, RX, RY)
    #[must_use]
    pub fn sticks(&self) -> [u8; 4] {
        [
            self.left_stick_x,
            self.left_stick_y,
            self.right_stick_x,
            self.right_stick_y,
        ]
    }
}
