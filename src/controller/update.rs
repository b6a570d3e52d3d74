//! # Control Updates
//!
//! Sparse controller updates as they arrive from the browser, and the numeric
//! conversions applied when they are merged into a [`ControllerSlot`].
//!
//! ## Conversions
//!
//! | Input | Range | Stored as |
//! |-------|-------|-----------|
//! | Thumbstick axis | -1.0 to 1.0 | `round((v + 1) * 127.5)`, 0-255 |
//! | Trigger / grip | 0.0 to 1.0 | `round(v * 255)`, 0-255 |
//! | Angular velocity | rad/s | deg/s |
//! | Acceleration | g | g (unchanged) |

use serde::Deserialize;

use super::state::ControllerSlot;

/// A 3-axis motion sample. Missing axes read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// A normalized thumbstick sample
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct StickInput {
    /// -1.0 (left) to 1.0 (right)
    pub x: f32,
    /// -1.0 (down) to 1.0 (up)
    pub y: f32,
}

impl StickInput {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Partial update for one slot. `None` fields keep their previous value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlUpdate {
    /// Acceleration in g
    pub accel: Option<Vector3>,
    /// Angular velocity in rad/s
    pub gyro: Option<Vector3>,
    pub buttons1: Option<u8>,
    pub buttons2: Option<u8>,
    pub left_stick: Option<StickInput>,
    pub right_stick: Option<StickInput>,
    /// Left trigger, 0.0 to 1.0
    pub l2: Option<f32>,
    /// Right trigger, 0.0 to 1.0
    pub r2: Option<f32>,
    /// Left grip, 0.0 to 1.0
    pub l1: Option<f32>,
    /// Right grip, 0.0 to 1.0
    pub r1: Option<f32>,
}

impl ControlUpdate {
    /// True when the update carries no fields at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge the present fields into `slot`, converting to wire units.
    ///
    /// Does not touch `connected` or `packet_number`.
    ///
    /// # Examples
    ///
    /// ```
    /// use vr_dsu_bridge::controller::state::ControllerSlot;
    /// use vr_dsu_bridge::controller::update::ControlUpdate;
    ///
    /// let mut slot = ControllerSlot::new(0);
    /// let update = ControlUpdate { l2: Some(0.75), ..Default::default() };
    /// update.apply_to(&mut slot);
    /// assert_eq!(slot.analog_l2, 191);
    /// ```
    pub fn apply_to(&self, slot: &mut ControllerSlot) {
        if let Some(accel) = self.accel {
            slot.accel = [finite(accel.x), finite(accel.y), finite(accel.z)];
        }
        if let Some(gyro) = self.gyro {
            slot.gyro = [
                rad_to_deg(gyro.x),
                rad_to_deg(gyro.y),
                rad_to_deg(gyro.z),
            ];
        }
        if let Some(buttons1) = self.buttons1 {
            slot.buttons1 = buttons1;
        }
        if let Some(buttons2) = self.buttons2 {
            slot.buttons2 = buttons2;
        }
        if let Some(stick) = self.left_stick {
            slot.left_stick_x = stick_to_u8(stick.x);
            slot.left_stick_y = stick_to_u8(stick.y);
        }
        if let Some(stick) = self.right_stick {
            slot.right_stick_x = stick_to_u8(stick.x);
            slot.right_stick_y = stick_to_u8(stick.y);
        }
        if let Some(value) = self.l2 {
            slot.analog_l2 = analog_to_u8(value);
        }
        if let Some(value) = self.r2 {
            slot.analog_r2 = analog_to_u8(value);
        }
        if let Some(value) = self.l1 {
            slot.analog_l1 = analog_to_u8(value);
        }
        if let Some(value) = self.r1 {
            slot.analog_r1 = analog_to_u8(value);
        }
    }
}

/// Convert a normalized stick axis (-1.0 to 1.0) to 0-255 with 128 at center.
///
/// # Examples
///
/// ```
/// use vr_dsu_bridge::controller::update::stick_to_u8;
///
/// assert_eq!(stick_to_u8(-1.0), 0);
/// assert_eq!(stick_to_u8(0.0), 128);
/// assert_eq!(stick_to_u8(1.0), 255);
/// ```
#[must_use]
pub fn stick_to_u8(value: f32) -> u8 {
    ((finite(value) + 1.0) * 127.5).round().clamp(0.0, 255.0) as u8
}

/// Convert a normalized analog (0.0 to 1.0) to 0-255.
#[must_use]
pub fn analog_to_u8(value: f32) -> u8 {
    (finite(value) * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Convert radians per second to degrees per second.
#[must_use]
pub fn rad_to_deg(value: f32) -> f32 {
    finite(value).to_degrees()
}

/// NaN and infinities from the browser are treated as zero
fn finite(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stick_conversion() {
        assert_eq!(stick_to_u8(-1.0), 0);
        assert_eq!(stick_to_u8(0.0), 128);
        assert_eq!(stick_to_u8(1.0), 255);
        assert_eq!(stick_to_u8(0.5), 191);
        assert_eq!(stick_to_u8(-0.5), 64);
    }

    #[test]
    fn test_stick_conversion_clamps() {
        assert_eq!(stick_to_u8(-3.0), 0);
        assert_eq!(stick_to_u8(2.5), 255);
        assert_eq!(stick_to_u8(f32::NAN), 128);
    }

    #[test]
    fn test_analog_conversion() {
        assert_eq!(analog_to_u8(0.0), 0);
        assert_eq!(analog_to_u8(0.75), 191);
        assert_eq!(analog_to_u8(1.0), 255);
        assert_eq!(analog_to_u8(1.5), 255);
        assert_eq!(analog_to_u8(-0.2), 0);
        assert_eq!(analog_to_u8(f32::INFINITY), 0);
    }

    #[test]
    fn test_rad_to_deg() {
        assert!((rad_to_deg(std::f32::consts::PI) - 180.0).abs() < 1e-3);
        assert!((rad_to_deg(-std::f32::consts::FRAC_PI_2) + 90.0).abs() < 1e-3);
        assert_eq!(rad_to_deg(f32::NAN), 0.0);
    }

    #[test]
    fn test_apply_partial_update_keeps_other_fields() {
        let mut slot = ControllerSlot::new(0);
        ControlUpdate {
            accel: Some(Vector3::new(0.0, 1.0, 0.0)),
            buttons1: Some(0x02),
            buttons2: Some(0x40),
            left_stick: Some(StickInput::new(1.0, -1.0)),
            ..Default::default()
        }
        .apply_to(&mut slot);

        ControlUpdate { l2: Some(0.75), ..Default::default() }.apply_to(&mut slot);

        assert_eq!(slot.analog_l2, 191);
        assert_eq!(slot.accel, [0.0, 1.0, 0.0]);
        assert_eq!(slot.buttons1, 0x02);
        assert_eq!(slot.buttons2, 0x40);
        assert_eq!(slot.left_stick_x, 255);
        assert_eq!(slot.left_stick_y, 0);
        assert_eq!(slot.right_stick_x, 128);
        assert_eq!(slot.gyro, [0.0; 3]);
    }

    #[test]
    fn test_apply_gyro_converts_to_degrees() {
        let mut slot = ControllerSlot::new(1);
        ControlUpdate {
            gyro: Some(Vector3::new(std::f32::consts::PI, 0.0, -std::f32::consts::PI)),
            ..Default::default()
        }
        .apply_to(&mut slot);

        assert!((slot.gyro[0] - 180.0).abs() < 1e-3);
        assert_eq!(slot.gyro[1], 0.0);
        assert!((slot.gyro[2] + 180.0).abs() < 1e-3);
    }

    #[test]
    fn test_apply_does_not_touch_lifecycle_fields() {
        let mut slot = ControllerSlot::new(2);
        slot.packet_number = 9;
        ControlUpdate { r1: Some(1.0), ..Default::default() }.apply_to(&mut slot);

        assert_eq!(slot.analog_r1, 255);
        assert_eq!(slot.packet_number, 9);
        assert!(!slot.connected);
    }

    #[test]
    fn test_is_empty() {
        assert!(ControlUpdate::default().is_empty());
        assert!(!ControlUpdate { r2: Some(0.0), ..Default::default() }.is_empty());
    }
}
