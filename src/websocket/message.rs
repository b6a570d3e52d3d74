//! # Browser Messages
//!
//! JSON text frames sent by the WebXR page, tagged by `type`:
//!
//! | Type | Effect |
//! |------|--------|
//! | `controller_data` | Update one slot from one hand |
//! | `combined_controller` | Update slot 0 from both hands |
//! | `controller_disconnect` | Mark one slot disconnected |
//! | `config` | Page settings, logged only |
//!
//! Unknown fields are ignored and missing fields leave the slot untouched.

use serde::Deserialize;

use crate::controller::store::ControllerStore;
use crate::controller::update::{ControlUpdate, StickInput, Vector3};
use crate::dsu::protocol::DSU_MAX_SLOTS;
use crate::error::{BridgeError, Result};

/// One inbound text frame
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    ControllerData(ControllerData),
    CombinedController(CombinedController),
    ControllerDisconnect(ControllerDisconnect),
    Config(PageConfig),
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    /// Parse a text frame
    ///
    /// # Errors
    ///
    /// Returns `Json` for invalid JSON, a missing `type` or mistyped fields.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Apply the message to the store.
    ///
    /// Returns `true` when controller state changed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSlot` when the message names a slot outside 0-3.
    pub fn apply(&self, store: &ControllerStore) -> Result<bool> {
        match self {
            InboundMessage::ControllerData(data) => {
                let slot = data.slot.unwrap_or_default().index()?;
                apply_update(store, slot, &data.to_update(slot))
            }
            InboundMessage::CombinedController(combined) => {
                apply_update(store, 0, &combined.to_update())
            }
            InboundMessage::ControllerDisconnect(disconnect) => {
                store.mark_disconnected(disconnect.slot.unwrap_or_default().index()?)?;
                Ok(true)
            }
            InboundMessage::Config(_) | InboundMessage::Unknown => Ok(false),
        }
    }
}

/// An empty update still connects an idle slot but is a no-op otherwise
fn apply_update(store: &ControllerStore, slot: u8, update: &ControlUpdate) -> Result<bool> {
    if update.is_empty() && store.get(slot)?.connected {
        return Ok(false);
    }
    store.apply_update(slot, update)?;
    Ok(true)
}

/// Slot reference: an index or a hand name
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SlotRef {
    Index(i64),
    Hand(Hand),
}

impl Default for SlotRef {
    fn default() -> Self {
        SlotRef::Index(0)
    }
}

impl SlotRef {
    /// Resolve to a slot index (`left` is 0, `right` is 1)
    pub fn index(self) -> Result<u8> {
        match self {
            SlotRef::Hand(Hand::Left) => Ok(0),
            SlotRef::Hand(Hand::Right) => Ok(1),
            SlotRef::Index(index) => u8::try_from(index)
                .ok()
                .filter(|&slot| (slot as usize) < DSU_MAX_SLOTS)
                .ok_or(BridgeError::InvalidSlot(index.clamp(0, u8::MAX as i64) as u8)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    Left,
    Right,
}

/// Input from one hand as reported by the page
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HandInput {
    /// Acceleration in g
    pub accel: Option<Vector3>,
    /// Angular velocity in rad/s
    pub gyro: Option<Vector3>,
    pub thumbstick: Option<StickInput>,
    pub trigger: Option<f32>,
    pub grip: Option<f32>,
}

/// `controller_data`: one hand mapped to one slot
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ControllerData {
    pub slot: Option<SlotRef>,
    #[serde(flatten)]
    pub hand: HandInput,
    pub buttons1: Option<u8>,
    pub buttons2: Option<u8>,
}

impl ControllerData {
    /// Build the slot update.
    ///
    /// Slot 0 drives the left stick, L2 and L1; any other slot drives the
    /// right stick, R2 and R1.
    pub fn to_update(&self, slot: u8) -> ControlUpdate {
        let hand = &self.hand;
        let mut update = ControlUpdate {
            accel: hand.accel,
            gyro: hand.gyro,
            buttons1: self.buttons1,
            buttons2: self.buttons2,
            ..Default::default()
        };

        if slot == 0 {
            update.left_stick = hand.thumbstick;
            update.l2 = hand.trigger;
            update.l1 = hand.grip;
        } else {
            update.right_stick = hand.thumbstick;
            update.r2 = hand.trigger;
            update.r1 = hand.grip;
        }
        update
    }
}

/// `combined_controller`: both hands folded into slot 0
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CombinedController {
    pub left: Option<HandInput>,
    pub right: Option<HandInput>,
    pub buttons1: Option<u8>,
    pub buttons2: Option<u8>,
}

impl CombinedController {
    /// Motion comes from the left hand only
    pub fn to_update(&self) -> ControlUpdate {
        let left = self.left.clone().unwrap_or_default();
        let right = self.right.clone().unwrap_or_default();

        ControlUpdate {
            accel: left.accel,
            gyro: left.gyro,
            buttons1: self.buttons1,
            buttons2: self.buttons2,
            left_stick: left.thumbstick,
            right_stick: right.thumbstick,
            l2: left.trigger,
            r2: right.trigger,
            l1: left.grip,
            r1: right.grip,
        }
    }
}

/// `controller_disconnect`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ControllerDisconnect {
    pub slot: Option<SlotRef>,
}

/// `config`: free-form page settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PageConfig {
    #[serde(flatten)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}
