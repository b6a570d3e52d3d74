//! # Controller Store
//!
//! Shared table of the four DSU controller slots.
//!
//! Each slot sits behind its own mutex. Locks are held only for field copies
//! and packet assembly, never across socket I/O or `.await` points.

use std::sync::{Mutex, MutexGuard};

use tracing::info;

use super::state::ControllerSlot;
use super::update::ControlUpdate;
use crate::dsu::encoder::encode_data_response;
use crate::dsu::protocol::DSU_MAX_SLOTS;
use crate::error::{BridgeError, Result};

/// Thread-safe storage for all controller slots
#[derive(Debug)]
pub struct ControllerStore {
    slots: [Mutex<ControllerSlot>; DSU_MAX_SLOTS],
}

impl Default for ControllerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerStore {
    /// Creates a store with all four slots disconnected and centered.
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|id| Mutex::new(ControllerSlot::new(id as u8))),
        }
    }

    /// Snapshot of one slot
    ///
    /// # Errors
    ///
    /// Returns `InvalidSlot` if `slot` is not 0-3.
    pub fn get(&self, slot: u8) -> Result<ControllerSlot> {
        Ok(*self.lock(slot)?)
    }

    /// Merge a partial update into a slot and mark it connected.
    ///
    /// The first update after a disconnect logs the transition.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSlot` if `slot` is not 0-3.
    pub fn apply_update(&self, slot: u8, update: &ControlUpdate) -> Result<()> {
        let became_connected = {
            let mut state = self.lock(slot)?;
            update.apply_to(&mut state);
            !std::mem::replace(&mut state.connected, true)
        };

        if became_connected {
            info!("Controller slot {} connected", slot);
        }
        Ok(())
    }

    /// Mark a slot connected without changing its input state.
    pub fn mark_connected(&self, slot: u8) -> Result<()> {
        let was_connected = std::mem::replace(&mut self.lock(slot)?.connected, true);
        if !was_connected {
            info!("Controller slot {} connected", slot);
        }
        Ok(())
    }

    /// Mark a slot disconnected. Input state and the packet counter are kept.
    pub fn mark_disconnected(&self, slot: u8) -> Result<()> {
        let was_connected = std::mem::replace(&mut self.lock(slot)?.connected, false);
        if was_connected {
            info!("Controller slot {} disconnected", slot);
        }
        Ok(())
    }

    /// Disconnect every slot (e.g. when the input source goes away)
    pub fn disconnect_all(&self) {
        for slot in 0..DSU_MAX_SLOTS as u8 {
            // Indices are always in range here
            let _ = self.mark_disconnected(slot);
        }
    }

    /// Indices of all connected slots, ascending
    pub fn connected_slots(&self) -> Vec<u8> {
        (0..DSU_MAX_SLOTS as u8)
            .filter(|&slot| self.lock(slot).map(|s| s.connected).unwrap_or(false))
            .collect()
    }

    /// Build a data packet for a connected slot and advance its counter.
    ///
    /// Returns `None` for disconnected or out-of-range slots. The counter is
    /// written first, then incremented with wraparound, so consecutive
    /// packets carry 0, 1, 2, ...
    pub fn next_data_packet(&self, slot: u8, server_id: u32, timestamp_us: u64) -> Option<Vec<u8>> {
        let mut state = self.lock(slot).ok()?;
        if !state.connected {
            return None;
        }

        let packet = encode_data_response(server_id, &state, timestamp_us);
        state.packet_number = state.packet_number.wrapping_add(1);
        Some(packet)
    }

    fn lock(&self, slot: u8) -> Result<MutexGuard<'_, ControllerSlot>> {
        let cell = self
            .slots
            .get(slot as usize)
            .ok_or(BridgeError::InvalidSlot(slot))?;

        // A poisoned slot still holds plain data; keep serving it
        Ok(cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}
