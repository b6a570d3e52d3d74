//! # Controller Module
//!
//! Shared state of the four virtual controller slots.
//!
//! This module handles:
//! - Per-slot button, stick, analog and motion state
//! - Merging sparse browser updates with unit conversion
//! - Packet counters and connection tracking

pub mod state;
pub mod update;
pub mod store;
