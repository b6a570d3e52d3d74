//! # DSU Protocol Module
//!
//! Implementation of the DSU ("cemuhook") UDP protocol used by emulators to
//! read motion and button data from an external server.
//!
//! This module handles:
//! - Request decoding and response encoding (Version, Ports, Data)
//! - CRC32 checksum calculation
//! - Client registration and expiry
//! - Fixed-rate streaming of connected slots

pub mod protocol;
pub mod encoder;
pub mod decoder;
pub mod crc;
pub mod socket;
pub mod client;
pub mod server;
pub mod stream;
