//! # DSU Protocol Constants and Types
//!
//! Core protocol definitions for the DSU (cemuhook) UDP protocol.
//!
//! ## Header Layout (20 bytes, little-endian)
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | Magic: `DSUS` (server) / `DSUC` (client) |
//! | 4 | 2 | Protocol version (1001) |
//! | 6 | 2 | Payload length + 4 |
//! | 8 | 4 | CRC32 with this field zeroed |
//! | 12 | 4 | Server ID |
//! | 16 | 4 | Message type |

/// Magic bytes for server→client packets
pub const DSU_MAGIC_SERVER: [u8; 4] = *b"DSUS";

/// Magic bytes for client→server packets
pub const DSU_MAGIC_CLIENT: [u8; 4] = *b"DSUC";

/// Protocol version carried in every header and in the version response
pub const DSU_PROTOCOL_VERSION: u16 = 1001;

/// Default UDP port for DSU servers
pub const DSU_DEFAULT_PORT: u16 = 26760;

/// Header size in bytes
pub const DSU_HEADER_SIZE: usize = 20;

/// Header field offsets
pub const OFFSET_VERSION: usize = 4;
pub const OFFSET_LENGTH: usize = 6;
pub const OFFSET_CRC: usize = 8;
pub const OFFSET_SERVER_ID: usize = 12;
pub const OFFSET_MESSAGE_TYPE: usize = 16;

/// Message type field occupies 4 bytes that are counted in the length field
pub const MESSAGE_TYPE_SIZE: usize = 4;

/// Version response payload size
pub const VERSION_PAYLOAD_SIZE: usize = 2;

/// Port info response payload size
pub const PORT_INFO_PAYLOAD_SIZE: usize = 12;

/// Data response payload size
pub const DATA_PAYLOAD_SIZE: usize = 80;

/// Shared slot info block at the start of port info and data payloads
pub const SHARED_INFO_SIZE: usize = 11;

/// Number of controller slots a DSU server exposes
pub const DSU_MAX_SLOTS: usize = 4;

/// Slot state reported for a connected controller
pub const SLOT_STATE_CONNECTED: u8 = 2;

/// Slot state reported for an empty slot
pub const SLOT_STATE_DISCONNECTED: u8 = 0;

/// Device model: full gyro (DualShock 4 class)
pub const DEVICE_MODEL_FULL_GYRO: u8 = 2;

/// Connection type: not applicable
pub const CONNECTION_TYPE_NONE: u8 = 0;

/// Battery status reported for connected slots (full)
pub const BATTERY_FULL: u8 = 0x05;

/// Battery status reported for empty slots
pub const BATTERY_NONE: u8 = 0x00;

/// DSU message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Protocol version information
    Version,
    /// Information about connected controllers
    Ports,
    /// Actual controller data
    Data,
}

impl MessageType {
    /// Wire value of this message type
    pub const fn value(self) -> u32 {
        match self {
            MessageType::Version => 0x10_0000,
            MessageType::Ports => 0x10_0001,
            MessageType::Data => 0x10_0002,
        }
    }

    /// Map a wire value to a known message type
    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            0x10_0000 => Some(MessageType::Version),
            0x10_0001 => Some(MessageType::Ports),
            0x10_0002 => Some(MessageType::Data),
            _ => None,
        }
    }
}

/// Data request subscription flags (payload byte 0)
pub const DATA_FLAG_SLOT: u8 = 0x01;
pub const DATA_FLAG_MAC: u8 = 0x02;

/// A parsed client→server request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Protocol version query
    Version,

    /// Port info query for the listed slots (already filtered to 0-3)
    Ports {
        /// Requested slots, in request order
        slots: Vec<u8>,
    },

    /// Controller data subscription
    Data {
        /// Registration flags (0 = all slots)
        flags: u8,
        /// Slot to report when `DATA_FLAG_SLOT` is set
        slot: u8,
        /// MAC to report when `DATA_FLAG_MAC` is set
        mac: [u8; 6],
    },

    /// Any other message type; not answered
    Unknown(u32),
}

impl Request {
    /// Short name used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            Request::Version => "version",
            Request::Ports { .. } => "ports",
            Request::Data { .. } => "data",
            Request::Unknown(_) => "unknown",
        }
    }
}
