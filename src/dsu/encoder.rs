//! # DSU Packet Encoder
//!
//! Builds server→client DSU packets (version, port info, controller data).

use bytes::BufMut;

use super::crc::crc32;
use super::protocol::*;
use crate::controller::state::ControllerSlot;

/// Encode a version response
///
/// # Arguments
///
/// * `server_id` - Server identity for this process run
///
/// # Returns
///
/// * `Vec<u8>` - Complete packet (22 bytes: header + 2-byte version)
///
/// # Examples
///
/// ```
/// use vr_dsu_bridge::dsu::encoder::encode_version_response;
///
/// let packet = encode_version_response(0x1234_5678);
/// assert_eq!(packet.len(), 22);
/// assert_eq!(&packet[..4], b"DSUS");
/// ```
pub fn encode_version_response(server_id: u32) -> Vec<u8> {
    let mut packet = Vec::with_capacity(DSU_HEADER_SIZE + VERSION_PAYLOAD_SIZE);
    put_header(&mut packet, DSU_MAGIC_SERVER, server_id, MessageType::Version.value(), VERSION_PAYLOAD_SIZE);
    packet.put_u16_le(DSU_PROTOCOL_VERSION);

    finalize_crc(&mut packet);
    packet
}

/// Encode a port info response for one slot
///
/// # Arguments
///
/// * `server_id` - Server identity for this process run
/// * `slot` - Slot snapshot to describe
///
/// # Returns
///
/// * `Vec<u8>` - Complete packet (32 bytes: header + 11-byte info + terminator)
pub fn encode_port_info_response(server_id: u32, slot: &ControllerSlot) -> Vec<u8> {
    let mut packet = Vec::with_capacity(DSU_HEADER_SIZE + PORT_INFO_PAYLOAD_SIZE);
    put_header(&mut packet, DSU_MAGIC_SERVER, server_id, MessageType::Ports.value(), PORT_INFO_PAYLOAD_SIZE);
    put_shared_info(&mut packet, slot);
    packet.put_u8(0); // terminator

    finalize_crc(&mut packet);
    packet
}

/// Encode a controller data packet for one slot
///
/// The slot's current `packet_number` is written as-is; advancing the
/// counter is the caller's job (see [`crate::controller::store::ControllerStore`]).
///
/// # Arguments
///
/// * `server_id` - Server identity for this process run
/// * `slot` - Slot snapshot to report
/// * `timestamp_us` - Motion timestamp in microseconds
///
/// # Returns
///
/// * `Vec<u8>` - Complete packet (100 bytes: header + 80-byte payload)
///
/// # Payload Layout
///
/// ```text
/// 0..11   shared info (slot, state, model, connection, mac, battery)
/// 11      connected flag
/// 12..16  packet number
/// 16..20  buttons1, buttons2, home, touch
/// 20..24  LX, LY, RX, RY
/// 24..28  analog D-Pad (unused)
/// 28..32  analog Y, B, A, X
/// 32..36  analog R1, L1, R2, L2
/// 36..48  two touch records (unused)
/// 48..56  timestamp (µs)
/// 56..68  accel x, y, z (g)
/// 68..80  gyro x, y, z (deg/s)
/// ```
pub fn encode_data_response(server_id: u32, slot: &ControllerSlot, timestamp_us: u64) -> Vec<u8> {
    let mut packet = Vec::with_capacity(DSU_HEADER_SIZE + DATA_PAYLOAD_SIZE);
    put_header(&mut packet, DSU_MAGIC_SERVER, server_id, MessageType::Data.value(), DATA_PAYLOAD_SIZE);
    put_shared_info(&mut packet, slot);

    packet.put_u8(slot.connected as u8);
    packet.put_u32_le(slot.packet_number);

    packet.put_u8(slot.buttons1);
    packet.put_u8(slot.buttons2);
    packet.put_u8(0); // home
    packet.put_u8(0); // touchpad click

    packet.put_slice(&slot.sticks());
    packet.put_bytes(0, 4); // analog D-Pad, digital only
    packet.put_slice(&slot.analog_face_buttons());
    packet.put_slice(&slot.analog_shoulders());
    packet.put_bytes(0, 12); // touch points, inactive

    packet.put_u64_le(timestamp_us);
    for value in slot.accel.iter().chain(slot.gyro.iter()) {
        packet.put_f32_le(*value);
    }

    finalize_crc(&mut packet);
    packet
}

/// Encode a client→server request, as sent by DSU consumers
///
/// # Arguments
///
/// * `client_id` - Client identity written into the id field
/// * `request` - Request to encode
///
/// # Returns
///
/// * `Vec<u8>` - Complete `DSUC` datagram
pub fn encode_request(client_id: u32, request: &Request) -> Vec<u8> {
    let mut payload = Vec::new();
    let message_type = match request {
        Request::Version => MessageType::Version.value(),
        Request::Ports { slots } => {
            payload.put_i32_le(slots.len() as i32);
            payload.put_slice(slots);
            MessageType::Ports.value()
        }
        Request::Data { flags, slot, mac } => {
            payload.put_u8(*flags);
            payload.put_u8(*slot);
            payload.put_slice(mac);
            MessageType::Data.value()
        }
        Request::Unknown(value) => *value,
    };

    let mut packet = Vec::with_capacity(DSU_HEADER_SIZE + payload.len());
    put_header(&mut packet, DSU_MAGIC_CLIENT, client_id, message_type, payload.len());
    packet.put_slice(&payload);

    finalize_crc(&mut packet);
    packet
}

/// Zero the CRC field, checksum the whole packet and write the result back.
///
/// Packets shorter than the header are left untouched.
pub fn finalize_crc(packet: &mut [u8]) {
    if packet.len() < DSU_HEADER_SIZE {
        return;
    }

    packet[OFFSET_CRC..OFFSET_CRC + 4].fill(0);
    let crc = crc32(packet);
    packet[OFFSET_CRC..OFFSET_CRC + 4].copy_from_slice(&crc.to_le_bytes());
}

/// Write the 20-byte header with a zeroed CRC field
fn put_header(packet: &mut Vec<u8>, magic: [u8; 4], id: u32, message_type: u32, payload_len: usize) {
    packet.put_slice(&magic);
    packet.put_u16_le(DSU_PROTOCOL_VERSION);
    packet.put_u16_le((payload_len + MESSAGE_TYPE_SIZE) as u16);
    packet.put_u32_le(0);
    packet.put_u32_le(id);
    packet.put_u32_le(message_type);
}

/// Write the 11-byte slot description shared by info and data payloads
fn put_shared_info(packet: &mut Vec<u8>, slot: &ControllerSlot) {
    packet.put_u8(slot.slot_id);
    packet.put_u8(slot.slot_state());
    packet.put_u8(DEVICE_MODEL_FULL_GYRO);
    packet.put_u8(CONNECTION_TYPE_NONE);
    packet.put_slice(&slot.mac);
    packet.put_u8(slot.battery());
}
