//! # DSU Packet Decoder
//!
//! Parses client→server requests and, for diagnostics and tests, server data
//! packets.

use super::crc::crc32;
use super::protocol::*;
use crate::error::{BridgeError, Result};

/// Parsed 20-byte DSU header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub magic: [u8; 4],
    pub version: u16,
    /// Payload length + 4
    pub length: u16,
    pub crc: u32,
    pub server_id: u32,
    pub message_type: u32,
}

/// Decoded controller data packet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataReport {
    pub slot: u8,
    pub slot_state: u8,
    pub mac: [u8; 6],
    pub battery: u8,
    pub connected: bool,
    pub packet_number: u32,
    pub buttons1: u8,
    pub buttons2: u8,
    /// LX, LY, RX, RY
    pub sticks: [u8; 4],
    /// Y, B, A, X
    pub analog_face: [u8; 4],
    /// R1, L1, R2, L2
    pub analog_shoulders: [u8; 4],
    pub timestamp_us: u64,
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
}

/// Parse the fixed header of any DSU packet
///
/// # Errors
///
/// Returns error if the buffer is shorter than 20 bytes.
pub fn parse_header(packet: &[u8]) -> Result<PacketHeader> {
    if packet.len() < DSU_HEADER_SIZE {
        return Err(BridgeError::Protocol(format!(
            "Packet too short: {} bytes",
            packet.len()
        )));
    }

    Ok(PacketHeader {
        magic: [packet[0], packet[1], packet[2], packet[3]],
        version: read_u16(packet, OFFSET_VERSION)?,
        length: read_u16(packet, OFFSET_LENGTH)?,
        crc: read_u32(packet, OFFSET_CRC)?,
        server_id: read_u32(packet, OFFSET_SERVER_ID)?,
        message_type: read_u32(packet, OFFSET_MESSAGE_TYPE)?,
    })
}

/// Check the embedded CRC against the packet contents
pub fn verify_checksum(packet: &[u8]) -> bool {
    let Ok(header) = parse_header(packet) else {
        return false;
    };

    let mut zeroed = packet.to_vec();
    zeroed[OFFSET_CRC..OFFSET_CRC + 4].fill(0);
    crc32(&zeroed) == header.crc
}

/// Decode a client→server request datagram
///
/// # Arguments
///
/// * `datagram` - Raw UDP payload
///
/// # Returns
///
/// * `Result<Request>` - Parsed request
///
/// # Errors
///
/// Returns error if:
/// - Datagram is shorter than the header
/// - Magic is not `DSUC`
/// - A ports request is truncated before its slot list ends
pub fn decode_request(datagram: &[u8]) -> Result<Request> {
    let header = parse_header(datagram)?;

    if header.magic != DSU_MAGIC_CLIENT {
        return Err(BridgeError::Protocol(format!(
            "Invalid magic: {:02X?}",
            header.magic
        )));
    }

    let payload = &datagram[DSU_HEADER_SIZE..];

    match MessageType::from_value(header.message_type) {
        Some(MessageType::Version) => Ok(Request::Version),
        Some(MessageType::Ports) => decode_ports_request(payload),
        Some(MessageType::Data) => Ok(decode_data_request(payload)),
        None => Ok(Request::Unknown(header.message_type)),
    }
}

/// Ports payload: i32 count followed by one byte per slot
fn decode_ports_request(payload: &[u8]) -> Result<Request> {
    let count = read_i32(payload, 0)?;
    let count = count.clamp(0, DSU_MAX_SLOTS as i32) as usize;

    let listed = payload.get(4..4 + count).ok_or_else(|| {
        BridgeError::Protocol(format!(
            "Ports request lists {} slots but carries {} bytes",
            count,
            payload.len().saturating_sub(4)
        ))
    })?;

    let slots = listed
        .iter()
        .copied()
        .filter(|&slot| (slot as usize) < DSU_MAX_SLOTS)
        .collect();

    Ok(Request::Ports { slots })
}

/// Data payload: flags, slot, mac. Missing bytes default to zero.
fn decode_data_request(payload: &[u8]) -> Request {
    let flags = payload.first().copied().unwrap_or(0);
    let slot = payload.get(1).copied().unwrap_or(0);
    let mut mac = [0u8; 6];
    if let Some(bytes) = payload.get(2..8) {
        mac.copy_from_slice(bytes);
    }

    Request::Data { flags, slot, mac }
}

/// Decode a server data packet back into its fields
///
/// # Errors
///
/// Returns error if the packet is not a complete `DSUS` data packet.
pub fn decode_data_response(packet: &[u8]) -> Result<DataReport> {
    let header = parse_header(packet)?;

    if header.magic != DSU_MAGIC_SERVER || header.message_type != MessageType::Data.value() {
        return Err(BridgeError::Protocol("Not a DSU data packet".to_string()));
    }

    let p = packet
        .get(DSU_HEADER_SIZE..DSU_HEADER_SIZE + DATA_PAYLOAD_SIZE)
        .ok_or_else(|| {
            BridgeError::Protocol(format!("Data packet too short: {} bytes", packet.len()))
        })?;

    let mut mac = [0u8; 6];
    mac.copy_from_slice(&p[4..10]);

    Ok(DataReport {
        slot: p[0],
        slot_state: p[1],
        mac,
        battery: p[10],
        connected: p[11] != 0,
        packet_number: read_u32(p, 12)?,
        buttons1: p[16],
        buttons2: p[17],
        sticks: [p[20], p[21], p[22], p[23]],
        analog_face: [p[28], p[29], p[30], p[31]],
        analog_shoulders: [p[32], p[33], p[34], p[35]],
        timestamp_us: read_u64(p, 48)?,
        accel: [read_f32(p, 56)?, read_f32(p, 60)?, read_f32(p, 64)?],
        gyro: [read_f32(p, 68)?, read_f32(p, 72)?, read_f32(p, 76)?],
    })
}

fn field<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N]> {
    data.get(offset..offset + N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| {
            BridgeError::Protocol(format!(
                "Field at offset {} exceeds {} bytes",
                offset,
                data.len()
            ))
        })
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16> {
    field(data, offset).map(u16::from_le_bytes)
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    field(data, offset).map(u32::from_le_bytes)
}

fn read_i32(data: &[u8], offset: usize) -> Result<i32> {
    field(data, offset).map(i32::from_le_bytes)
}

fn read_u64(data: &[u8], offset: usize) -> Result<u64> {
    field(data, offset).map(u64::from_le_bytes)
}

fn read_f32(data: &[u8], offset: usize) -> Result<f32> {
    field(data, offset).map(f32::from_le_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsu::encoder::encode_request;

    #[test]
    fn test_decode_version_request() {
        let datagram = encode_request(1, &Request::Version);
        assert_eq!(decode_request(&datagram).unwrap(), Request::Version);
    }

    #[test]
    fn test_decode_ports_request_filters_slots() {
        let mut datagram = encode_request(1, &Request::Ports { slots: vec![] });
        // Rewrite the payload: count 6, slots [0, 1, 2, 3, 7, 9]
        datagram.truncate(DSU_HEADER_SIZE);
        datagram.extend_from_slice(&6i32.to_le_bytes());
        datagram.extend_from_slice(&[0, 1, 2, 3, 7, 9]);

        let request = decode_request(&datagram).unwrap();
        assert_eq!(request, Request::Ports { slots: vec![0, 1, 2, 3] });
    }

    #[test]
    fn test_decode_ports_request_ignores_out_of_range_entries() {
        let datagram = encode_request(1, &Request::Ports { slots: vec![9, 1, 4] });
        assert_eq!(decode_request(&datagram).unwrap(), Request::Ports { slots: vec![1] });
    }

    #[test]
    fn test_decode_ports_request_negative_count() {
        let mut datagram = encode_request(1, &Request::Ports { slots: vec![] });
        datagram.truncate(DSU_HEADER_SIZE);
        datagram.extend_from_slice(&(-3i32).to_le_bytes());

        assert_eq!(decode_request(&datagram).unwrap(), Request::Ports { slots: vec![] });
    }

    #[test]
    fn test_decode_ports_request_truncated() {
        let mut datagram = encode_request(1, &Request::Ports { slots: vec![] });
        datagram.truncate(DSU_HEADER_SIZE);
        datagram.extend_from_slice(&3i32.to_le_bytes());
        datagram.push(0); // only one of three slots present

        assert!(decode_request(&datagram).is_err());

        // Missing count entirely
        datagram.truncate(DSU_HEADER_SIZE + 2);
        assert!(decode_request(&datagram).is_err());
    }

    #[test]
    fn test_decode_data_request_fields() {
        let request = Request::Data {
            flags: DATA_FLAG_SLOT,
            slot: 2,
            mac: [1, 2, 3, 4, 5, 6],
        };
        let datagram = encode_request(1, &request);
        assert_eq!(decode_request(&datagram).unwrap(), request);
    }

    #[test]
    fn test_decode_data_request_without_payload() {
        let mut datagram = encode_request(1, &Request::Data { flags: 0, slot: 0, mac: [0; 6] });
        datagram.truncate(DSU_HEADER_SIZE);

        assert_eq!(
            decode_request(&datagram).unwrap(),
            Request::Data { flags: 0, slot: 0, mac: [0; 6] }
        );
    }

    #[test]
    fn test_decode_unknown_type() {
        let mut datagram = encode_request(1, &Request::Version);
        datagram[16..20].copy_from_slice(&0x0012_3456u32.to_le_bytes());

        assert_eq!(decode_request(&datagram).unwrap(), Request::Unknown(0x0012_3456));
    }

    #[test]
    fn test_reject_short_datagram() {
        assert!(decode_request(&[0x44, 0x53, 0x55, 0x43, 0x00]).is_err());
        assert!(decode_request(&[]).is_err());
    }

    #[test]
    fn test_reject_wrong_magic() {
        let mut datagram = encode_request(1, &Request::Version);
        datagram[..4].copy_from_slice(b"DSUS");
        assert!(decode_request(&datagram).is_err());

        let garbage = [0xAAu8; 25];
        assert!(decode_request(&garbage).is_err());
    }

    #[test]
    fn test_verify_checksum_detects_corruption() {
        let mut datagram = encode_request(1, &Request::Version);
        assert!(verify_checksum(&datagram));

        datagram[5] ^= 0xFF;
        assert!(!verify_checksum(&datagram));
        assert!(!verify_checksum(&[0u8; 4]));
    }

    #[test]
    fn test_decode_data_response_rejects_other_packets() {
        let version = crate::dsu::encoder::encode_version_response(1);
        assert!(decode_data_response(&version).is_err());
    }
}
