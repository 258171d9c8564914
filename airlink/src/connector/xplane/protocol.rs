//! RREF datagram encoding and decoding.
//!
//! X-Plane's dataref subscription protocol is request/response over UDP.
//! A subscribe request is a fixed 413-byte datagram:
//!
//! ```text
//! bytes 0..4   ASCII "RREF"
//! byte  4      0x00
//! bytes 5..9   frequency in Hz, little-endian u32 (0 unsubscribes)
//! bytes 9..13  subscription index, little-endian u32 (caller-chosen)
//! bytes 13..   dataref path, NUL-padded to 400 bytes
//! ```
//!
//! Responses start with the 5-byte header "RREF" + one byte, followed by any
//! number of 8-byte entries: little-endian u32 index + little-endian IEEE-754
//! f32 value. X-Plane echoes back the index from the subscribe request, which
//! is how [`super::dictionary`] routes values to snapshot fields.

/// Total size of a subscribe/unsubscribe datagram.
pub const SUBSCRIBE_LEN: usize = 413;

/// Size of the response header ("RREF" + 1 byte).
pub const RESPONSE_HEADER_LEN: usize = 5;

/// Size of one index/value entry in a response.
pub const ENTRY_LEN: usize = 8;

/// Receive buffer size for response datagrams.
pub const RECV_BUFFER_LEN: usize = 4096;

const TAG: &[u8; 4] = b"RREF";

/// Encode a subscribe (or, with `freq_hz == 0`, unsubscribe) datagram.
///
/// Dataref paths longer than the 400-byte field are truncated; real paths
/// are far shorter.
pub fn encode_subscribe(index: u32, freq_hz: u32, dataref: &str) -> [u8; SUBSCRIBE_LEN] {
    let mut buf = [0u8; SUBSCRIBE_LEN];
    buf[0..4].copy_from_slice(TAG);
    buf[5..9].copy_from_slice(&freq_hz.to_le_bytes());
    buf[9..13].copy_from_slice(&index.to_le_bytes());
    let path = dataref.as_bytes();
    let len = path.len().min(SUBSCRIBE_LEN - 13);
    buf[13..13 + len].copy_from_slice(&path[..len]);
    buf
}

/// Parse a response datagram into (index, value) entries.
///
/// Returns `None` for datagrams too short to carry the header or with a
/// wrong tag; such datagrams are dropped silently by the listener. A
/// trailing partial entry is ignored.
pub fn parse_response(datagram: &[u8]) -> Option<Vec<(u32, f32)>> {
    if datagram.len() < RESPONSE_HEADER_LEN || &datagram[0..4] != TAG {
        return None;
    }

    let mut entries = Vec::new();
    let mut offset = RESPONSE_HEADER_LEN;
    while offset + ENTRY_LEN <= datagram.len() {
        let index = u32::from_le_bytes(datagram[offset..offset + 4].try_into().unwrap());
        let value = f32::from_le_bytes(datagram[offset + 4..offset + 8].try_into().unwrap());
        entries.push((index, value));
        offset += ENTRY_LEN;
    }
    Some(entries)
}

/// Build a response datagram. Test fixtures use this to play the simulator
/// side of the protocol.
pub fn encode_response(entries: &[(u32, f32)]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(RESPONSE_HEADER_LEN + entries.len() * ENTRY_LEN);
    buf.extend_from_slice(TAG);
    buf.push(0);
    for (index, value) in entries {
        buf.extend_from_slice(&index.to_le_bytes());
        buf.extend_from_slice(&value.to_le_bytes());
    }
    buf
}
