//! Wire formatting for system announcements and relayed client lines.
//!
//! The relay is framing-agnostic: a relayed message is whatever one read
//! call returned, prefixed verbatim. Formatting never inspects or rewrites
//! the payload bytes.

/// Announcement sent to every other client when a client arrives.
pub fn arrival_message(identity: u64) -> Vec<u8> {
    format!("server: client {identity} just arrived\n").into_bytes()
}

/// Announcement sent to every other client when a client leaves.
pub fn departure_message(identity: u64) -> Vec<u8> {
    format!("server: client {identity} just left\n").into_bytes()
}

/// One read's worth of raw client bytes, tagged with the sender's identity.
pub fn client_message(identity: u64, raw: &[u8]) -> Vec<u8> {
    let mut msg = format!("client {identity}: ").into_bytes();
    msg.extend_from_slice(raw);
    msg
}
