//! ICMP echo request/reply wire layout
//!
//! ```text
//!  0      1      2      3      4      5      6      7
//! +------+------+------+------+------+------+------+------+---------
//! | type | code |  checksum   | identifier  |  sequence   | payload
//! +------+------+------+------+------+------+------+------+---------
//! ```
//!
//! Multi-byte fields are big-endian. The checksum is never validated on
//! receive.

use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::Packet;

use crate::config::{ChecksumMode, ICMP_HEADER_LEN};

/// ICMP type for an echo request
pub const ICMP_ECHO_REQUEST: u8 = 8;

/// ICMP type for an echo reply
pub const ICMP_ECHO_REPLY: u8 = 0;

/// Outbound echo request. Fields are fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoRequest {
    identifier: u16,
    sequence: u16,
    checksum: u16,
    checksum_mode: ChecksumMode,
    payload: Vec<u8>,
}

/// Builds the echo request for this process.
///
/// The identifier is the low 16 bits of `process_id`; the sequence starts at 0.
pub fn build_request(process_id: u32, payload: &[u8], checksum_mode: ChecksumMode) -> EchoRequest {
    EchoRequest::new((process_id & 0xFFFF) as u16, 0, payload, checksum_mode)
}

impl EchoRequest {
    pub fn new(identifier: u16, sequence: u16, payload: &[u8], checksum_mode: ChecksumMode) -> Self {
        let mut request = Self {
            identifier,
            sequence,
            checksum: 0,
            checksum_mode,
            payload: payload.to_vec(),
        };
        if checksum_mode == ChecksumMode::Computed {
            request.checksum = internet_checksum(&request.to_bytes());
        }
        request
    }

    /// Same request with another sequence number (checksum recomputed per mode).
    pub fn with_sequence(&self, sequence: u16) -> Self {
        Self::new(self.identifier, sequence, &self.payload, self.checksum_mode)
    }

    pub fn icmp_type(&self) -> u8 {
        ICMP_ECHO_REQUEST
    }

    pub fn code(&self) -> u8 {
        0
    }

    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Serializes header and payload as they go on the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ICMP_HEADER_LEN + self.payload.len());
        buf.push(ICMP_ECHO_REQUEST);
        buf.push(0);
        buf.extend_from_slice(&self.checksum.to_be_bytes());
        buf.extend_from_slice(&self.identifier.to_be_bytes());
        buf.extend_from_slice(&self.sequence.to_be_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }
}

/// RFC 1071 checksum over an ICMP message, skipping the checksum word.
pub fn internet_checksum(message: &[u8]) -> u16 {
    pnet::util::checksum(message, 1)
}

/// Fields parsed out of an inbound ICMP datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoReply {
    pub icmp_type: u8,
    pub code: u8,
    pub identifier: u16,
    pub sequence: u16,
    pub payload: Vec<u8>,
}

impl EchoReply {
    /// Parses the 8-byte header and trailing payload.
    ///
    /// Any ICMP type is accepted; the caller decides whether it is a reply.
    /// Returns `None` when fewer than 8 bytes are present.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let packet = EchoReplyPacket::new(raw)?;
        Some(Self {
            icmp_type: packet.get_icmp_type().0,
            code: packet.get_icmp_code().0,
            identifier: packet.get_identifier(),
            sequence: packet.get_sequence_number(),
            payload: packet.payload().to_vec(),
        })
    }

    /// Payload as a double-quoted literal; non-printable bytes become
    /// `\xNN` and `"` / `\\` are backslash-escaped.
    pub fn payload_quoted(&self) -> String {
        let mut out = String::with_capacity(self.payload.len() + 2);
        out.push('"');
        for &byte in &self.payload {
            match byte {
                b'\'' => out.push('\''),
                b'\x07' => out.push_str("\\a"),
                b'\x08' => out.push_str("\\b"),
                b'\x0c' => out.push_str("\\f"),
                b'\x0b' => out.push_str("\\v"),
                _ => out.extend(byte.escape_ascii().map(char::from)),
            }
        }
        out.push('"');
        out
    }
}
