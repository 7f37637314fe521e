//! Reply correlation

use crate::probe::packet::{EchoReply, EchoRequest, ICMP_ECHO_REPLY};

/// Outcome of comparing one inbound datagram against the outstanding request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyVerdict {
    /// Echo reply carrying our identifier, sequence and payload
    Match,
    /// A parseable ICMP message that is not our reply
    Unrelated(EchoReply),
    /// Fewer than 8 bytes; nothing to correlate
    Truncated { len: usize },
}

impl ReplyVerdict {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

/// Classifies a raw ICMP datagram (IP header already stripped).
pub fn classify(raw: &[u8], expected: &EchoRequest) -> ReplyVerdict {
    let Some(reply) = EchoReply::parse(raw) else {
        return ReplyVerdict::Truncated { len: raw.len() };
    };

    if reply.icmp_type == ICMP_ECHO_REPLY
        && reply.code == 0
        && reply.identifier == expected.identifier()
        && reply.sequence == expected.sequence()
        && reply.payload == expected.payload()
    {
        ReplyVerdict::Match
    } else {
        ReplyVerdict::Unrelated(reply)
    }
}
