//! ICMP echo probing - packet layout, reply correlation, transport, retry loop

mod classify;
mod packet;
mod prober;
mod transport;

pub use classify::{classify, ReplyVerdict};
pub use packet::{
    build_request, internet_checksum, EchoReply, EchoRequest, ICMP_ECHO_REPLY, ICMP_ECHO_REQUEST,
};
pub use prober::{Pause, ProbeSession, ProbeStats, Prober, ThreadSleep};
pub use transport::{IcmpTransport, RawIcmpChannel, ReceiveBuffer, RecvOutcome};
