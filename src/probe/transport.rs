//! Raw ICMP transport
//!
//! `IcmpTransport` is the seam between the probe loop and the network.
//! `RawIcmpChannel` implements it over a pnet layer-4 channel; tests plug in
//! scripted fakes.

use pnet::packet::icmp::IcmpPacket;
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::Packet;
use pnet::transport::{
    icmp_packet_iter, transport_channel, TransportChannelType::Layer4, TransportProtocol,
    TransportReceiver, TransportSender,
};
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

use crate::config::{MAX_IPV4_HEADER_LEN, RECV_BUFFER_CAPACITY};
use crate::error::ProbeError;

/// Fixed-capacity copy of one inbound datagram.
///
/// Datagrams longer than [`RECV_BUFFER_CAPACITY`] keep only their first
/// `RECV_BUFFER_CAPACITY` bytes and report `is_truncated() == true`.
#[derive(Clone)]
pub struct ReceiveBuffer {
    bytes: [u8; RECV_BUFFER_CAPACITY],
    len: usize,
    truncated: bool,
}

impl ReceiveBuffer {
    pub const CAPACITY: usize = RECV_BUFFER_CAPACITY;

    pub fn copy_from(datagram: &[u8]) -> Self {
        let len = datagram.len().min(Self::CAPACITY);
        let mut bytes = [0u8; RECV_BUFFER_CAPACITY];
        bytes[..len].copy_from_slice(&datagram[..len]);
        Self {
            bytes,
            len,
            truncated: datagram.len() > Self::CAPACITY,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl fmt::Debug for ReceiveBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiveBuffer")
            .field("len", &self.len)
            .field("truncated", &self.truncated)
            .field("bytes", &self.as_slice())
            .finish()
    }
}

/// Result of waiting for one datagram.
#[derive(Debug)]
pub enum RecvOutcome {
    /// Nothing arrived before the deadline
    TimedOut,
    /// One ICMP datagram, header included
    Received(Box<ReceiveBuffer>),
    /// Socket error other than the deadline expiring
    Failed(io::Error),
}

/// Blocking request/response transport for ICMP messages.
pub trait IcmpTransport {
    /// Sends one serialized ICMP message to the bound destination.
    fn send(&mut self, message: &[u8]) -> io::Result<()>;

    /// Blocks until a datagram arrives or `timeout` elapses.
    fn recv(&mut self, timeout: Duration) -> RecvOutcome;
}

/// IPv4 raw ICMP channel bound to a single destination.
///
/// Only datagrams sourced from the destination are surfaced. The socket is
/// closed when the channel is dropped.
pub struct RawIcmpChannel {
    destination: Ipv4Addr,
    tx: TransportSender,
    rx: TransportReceiver,
}

impl RawIcmpChannel {
    /// Opens the raw channel. Usually requires root or `CAP_NET_RAW`.
    pub fn open(destination: Ipv4Addr) -> Result<Self, ProbeError> {
        let protocol = Layer4(TransportProtocol::Ipv4(IpNextHeaderProtocols::Icmp));
        // The kernel hands back the IP header too; size the read so the ICMP
        // part alone can fill the receive buffer.
        let (tx, rx) = transport_channel(RECV_BUFFER_CAPACITY + MAX_IPV4_HEADER_LEN, protocol)
            .map_err(ProbeError::SocketCreate)?;

        crate::log_debug!("Opened raw ICMP channel to {}", destination);
        Ok(Self {
            destination,
            tx,
            rx,
        })
    }

    pub fn destination(&self) -> Ipv4Addr {
        self.destination
    }
}

impl IcmpTransport for RawIcmpChannel {
    fn send(&mut self, message: &[u8]) -> io::Result<()> {
        let packet = IcmpPacket::new(message).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "ICMP message too short")
        })?;
        self.tx.send_to(packet, IpAddr::V4(self.destination))?;
        Ok(())
    }

    fn recv(&mut self, timeout: Duration) -> RecvOutcome {
        let deadline = Instant::now() + timeout;
        let destination = IpAddr::V4(self.destination);
        let mut iter = icmp_packet_iter(&mut self.rx);

        loop {
            let Some(remaining) = remaining_wait(deadline, Instant::now()) else {
                return RecvOutcome::TimedOut;
            };

            match iter.next_with_timeout(remaining) {
                Ok(Some((packet, source))) => {
                    if source != destination {
                        crate::log_debug!("Ignoring ICMP datagram from {}", source);
                        continue;
                    }
                    return RecvOutcome::Received(Box::new(ReceiveBuffer::copy_from(
                        packet.packet(),
                    )));
                }
                Ok(None) => return RecvOutcome::TimedOut,
                Err(e) if is_timeout(&e) => return RecvOutcome::TimedOut,
                Err(e) => return RecvOutcome::Failed(e),
            }
        }
    }
}

impl Drop for RawIcmpChannel {
    fn drop(&mut self) {
        crate::log_debug!("Closing raw ICMP channel to {}", self.destination);
    }
}

/// Time left before `deadline`, or `None` once under a millisecond.
///
/// The socket poll works in whole milliseconds; a shorter wait would poll
/// with a zero timeout and spin.
fn remaining_wait(deadline: Instant, now: Instant) -> Option<Duration> {
    let remaining = deadline.saturating_duration_since(now);
    if remaining < Duration::from_millis(1) {
        None
    } else {
        Some(remaining)
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}
