//! Configuration constants and env-driven settings for the ICMP prober

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long to wait for a reply before resending the request
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause after an unrelated reply or a receive error
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Fixed capacity of the inbound datagram buffer; larger datagrams are truncated
pub const RECV_BUFFER_CAPACITY: usize = 1500;

/// Largest IPv4 header the kernel may prepend on a raw read (IHL = 15 words)
pub const MAX_IPV4_HEADER_LEN: usize = 60;

/// ICMP echo header: type, code, checksum, identifier, sequence
pub const ICMP_HEADER_LEN: usize = 8;

/// Payload carried by every echo request
pub const ECHO_PAYLOAD: &[u8] = b"Hello, world!";

const MIN_REPLY_TIMEOUT_MS: u64 = 100;
const MAX_REPLY_TIMEOUT_MS: u64 = 60_000;
const MAX_RETRY_DELAY_MS: u64 = 600_000;

/// Whether the checksum field of outbound requests is computed or left at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumMode {
    /// RFC 1071 one's-complement sum over the whole ICMP message
    Computed,
    /// Always zero. Most stacks drop such requests.
    Zero,
}

impl ChecksumMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "computed" | "compute" | "on" => Some(Self::Computed),
            "zero" | "off" | "none" => Some(Self::Zero),
            _ => None,
        }
    }
}

/// Sequence number assignment across retransmissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencePolicy {
    /// Every retransmission is byte-identical (sequence 0)
    Fixed,
    /// Sequence follows the attempt index; replies must echo the latest one
    Increment,
}

impl SequencePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "fixed" => Some(Self::Fixed),
            "increment" | "incrementing" => Some(Self::Increment),
            _ => None,
        }
    }
}

/// Runtime probe settings (env-driven).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSettings {
    pub reply_timeout_ms: u64,
    pub retry_delay_ms: u64,
    pub checksum: ChecksumMode,
    pub sequence: SequencePolicy,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            reply_timeout_ms: REPLY_TIMEOUT.as_millis() as u64,
            retry_delay_ms: RETRY_DELAY.as_millis() as u64,
            checksum: ChecksumMode::Computed,
            sequence: SequencePolicy::Fixed,
        }
    }
}

impl ProbeSettings {
    /// Reads overrides from the environment:
    ///
    /// - `ICMP_PING_TIMEOUT_MS` (100..=60000)
    /// - `ICMP_PING_RETRY_DELAY_MS` (0..=600000)
    /// - `ICMP_PING_CHECKSUM` (`computed` | `zero`)
    /// - `ICMP_PING_SEQUENCE` (`fixed` | `increment`)
    ///
    /// Unset or unparseable values keep the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            reply_timeout_ms: parse_u64_clamped(
                var("ICMP_PING_TIMEOUT_MS"),
                defaults.reply_timeout_ms,
                MIN_REPLY_TIMEOUT_MS,
                MAX_REPLY_TIMEOUT_MS,
            ),
            retry_delay_ms: parse_u64_clamped(
                var("ICMP_PING_RETRY_DELAY_MS"),
                defaults.retry_delay_ms,
                0,
                MAX_RETRY_DELAY_MS,
            ),
            checksum: var("ICMP_PING_CHECKSUM")
                .and_then(|v| ChecksumMode::parse(&v))
                .unwrap_or(defaults.checksum),
            sequence: var("ICMP_PING_SEQUENCE")
                .and_then(|v| SequencePolicy::parse(&v))
                .unwrap_or(defaults.sequence),
        }
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn parse_u64_clamped(raw: Option<String>, default: u64, min: u64, max: u64) -> u64 {
    match raw.and_then(|v| v.parse::<u64>().ok()) {
        Some(v) => v.clamp(min, max),
        None => default,
    }
}
