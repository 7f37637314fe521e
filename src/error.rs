//! Error taxonomy for the prober
//!
//! Fatal variants end the process with status 1; `Send` and `Receive` are
//! reported by the probe loop and never escape it.

use std::fmt;
use std::io;

/// Usage line printed on a bad command line
pub const USAGE_LINE: &str = "Usage: icmp-ping <target>";

#[derive(Debug)]
pub enum ProbeError {
    /// Wrong argument count or an unknown flag
    Usage,
    /// Target name could not be turned into an IPv4 address
    Resolution { target: String, source: io::Error },
    /// Raw ICMP channel could not be opened (usually missing privilege)
    SocketCreate(io::Error),
    /// Writing the request failed
    Send(io::Error),
    /// Reading failed for a reason other than the deadline
    Receive(io::Error),
}

impl ProbeError {
    /// Whether this error terminates the process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Usage | Self::Resolution { .. } | Self::SocketCreate(_)
        )
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage => write!(f, "{}", USAGE_LINE),
            Self::Resolution { source, .. } => write!(f, "Error resolving target: {}", source),
            Self::SocketCreate(e) => write!(f, "Error creating connection: {}", e),
            Self::Send(e) => write!(f, "Error sending ICMP packet: {}", e),
            Self::Receive(e) => write!(f, "Error receiving ICMP packet: {}", e),
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Usage => None,
            Self::Resolution { source, .. } => Some(source),
            Self::SocketCreate(e) | Self::Send(e) | Self::Receive(e) => Some(e),
        }
    }
}
