//! icmp-ping - send ICMP echo requests to a host until a matching reply arrives
//!
//! - Echo request construction with optional RFC 1071 checksum
//! - Reply correlation by identifier, sequence and payload
//! - Blocking raw-socket transport with a per-attempt read deadline
//! - Retry loop: immediate resend on timeout, delayed resend on anything else

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod network;
pub mod probe;

pub use app::{
    execute_command_with_context, probe_target, run, run_with_context, AppContext, AppEvent,
    EventHook, OutputHook,
};
pub use cli::{parse_cli_args, usage_text, version_text, AppCommand};
pub use config::*;
pub use error::{ProbeError, USAGE_LINE};
pub use network::{resolve, resolve_with};
pub use probe::{
    build_request, classify, EchoReply, EchoRequest, IcmpTransport, Pause, ProbeSession,
    ProbeStats, Prober, RawIcmpChannel, ReceiveBuffer, RecvOutcome, ReplyVerdict, ThreadSleep,
};
