use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::cli::{parse_cli_args, usage_text, version_text, AppCommand};
use crate::config::{ProbeSettings, ECHO_PAYLOAD};
use crate::error::ProbeError;
use crate::network::resolve;
use crate::probe::{
    build_request, IcmpTransport, Pause, ProbeSession, ProbeStats, Prober, RawIcmpChannel,
    ThreadSleep,
};

pub type OutputHook = Arc<dyn Fn(&str) + Send + Sync>;
pub type EventHook = Arc<dyn Fn(&AppEvent) + Send + Sync>;

/// Where progress lines and events go, plus the probe settings.
#[derive(Clone)]
pub struct AppContext {
    probe_settings: ProbeSettings,
    output_hook: OutputHook,
    event_hook: EventHook,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AppEvent {
    Resolved {
        target: String,
        address: Ipv4Addr,
    },
    AttemptTimedOut {
        attempt: u32,
    },
    SendFailed {
        attempt: u32,
        message: String,
    },
    ReceiveFailed {
        attempt: u32,
        message: String,
    },
    UnrelatedReply {
        attempt: u32,
        icmp_type: u8,
        code: u8,
        identifier: u16,
        sequence: u16,
    },
    MalformedReply {
        attempt: u32,
        len: usize,
    },
    Matched {
        attempts: u32,
    },
}

impl Default for AppContext {
    fn default() -> Self {
        Self {
            probe_settings: ProbeSettings::default(),
            output_hook: Arc::new(|line: &str| println!("{}", line)),
            event_hook: Arc::new(log_event),
        }
    }
}

impl AppContext {
    pub fn from_env() -> Self {
        Self::default().with_probe_settings(ProbeSettings::from_env())
    }

    pub fn with_probe_settings(mut self, probe_settings: ProbeSettings) -> Self {
        self.probe_settings = probe_settings;
        self
    }

    pub fn with_output_hook(mut self, output_hook: OutputHook) -> Self {
        self.output_hook = output_hook;
        self
    }

    pub fn with_event_hook(mut self, event_hook: EventHook) -> Self {
        self.event_hook = event_hook;
        self
    }

    pub fn probe_settings(&self) -> &ProbeSettings {
        &self.probe_settings
    }

    pub fn emit_line(&self, line: &str) {
        (self.output_hook)(line);
    }

    pub fn emit_event(&self, event: AppEvent) {
        (self.event_hook)(&event);
    }
}

fn log_event(event: &AppEvent) {
    match serde_json::to_string(event) {
        Ok(json) => {
            crate::log_debug!(event = %json, "probe event");
        }
        Err(e) => {
            crate::log_warn!("Failed to serialize probe event: {}", e);
        }
    }
}

/// Run the app by parsing CLI-style args and dispatching the command.
pub fn run<I, S>(args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let context = AppContext::from_env();
    run_with_context(args, &context)
}

/// Run the app with an explicit context (settings and output hooks).
pub fn run_with_context<I, S>(args: I, context: &AppContext) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let command = match parse_cli_args(args) {
        Ok(command) => command,
        Err(e) => return Err(report_fatal(e, context)),
    };
    execute_command_with_context(command, context)
}

/// Execute a pre-parsed command against the real network.
pub fn execute_command_with_context(command: AppCommand, context: &AppContext) -> Result<()> {
    match command {
        AppCommand::Help => {
            context.emit_line(&usage_text());
            Ok(())
        }
        AppCommand::Version => {
            context.emit_line(&version_text());
            Ok(())
        }
        AppCommand::Probe { target } => {
            probe_target(&target, context, RawIcmpChannel::open, ThreadSleep)?;
            Ok(())
        }
    }
}

/// Resolves `target`, opens a transport with `open_transport`, and probes
/// until a matching reply arrives.
///
/// Fatal errors are printed through the context before being returned.
pub fn probe_target<T, O, P>(
    target: &str,
    context: &AppContext,
    open_transport: O,
    pauser: P,
) -> Result<ProbeStats>
where
    T: IcmpTransport,
    O: FnOnce(Ipv4Addr) -> std::result::Result<T, ProbeError>,
    P: Pause,
{
    let address = resolve(target).map_err(|e| report_fatal(e, context))?;
    crate::log_stderr!("Resolved {} to {}", target, address);
    context.emit_event(AppEvent::Resolved {
        target: target.to_string(),
        address,
    });

    let transport = open_transport(address).map_err(|e| report_fatal(e, context))?;
    let settings = context.probe_settings().clone();
    let request = build_request(std::process::id(), ECHO_PAYLOAD, settings.checksum);
    let mut session = ProbeSession::with_transport(target, address, request, transport);

    let stats = Prober::with_pause(settings, pauser).run(&mut session, context);
    crate::log_stderr!(
        "Probe finished: {} attempt(s), {} timeout(s), {} unrelated",
        stats.attempts,
        stats.timeouts,
        stats.unrelated
    );
    Ok(stats)
}

fn report_fatal(e: ProbeError, context: &AppContext) -> anyhow::Error {
    context.emit_line(&e.to_string());
    anyhow::Error::new(e)
}
