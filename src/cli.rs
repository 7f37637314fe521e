use crate::error::{ProbeError, USAGE_LINE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    Probe { target: String },
    Help,
    Version,
}

pub fn version_text() -> String {
    format!("icmp-ping {}", env!("CARGO_PKG_VERSION"))
}

pub fn usage_text() -> String {
    format!(
        "{version}
Send ICMP echo requests until a matching reply arrives.

{usage}

Arguments:
  <target>       Hostname or IPv4 address

Options:
  -h, --help     Show this help text
  -V, --version  Show version

Environment:
  ICMP_PING_TIMEOUT_MS      Reply window per attempt (default: 1000)
  ICMP_PING_RETRY_DELAY_MS  Pause after an unrelated reply or receive error (default: 5000)
  ICMP_PING_CHECKSUM        computed | zero (default: computed)
  ICMP_PING_SEQUENCE        fixed | increment (default: fixed)
  RUST_LOG                  Log level for stderr and the log file (default: info)",
        version = version_text(),
        usage = USAGE_LINE,
    )
}

/// Parses `<program> <target>`. Anything other than exactly one target, or
/// a help/version flag, is a usage error.
pub fn parse_cli_args<I, S>(args: I) -> Result<AppCommand, ProbeError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut iter = args.into_iter();
    let _program_name = iter.next();

    let mut positional: Vec<String> = Vec::new();

    for arg in iter {
        let arg = arg.as_ref();
        match arg {
            "-h" | "--help" => return Ok(AppCommand::Help),
            "-V" | "--version" => return Ok(AppCommand::Version),
            _ if arg.starts_with('-') => return Err(ProbeError::Usage),
            _ => positional.push(arg.to_string()),
        }
    }

    match positional.len() {
        1 => Ok(AppCommand::Probe {
            target: positional.remove(0),
        }),
        _ => Err(ProbeError::Usage),
    }
}
