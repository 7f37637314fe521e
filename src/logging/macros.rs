//! Logging macros shared by the prober and the binary
//!
//! Thin wrappers over `tracing` so call sites read the same whether the
//! subscriber is installed or not.

/// Progress worth keeping in the log file (`info`)
#[macro_export]
macro_rules! log_stderr {
    ($($arg:tt)*) => {
        tracing::info!($($arg)*)
    };
}

/// Per-attempt detail such as timeouts and ignored sources (`debug`)
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

/// Recoverable failures inside the probe loop (`warn`)
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        tracing::warn!($($arg)*)
    };
}

/// Fatal failures right before the process exits (`error`)
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        tracing::error!($($arg)*)
    };
}
