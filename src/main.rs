//! icmp-ping - ping a host until it answers
//!
//! Usage: icmp-ping <target>
//!
//! Exits 0 once a matching echo reply arrives, 1 on a usage, resolution or
//! socket error. Opening the raw socket needs root or `CAP_NET_RAW`.

use icmp_ping::log_error;

fn main() {
    if let Err(e) = icmp_ping::logging::init_logging() {
        eprintln!("[WARN] Failed to initialize structured logging: {}", e);
    }

    if let Err(e) = icmp_ping::run(std::env::args()) {
        log_error!("{}", e);
        std::process::exit(1);
    }
}
