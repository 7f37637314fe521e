//! Target resolution
//!
//! IPv4 literals are taken as-is; anything else goes through the platform
//! resolver and the first IPv4 answer wins.

use dns_lookup::lookup_host;
use std::io;
use std::net::{IpAddr, Ipv4Addr};

use crate::error::ProbeError;

/// Resolves `target` to the IPv4 address the probe is sent to.
pub fn resolve(target: &str) -> Result<Ipv4Addr, ProbeError> {
    resolve_with(target, lookup_host)
}

/// Resolution with a pluggable forward lookup.
pub fn resolve_with<F>(target: &str, lookup: F) -> Result<Ipv4Addr, ProbeError>
where
    F: FnOnce(&str) -> io::Result<Vec<IpAddr>>,
{
    let fail = |source: io::Error| ProbeError::Resolution {
        target: target.to_string(),
        source,
    };

    let host = target.trim();
    if host.is_empty() {
        return Err(fail(io::Error::new(
            io::ErrorKind::InvalidInput,
            "empty target",
        )));
    }

    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Ok(ip);
    }

    let addrs = lookup(host).map_err(fail)?;
    first_ipv4(&addrs).ok_or_else(|| {
        fail(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no IPv4 address for {}", host),
        ))
    })
}

fn first_ipv4(addrs: &[IpAddr]) -> Option<Ipv4Addr> {
    addrs.iter().find_map(|addr| match addr {
        IpAddr::V4(v4) => Some(*v4),
        IpAddr::V6(_) => None,
    })
}
