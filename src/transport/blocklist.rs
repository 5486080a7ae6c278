//! Reserved address ranges that outbound delivery must never reach.

use crate::error::{DispatchError, Result};
use ipnetwork::IpNetwork;
use std::net::IpAddr;
use tracing::warn;

/// Loopback, link-local, carrier-grade NAT, documentation, benchmarking,
/// multicast and reserved IPv4 ranges, plus their IPv6 counterparts.
pub const DEFAULT_BLOCKED_RANGES: &[&str] = &[
    "127.0.0.0/8",
    "169.254.0.0/16",
    "0.0.0.0/8",
    "100.64.0.0/10",
    "192.0.0.0/24",
    "192.0.2.0/24",
    "198.18.0.0/15",
    "192.88.99.0/24",
    "198.51.100.0/24",
    "203.0.113.0/24",
    "224.0.0.0/4",
    "240.0.0.0/4",
    "::1/128",
    "fe80::/10",
    "fc00::/7",
];

pub fn default_blocked_ranges() -> Vec<IpNetwork> {
    DEFAULT_BLOCKED_RANGES
        .iter()
        .filter_map(|cidr| cidr.parse().ok())
        .collect()
}

/// A set of CIDR ranges checked against every resolved destination address.
#[derive(Debug, Clone)]
pub struct IpBlocklist {
    ranges: Vec<IpNetwork>,
}

impl IpBlocklist {
    pub fn new(ranges: Vec<IpNetwork>) -> Self {
        Self { ranges }
    }

    /// A blocklist that allows everything.
    pub fn empty() -> Self {
        Self { ranges: Vec::new() }
    }

    pub fn ranges(&self) -> &[IpNetwork] {
        &self.ranges
    }

    /// IPv4-mapped IPv6 addresses are checked as their IPv4 form.
    pub fn contains(&self, ip: IpAddr) -> bool {
        let ip = canonical(ip);
        self.ranges.iter().any(|range| range.contains(ip))
    }

    /// Fails with [`DispatchError::SsrfBlocked`] if `ip` is in a blocked range.
    pub fn check(&self, host: &str, ip: IpAddr) -> Result<()> {
        if self.contains(ip) {
            warn!(host, %ip, "Refusing to deliver to a blocked address");
            metrics::counter!("dispatch_ssrf_blocked_total").increment(1);
            return Err(DispatchError::SsrfBlocked {
                host: host.to_string(),
                ip,
            });
        }
        Ok(())
    }
}

impl Default for IpBlocklist {
    fn default() -> Self {
        Self::new(default_blocked_ranges())
    }
}

fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        IpAddr::V4(_) => ip,
    }
}
