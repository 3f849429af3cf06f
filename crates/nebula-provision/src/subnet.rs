//! Subnet input normalization.
//!
//! Node addresses arrive as free text, with or without a `/mask` suffix.
//! Everything stored downstream carries an explicit mask valid for the
//! address family.

use nebula_core::{NetworkSettings, ProvisionError, Result};
use std::net::IpAddr;

/// A normalized node subnet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subnet {
    /// `host/mask`
    pub cidr: String,
    /// Tunnel address without mask
    pub host: String,
}

/// Normalize raw subnet input into a `host/mask` pair.
///
/// When no mask is given the prefix length of the settings' default subnet
/// is used, falling back to 24 (IPv4) or 64 (IPv6).
pub fn normalize(raw: &str, settings: Option<&NetworkSettings>) -> Result<Subnet> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ProvisionError::InvalidSubnet("subnet ip required".into()));
    }

    let (host, mask) = match trimmed.split_once('/') {
        Some((host, mask)) => (host.trim(), Some(mask.trim())),
        None => (trimmed, None),
    };

    let ip: IpAddr = host
        .parse()
        .map_err(|_| ProvisionError::InvalidSubnet(format!("invalid subnet ip: {host}")))?;

    let mask = match mask.filter(|m| !m.is_empty()) {
        Some(m) => m
            .parse::<u8>()
            .map_err(|_| ProvisionError::InvalidSubnet(format!("invalid subnet mask: {m}")))?,
        None => default_mask(&ip, settings),
    };

    if mask > max_prefix(&ip) {
        return Err(ProvisionError::InvalidSubnet(format!(
            "invalid subnet mask: {mask}"
        )));
    }

    Ok(Subnet {
        cidr: format!("{host}/{mask}"),
        host: host.to_string(),
    })
}

/// Parse a CIDR string into its network address and prefix length.
pub fn parse_cidr(cidr: &str) -> Option<(IpAddr, u8)> {
    let (addr, prefix) = cidr.trim().split_once('/')?;
    let addr: IpAddr = addr.trim().parse().ok()?;
    let prefix: u8 = prefix.trim().parse().ok()?;
    (prefix <= max_prefix(&addr)).then_some((addr, prefix))
}

const fn max_prefix(ip: &IpAddr) -> u8 {
    match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn default_mask(ip: &IpAddr, settings: Option<&NetworkSettings>) -> u8 {
    let from_settings = settings
        .and_then(|s| parse_cidr(&s.default_subnet))
        .map(|(_, prefix)| prefix)
        .filter(|prefix| *prefix > 0);

    from_settings.unwrap_or(match ip {
        IpAddr::V4(_) => 24,
        IpAddr::V6(_) => 64,
    })
}
