use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ProvisionError;

/// Role a node plays in the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Rendezvous point other nodes use to discover peers
    Lighthouse,
    /// Ordinary member
    Standard,
}

impl NodeRole {
    /// Wire representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lighthouse => "lighthouse",
            Self::Standard => "standard",
        }
    }
}

impl FromStr for NodeRole {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lighthouse" => Ok(Self::Lighthouse),
            "standard" => Ok(Self::Standard),
            other => Err(ProvisionError::Validation(format!(
                "unsupported role {other}"
            ))),
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which download proxy the install script should route through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyMode {
    /// IPv4-reachable proxy
    Ipv4,
    /// IPv6-reachable proxy
    Ipv6,
}

impl ProxyMode {
    /// Normalize free-form input. Unrecognized values clear the mode.
    #[must_use]
    pub fn normalize(raw: Option<&str>) -> Option<Self> {
        match raw?.trim().to_ascii_lowercase().as_str() {
            "ipv4" => Some(Self::Ipv4),
            "ipv6" => Some(Self::Ipv6),
            _ => None,
        }
    }

    /// Wire representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ipv4 => "ipv4",
            Self::Ipv6 => "ipv6",
        }
    }
}

impl fmt::Display for ProxyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provisioned overlay node and its most recently generated artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Store-assigned identifier
    #[serde(default)]
    pub id: u64,

    /// Unique node name (also the certificate common name)
    pub name: String,

    /// Node role
    pub role: NodeRole,

    /// Legacy single-field subnet storage (host, possibly with mask)
    #[serde(default)]
    pub subnet_ip: String,

    /// Subnet in `host/mask` form
    #[serde(default)]
    pub subnet_cidr: String,

    /// Tunnel address without mask
    #[serde(default)]
    pub subnet_host: String,

    /// Publicly reachable address, if any
    #[serde(default)]
    pub public_ip: Option<String>,

    /// UDP listen port (0 means "use the network default")
    #[serde(default)]
    pub port: u16,

    /// Free-text tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Download proxy selection for the install script
    #[serde(default)]
    pub proxy_mode: Option<ProxyMode>,

    /// Node certificate material
    #[serde(default)]
    pub certificate_pem: String,

    /// Node private key material
    #[serde(default)]
    pub private_key_pem: String,

    /// Rendered `config.yml`
    #[serde(default)]
    pub config_content: String,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// Returns true for lighthouse nodes
    #[must_use]
    pub fn is_lighthouse(&self) -> bool {
        self.role == NodeRole::Lighthouse
    }

    /// Public IP as a string slice, empty when unset
    #[must_use]
    pub fn public_ip_str(&self) -> &str {
        self.public_ip.as_deref().unwrap_or_default()
    }

    /// File name of the node certificate inside the artifact set
    #[must_use]
    pub fn cert_file_name(&self) -> String {
        format!("{}.crt", self.name)
    }

    /// File name of the node private key inside the artifact set
    #[must_use]
    pub fn key_file_name(&self) -> String {
        format!("{}.key", self.name)
    }
}

/// Payload for provisioning a new node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateNodeRequest {
    /// Unique node name
    pub name: String,

    /// Requested role (`lighthouse` or `standard`)
    pub role: String,

    /// Subnet address, optionally with `/mask`
    pub subnet_ip: String,

    /// Publicly reachable address
    #[serde(default)]
    pub public_ip: Option<String>,

    /// Listen port (defaults to the network handshake port)
    #[serde(default)]
    pub port: Option<u16>,

    /// Free-text tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Download proxy mode (`ipv4`, `ipv6`, anything else clears it)
    #[serde(default)]
    pub proxy_mode: Option<String>,
}

/// Node as presented to API consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeView {
    /// Store-assigned identifier
    pub id: u64,
    /// Node name
    pub name: String,
    /// Node role
    pub role: NodeRole,
    /// Subnet in `host/mask` form
    pub subnet_ip: String,
    /// Tunnel address without mask
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub subnet_host: String,
    /// Publicly reachable address
    pub public_ip: Option<String>,
    /// UDP listen port
    pub port: u16,
    /// Free-text tags
    pub tags: Vec<String>,
    /// Download proxy mode
    pub proxy_mode: Option<ProxyMode>,
    /// One-line bootstrap command for the remote host
    pub install_command: String,
    /// Creation time (RFC 3339)
    pub created_at: String,
}

/// The four files a node needs, as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeArtifacts {
    /// Node certificate
    pub certificate: String,
    /// Node private key
    pub private_key: String,
    /// CA certificate
    pub ca_cert: String,
    /// Rendered configuration
    pub config: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("lighthouse".parse::<NodeRole>().unwrap(), NodeRole::Lighthouse);
        assert_eq!("standard".parse::<NodeRole>().unwrap(), NodeRole::Standard);
        let err = "relay".parse::<NodeRole>().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_proxy_mode_normalization() {
        assert_eq!(ProxyMode::normalize(Some(" IPv4 ")), Some(ProxyMode::Ipv4));
        assert_eq!(ProxyMode::normalize(Some("ipv6")), Some(ProxyMode::Ipv6));
        assert_eq!(ProxyMode::normalize(Some("socks5")), None);
        assert_eq!(ProxyMode::normalize(Some("")), None);
        assert_eq!(ProxyMode::normalize(None), None);
    }

    #[test]
    fn test_role_serde_lowercase() {
        let json = serde_json::to_string(&NodeRole::Lighthouse).unwrap();
        assert_eq!(json, "\"lighthouse\"");
    }
}
