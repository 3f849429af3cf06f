use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default overlay subnet handed out when nothing else is configured.
pub const DEFAULT_SUBNET: &str = "10.10.0.0/24";

/// Default Nebula handshake (UDP listen) port.
pub const DEFAULT_HANDSHAKE_PORT: u16 = 4242;

/// Default node certificate validity in days.
pub const DEFAULT_CERTIFICATE_VALIDITY_DAYS: i64 = 365;

/// Longest certificate validity accepted anywhere, in days (100 years).
pub const MAX_CERTIFICATE_VALIDITY_DAYS: i64 = 36_500;

/// Network-wide settings. Exactly one row exists once first read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Default subnet in CIDR notation
    pub default_subnet: String,

    /// Handshake port used when a node does not specify one
    pub handshake_port: u16,

    /// Free-text lighthouse host list
    #[serde(default)]
    pub lighthouse_hosts: String,

    /// Node certificate validity in days
    pub certificate_validity_days: i64,

    /// Free-text description
    #[serde(default)]
    pub description: String,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            default_subnet: DEFAULT_SUBNET.to_string(),
            handshake_port: DEFAULT_HANDSHAKE_PORT,
            lighthouse_hosts: String::new(),
            certificate_validity_days: DEFAULT_CERTIFICATE_VALIDITY_DAYS,
            description: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl NetworkSettings {
    /// Handshake port, falling back to the built-in default when unset
    #[must_use]
    pub const fn effective_port(&self) -> u16 {
        if self.handshake_port == 0 {
            DEFAULT_HANDSHAKE_PORT
        } else {
            self.handshake_port
        }
    }

    /// Certificate validity, falling back to the built-in default when unset
    #[must_use]
    pub const fn effective_validity_days(&self) -> i64 {
        if self.certificate_validity_days > 0 {
            self.certificate_validity_days
        } else {
            DEFAULT_CERTIFICATE_VALIDITY_DAYS
        }
    }
}

/// Partial settings update. Empty or zero fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    /// New default subnet (CIDR)
    #[serde(default)]
    pub default_subnet: Option<String>,

    /// New handshake port
    #[serde(default)]
    pub handshake_port: Option<u16>,

    /// New lighthouse host list
    #[serde(default)]
    pub lighthouse_hosts: Option<String>,

    /// New certificate validity in days
    #[serde(default)]
    pub certificate_validity_days: Option<i64>,

    /// New description
    #[serde(default)]
    pub description: Option<String>,
}
