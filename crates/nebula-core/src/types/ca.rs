use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single trust root used to sign every node certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateAuthority {
    /// Store-assigned identifier
    #[serde(default)]
    pub id: u64,

    /// Common name of the CA
    pub name: String,

    /// Free-text description
    #[serde(default)]
    pub description: String,

    /// CA certificate material
    pub certificate_pem: String,

    /// CA private key material
    pub private_key_pem: String,

    /// When the CA was generated
    pub created_at: DateTime<Utc>,
}

impl CertificateAuthority {
    /// Public summary without key material
    #[must_use]
    pub fn summary(&self) -> CaSummary {
        CaSummary {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            created_at: self.created_at,
        }
    }
}

/// Outward view of the CA. Never carries the private key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaSummary {
    /// Store-assigned identifier
    pub id: u64,
    /// Common name of the CA
    pub name: String,
    /// Free-text description
    pub description: String,
    /// When the CA was generated
    pub created_at: DateTime<Utc>,
}

/// Input for generating (or replacing) the CA
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCaRequest {
    /// Common name of the CA
    pub name: String,

    /// Free-text description
    #[serde(default)]
    pub description: String,

    /// Validity in days (values <= 0 fall back to 365)
    #[serde(default)]
    pub validity_days: i64,
}
