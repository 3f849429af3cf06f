//! Certificate authority lifecycle.
//!
//! At most one authority exists. Generating a new one replaces the old one
//! in a single store operation, which invalidates every node certificate
//! signed by the previous root until the nodes are refreshed.

use chrono::Utc;
use nebula_core::{CertificateAuthority, CreateCaRequest, ProvisionError, Result};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::issuer::{self, CertificateIssuer};
use crate::store::Store;

/// Owns the singleton CA record.
#[derive(Clone)]
pub struct CaManager {
    store: Arc<dyn Store>,
    issuer: CertificateIssuer,
}

impl CaManager {
    /// Create a manager over the given store and issuer.
    pub fn new(store: Arc<dyn Store>, issuer: CertificateIssuer) -> Self {
        Self { store, issuer }
    }

    /// The current authority, if one has been generated.
    pub async fn get(&self) -> Result<Option<CertificateAuthority>> {
        self.store.get_ca().await
    }

    /// The current CA certificate. Key material is never returned here.
    pub async fn certificate(&self) -> Result<String> {
        self.store
            .get_ca()
            .await?
            .map(|ca| ca.certificate_pem)
            .ok_or_else(|| ProvisionError::not_found("certificate authority"))
    }

    /// Issue a fresh self-signed root and replace whatever was stored.
    ///
    /// If issuance or the store write fails, the previous authority is left
    /// in place.
    #[instrument(skip(self, req), fields(name = %req.name))]
    pub async fn generate_or_replace(&self, req: CreateCaRequest) -> Result<CertificateAuthority> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(ProvisionError::Validation("name is required".into()));
        }
        issuer::check_validity_days(req.validity_days)?;

        let issued = self.issuer.issue_ca(name, req.validity_days).await?;

        let ca = self
            .store
            .replace_ca(CertificateAuthority {
                id: 0,
                name: name.to_string(),
                description: req.description,
                certificate_pem: issued.certificate_pem,
                private_key_pem: issued.private_key_pem,
                created_at: Utc::now(),
            })
            .await?;

        info!(id = ca.id, "certificate authority replaced");
        Ok(ca)
    }
}
