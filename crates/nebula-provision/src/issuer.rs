//! Certificate issuance through the signing capability.
//!
//! Each call works in a fresh scratch directory that is removed on every
//! exit path when the [`tempfile::TempDir`] guard drops.

use nebula_core::{ProvisionError, Result, MAX_CERTIFICATE_VALIDITY_DAYS};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::signer::{CaParams, OutputPaths, SignParams, Signer};

/// Marker every Nebula certificate carries.
const CERT_MARKER: &str = "NEBULA CERTIFICATE";

/// Marker every Nebula private key carries.
const KEY_MARKER: &str = "NEBULA ";

/// Fallback validity when none (or a non-positive value) is requested.
const DEFAULT_VALIDITY_DAYS: u64 = 365;

const SECS_PER_DAY: u64 = 24 * 3600;

/// Certificate and key produced by the signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    /// Certificate material
    pub certificate_pem: String,
    /// Private key material
    pub private_key_pem: String,
}

/// Issues CA and node certificates by delegating to a [`Signer`].
#[derive(Clone)]
pub struct CertificateIssuer {
    signer: Arc<dyn Signer>,
}

impl CertificateIssuer {
    /// Create an issuer backed by the given signer.
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self { signer }
    }

    /// Request a new self-signed CA.
    pub async fn issue_ca(
        &self,
        common_name: &str,
        validity_days: i64,
    ) -> Result<IssuedCertificate> {
        let dir = scratch_dir("nebula-ca-")?;
        let out = OutputPaths::in_dir(dir.path(), "ca");

        self.signer
            .create_ca(&CaParams {
                name: common_name,
                duration: validity(validity_days),
                out: &out,
            })
            .await
            .map_err(|e| ProvisionError::IssuanceFailed {
                diagnostic: e.to_string(),
            })?;

        info!(name = common_name, "issued certificate authority");
        read_outputs(&out).await
    }

    /// Sign a node certificate for `subnet_cidr` with the given CA.
    ///
    /// When the signer reports that the requested validity would outlive the
    /// CA, the request is retried once without an explicit duration.
    pub async fn issue_node_certificate(
        &self,
        ca_cert: &str,
        ca_key: &str,
        common_name: &str,
        subnet_cidr: &str,
        validity_days: i64,
    ) -> Result<IssuedCertificate> {
        if !ca_cert.contains(CERT_MARKER) {
            return Err(ProvisionError::InvalidCaFormat(
                "CA certificate is not in Nebula format, regenerate the CA".into(),
            ));
        }
        if !ca_key.contains(KEY_MARKER) {
            return Err(ProvisionError::InvalidCaFormat(
                "CA private key is not in Nebula format, regenerate the CA".into(),
            ));
        }

        let ip_cidr = ensure_cidr(subnet_cidr);

        let dir = scratch_dir("nebula-node-")?;
        let ca_cert_path = dir.path().join("ca.crt");
        let ca_key_path = dir.path().join("ca.key");
        write_private(&ca_cert_path, ca_cert).await?;
        write_private(&ca_key_path, ca_key).await?;

        let out = OutputPaths::in_dir(dir.path(), "node");
        let mut params = SignParams {
            ca_cert: &ca_cert_path,
            ca_key: &ca_key_path,
            name: common_name,
            ip_cidr: &ip_cidr,
            duration: Some(validity(validity_days)),
            out: &out,
        };

        let first = self.signer.sign(&params).await;
        match first {
            Ok(()) => {}
            Err(e) if e.is_validity_exceeded() => {
                info!(
                    node = common_name,
                    "requested validity exceeds CA, retrying with tool default"
                );
                params.duration = None;
                self.signer
                    .sign(&params)
                    .await
                    .map_err(|e| ProvisionError::IssuanceFailed {
                        diagnostic: e.to_string(),
                    })?;
            }
            Err(e) => {
                return Err(ProvisionError::IssuanceFailed {
                    diagnostic: e.to_string(),
                })
            }
        }

        debug!(node = common_name, ip = %ip_cidr, "signed node certificate");
        read_outputs(&out).await
    }
}

/// Reject a requested validity longer than [`MAX_CERTIFICATE_VALIDITY_DAYS`].
pub fn check_validity_days(days: i64) -> Result<()> {
    if days > MAX_CERTIFICATE_VALIDITY_DAYS {
        return Err(ProvisionError::Validation(format!(
            "certificate validity must be at most {MAX_CERTIFICATE_VALIDITY_DAYS} days"
        )));
    }
    Ok(())
}

/// Values already stored out of range are capped rather than trusted.
fn validity(days: i64) -> Duration {
    let days = u64::try_from(days.min(MAX_CERTIFICATE_VALIDITY_DAYS))
        .ok()
        .filter(|d| *d > 0)
        .unwrap_or(DEFAULT_VALIDITY_DAYS);
    Duration::from_secs(days.saturating_mul(SECS_PER_DAY))
}

fn ensure_cidr(ip: &str) -> String {
    if ip.contains('/') {
        ip.to_string()
    } else {
        format!("{}/32", ip.trim())
    }
}

fn scratch_dir(prefix: &str) -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .map_err(|e| ProvisionError::filesystem(std::env::temp_dir(), e))
}

async fn write_private(path: &Path, contents: &str) -> Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options
        .open(path)
        .await
        .map_err(|e| ProvisionError::filesystem(path, e))?;
    file.write_all(contents.as_bytes())
        .await
        .map_err(|e| ProvisionError::filesystem(path, e))?;
    file.flush()
        .await
        .map_err(|e| ProvisionError::filesystem(path, e))
}

async fn read_outputs(out: &OutputPaths) -> Result<IssuedCertificate> {
    let certificate_pem = tokio::fs::read_to_string(&out.cert)
        .await
        .map_err(|e| ProvisionError::filesystem(&out.cert, e))?;
    let private_key_pem = tokio::fs::read_to_string(&out.key)
        .await
        .map_err(|e| ProvisionError::filesystem(&out.key, e))?;
    Ok(IssuedCertificate {
        certificate_pem,
        private_key_pem,
    })
}
