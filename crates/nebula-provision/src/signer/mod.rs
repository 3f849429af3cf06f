//! Signing capability.
//!
//! Certificate material is never produced in-process. A [`Signer`] writes a
//! certificate and key to the paths it is handed; the issuer owns the paths
//! and reads the results back.
//!
//! - [`NebulaCertSigner`]: runs the `nebula-cert` executable
//! - [`FakeSigner`]: in-memory stand-in for tests and offline dry runs

mod fake;
mod nebula_cert;

pub use fake::FakeSigner;
pub use nebula_cert::NebulaCertSigner;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Where the signer must write its two output files.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    /// Certificate output path
    pub cert: PathBuf,
    /// Private key output path
    pub key: PathBuf,
}

impl OutputPaths {
    /// `<dir>/<stem>.crt` and `<dir>/<stem>.key`
    #[must_use]
    pub fn in_dir(dir: &Path, stem: &str) -> Self {
        Self {
            cert: dir.join(format!("{stem}.crt")),
            key: dir.join(format!("{stem}.key")),
        }
    }
}

/// Parameters for a self-signed CA.
#[derive(Debug)]
pub struct CaParams<'a> {
    /// CA common name
    pub name: &'a str,
    /// Requested lifetime
    pub duration: Duration,
    /// Output files
    pub out: &'a OutputPaths,
}

/// Parameters for signing a node certificate.
#[derive(Debug)]
pub struct SignParams<'a> {
    /// CA certificate file
    pub ca_cert: &'a Path,
    /// CA private key file
    pub ca_key: &'a Path,
    /// Node common name
    pub name: &'a str,
    /// Node overlay address in CIDR form
    pub ip_cidr: &'a str,
    /// Requested lifetime; `None` lets the tool pick its default
    pub duration: Option<Duration>,
    /// Output files
    pub out: &'a OutputPaths,
}

/// Structured signer outcomes.
#[derive(Error, Debug)]
pub enum SignerError {
    /// The requested lifetime would outlive the signing CA
    #[error("requested validity exceeds CA constraints: {0}")]
    ValidityExceedsCa(String),

    /// The tool ran and reported a failure
    #[error("{0}")]
    Failed(String),

    /// The tool did not finish within the configured limit
    #[error("signer timed out after {0:?}")]
    TimedOut(Duration),

    /// The tool could not be started
    #[error("failed to launch signer: {0}")]
    Spawn(#[source] std::io::Error),
}

impl SignerError {
    /// Returns true when retrying without an explicit duration may succeed
    #[must_use]
    pub const fn is_validity_exceeded(&self) -> bool {
        matches!(self, Self::ValidityExceedsCa(_))
    }
}

/// External certificate signing capability.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Create a self-signed CA.
    async fn create_ca(&self, params: &CaParams<'_>) -> Result<(), SignerError>;

    /// Sign a node certificate with an existing CA.
    async fn sign(&self, params: &SignParams<'_>) -> Result<(), SignerError>;
}

/// Render a duration in the `<hours>h` form `nebula-cert` accepts.
#[must_use]
pub fn duration_arg(duration: Duration) -> String {
    format!("{}h", duration.as_secs() / 3600)
}
