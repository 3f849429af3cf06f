//! In-memory signer.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

use super::{CaParams, SignParams, Signer, SignerError};

/// Signer that fabricates Nebula-framed material without any cryptography.
///
/// Every call produces fresh random content, so two CAs never share key
/// material. A maximum node validity can be set to exercise the
/// validity-exceeded retry path.
#[derive(Debug, Default)]
pub struct FakeSigner {
    max_node_validity: Option<Duration>,
    failure: Option<String>,
    ca_calls: AtomicUsize,
    sign_calls: AtomicUsize,
}

impl FakeSigner {
    /// Signer that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject explicit node durations longer than `max`.
    #[must_use]
    pub const fn with_max_validity(mut self, max: Duration) -> Self {
        self.max_node_validity = Some(max);
        self
    }

    /// Fail every signing request with the given diagnostic.
    #[must_use]
    pub fn failing(mut self, diagnostic: impl Into<String>) -> Self {
        self.failure = Some(diagnostic.into());
        self
    }

    /// Number of `create_ca` invocations so far.
    pub fn ca_calls(&self) -> usize {
        self.ca_calls.load(Ordering::SeqCst)
    }

    /// Number of `sign` invocations so far.
    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }
}

fn pem(label: &str, body: &str) -> String {
    format!("-----BEGIN {label}-----\n{body}\n-----END {label}-----\n")
}

async fn write(path: &Path, contents: String) -> Result<(), SignerError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| SignerError::Failed(format!("write {}: {e}", path.display())))
}

#[async_trait]
impl Signer for FakeSigner {
    async fn create_ca(&self, params: &CaParams<'_>) -> Result<(), SignerError> {
        self.ca_calls.fetch_add(1, Ordering::SeqCst);

        let body = format!(
            "name={} hours={} {}",
            params.name,
            params.duration.as_secs() / 3600,
            Uuid::new_v4().simple()
        );
        let cert = pem("NEBULA CERTIFICATE", &body);
        let key = pem(
            "NEBULA ED25519 PRIVATE KEY",
            &Uuid::new_v4().simple().to_string(),
        );

        write(&params.out.cert, cert).await?;
        write(&params.out.key, key).await
    }

    async fn sign(&self, params: &SignParams<'_>) -> Result<(), SignerError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(diagnostic) = &self.failure {
            return Err(SignerError::Failed(diagnostic.clone()));
        }

        for path in [params.ca_cert, params.ca_key] {
            tokio::fs::metadata(path)
                .await
                .map_err(|e| SignerError::Failed(format!("read {}: {e}", path.display())))?;
        }

        if let (Some(requested), Some(max)) = (params.duration, self.max_node_validity) {
            if requested > max {
                return Err(SignerError::ValidityExceedsCa(
                    "certificate expires after signing certificate".into(),
                ));
            }
        }

        let body = format!(
            "name={} ip={} {}",
            params.name,
            params.ip_cidr,
            Uuid::new_v4().simple()
        );
        let cert = pem("NEBULA CERTIFICATE", &body);
        let key = pem(
            "NEBULA X25519 PRIVATE KEY",
            &Uuid::new_v4().simple().to_string(),
        );

        write(&params.out.cert, cert).await?;
        write(&params.out.key, key).await
    }
}
