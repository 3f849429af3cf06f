//! `nebula-cert` process adapter.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{duration_arg, CaParams, SignParams, Signer, SignerError};
use crate::config::SignerConfig;

/// Tool output fragments meaning "the node cert would outlive the CA".
const VALIDITY_EXCEEDED_MARKERS: &[&str] = &[
    "root certificate constraints",
    "certificate expires after",
];

/// Runs the `nebula-cert` executable with an enforced timeout.
#[derive(Debug, Clone)]
pub struct NebulaCertSigner {
    binary: PathBuf,
    timeout: Duration,
}

impl NebulaCertSigner {
    /// Create an adapter for the given executable.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Create an adapter from configuration.
    #[must_use]
    pub fn from_config(config: &SignerConfig) -> Self {
        Self::new(config.binary.clone(), config.timeout())
    }

    async fn run(&self, subcommand: &str, args: Vec<OsString>) -> Result<(), SignerError> {
        debug!(binary = %self.binary.display(), subcommand, "invoking signer");

        let mut cmd = Command::new(&self.binary);
        cmd.arg(subcommand)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                warn!(subcommand, timeout = ?self.timeout, "signer timed out");
                SignerError::TimedOut(self.timeout)
            })?
            .map_err(SignerError::Spawn)?;

        if output.status.success() {
            return Ok(());
        }

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        let text = text.trim();

        let diagnostic = if text.is_empty() {
            format!("nebula-cert {subcommand} failed: {}", output.status)
        } else {
            format!("nebula-cert {subcommand} failed: {text}")
        };
        Err(classify_failure(diagnostic))
    }
}

/// Turn tool output into a structured outcome.
fn classify_failure(diagnostic: String) -> SignerError {
    if VALIDITY_EXCEEDED_MARKERS
        .iter()
        .any(|marker| diagnostic.contains(marker))
    {
        SignerError::ValidityExceedsCa(diagnostic)
    } else {
        SignerError::Failed(diagnostic)
    }
}

#[async_trait]
impl Signer for NebulaCertSigner {
    async fn create_ca(&self, params: &CaParams<'_>) -> Result<(), SignerError> {
        let args: Vec<OsString> = vec![
            "-name".into(),
            params.name.into(),
            "-duration".into(),
            duration_arg(params.duration).into(),
            "-out-crt".into(),
            params.out.cert.clone().into(),
            "-out-key".into(),
            params.out.key.clone().into(),
        ];
        self.run("ca", args).await
    }

    async fn sign(&self, params: &SignParams<'_>) -> Result<(), SignerError> {
        let mut args: Vec<OsString> = vec![
            "-ca-crt".into(),
            params.ca_cert.into(),
            "-ca-key".into(),
            params.ca_key.into(),
            "-name".into(),
            params.name.into(),
            "-ip".into(),
            params.ip_cidr.into(),
            "-out-crt".into(),
            params.out.cert.clone().into(),
            "-out-key".into(),
            params.out.key.clone().into(),
        ];
        if let Some(duration) = params.duration {
            args.push("-duration".into());
            args.push(duration_arg(duration).into());
        }
        self.run("sign", args).await
    }
}
