//! Process configuration for the provisioning pipeline.

use nebula_core::{ProvisionError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for a nebula-manager instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Root directory for generated artifacts (default: `data`).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// JSON record store file (default: `<data_dir>/state.json`).
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    /// Externally reachable base URL of the management API.
    #[serde(default = "default_api_base")]
    pub api_base_url: String,

    /// Static bearer token embedded into install commands and scripts.
    #[serde(default)]
    pub static_token: Option<String>,

    /// Where install scripts download the Nebula binary from.
    #[serde(default)]
    pub download: DownloadConfig,

    /// External signing tool settings.
    #[serde(default)]
    pub signer: SignerConfig,
}

/// Nebula binary download configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Release version to install (default: 1.9.3).
    #[serde(default = "default_nebula_version")]
    pub nebula_version: String,

    /// Release download base URL.
    #[serde(default = "default_download_base")]
    pub base_url: String,

    /// Proxy prefix for nodes without an explicit proxy mode.
    #[serde(default)]
    pub proxy_prefix: String,

    /// Proxy prefix for nodes tagged `ipv4`.
    #[serde(default)]
    pub proxy_prefix_ipv4: String,

    /// Proxy prefix for nodes tagged `ipv6`.
    #[serde(default)]
    pub proxy_prefix_ipv6: String,
}

/// `nebula-cert` invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Executable name or path (default: `nebula-cert`).
    #[serde(default = "default_signer_binary")]
    pub binary: PathBuf,

    /// Hard limit on a single signer invocation (seconds).
    #[serde(default = "default_signer_timeout")]
    pub timeout_secs: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            store_path: None,
            api_base_url: default_api_base(),
            static_token: None,
            download: DownloadConfig::default(),
            signer: SignerConfig::default(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            nebula_version: default_nebula_version(),
            base_url: default_download_base(),
            proxy_prefix: String::new(),
            proxy_prefix_ipv4: String::new(),
            proxy_prefix_ipv6: String::new(),
        }
    }
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            binary: default_signer_binary(),
            timeout_secs: default_signer_timeout(),
        }
    }
}

impl SignerConfig {
    /// Invocation timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ManagerConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| ProvisionError::filesystem(path, e))?;
            toml::from_str(&content).map_err(|e| ProvisionError::Config(e.to_string()))
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `NEBULA_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get("NEBULA_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(base) = get("NEBULA_API_BASE") {
            self.api_base_url = base;
        }
        if let Some(version) = get("NEBULA_BINARY_VERSION") {
            self.download.nebula_version = version;
        }
        if let Some(base) = get("NEBULA_BINARY_BASE") {
            self.download.base_url = base;
        }
        if let Some(prefix) = get("NEBULA_BINARY_PROXY_PREFIX") {
            self.download.proxy_prefix = prefix;
        }
        if let Some(token) = get("NEBULA_STATIC_TOKEN") {
            self.static_token = Some(token);
        }
        if let Some(bin) = get("NEBULA_CERT_BIN") {
            self.signer.binary = PathBuf::from(bin);
        }
    }

    /// Effective record store path.
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("state.json"))
    }

    /// API base URL without a trailing slash.
    #[must_use]
    pub fn api_base(&self) -> &str {
        let trimmed = self.api_base_url.trim_end_matches('/');
        if trimmed.is_empty() {
            DEFAULT_API_BASE
        } else {
            trimmed
        }
    }

    /// Static token, if one is configured and non-empty.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.static_token.as_deref().filter(|t| !t.is_empty())
    }
}

const DEFAULT_API_BASE: &str = "http://localhost:8080";

// Default value functions for serde.
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_api_base() -> String {
    String::from(DEFAULT_API_BASE)
}

fn default_nebula_version() -> String {
    String::from("1.9.3")
}

fn default_download_base() -> String {
    String::from("https://github.com/slackhq/nebula/releases/download")
}

fn default_signer_binary() -> PathBuf {
    PathBuf::from("nebula-cert")
}

const fn default_signer_timeout() -> u64 {
    30
}
