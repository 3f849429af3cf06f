//! Bootstrap command and install script for remote hosts.
//!
//! The script downloads the Nebula release for the host architecture,
//! fetches the node bundle from the management API with a bearer token,
//! installs the files under `/etc/nebula`, and enables a systemd unit.

use nebula_core::{Node, ProxyMode};
use std::fmt::Write as _;

use crate::config::{DownloadConfig, ManagerConfig};

/// Placeholder the shell resolves at install time when no token is embedded.
pub const TOKEN_PLACEHOLDER: &str = "${NEBULA_ACCESS_TOKEN:?missing NEBULA_ACCESS_TOKEN}";

const DEFAULT_DOWNLOAD_BASE: &str = "https://github.com/slackhq/nebula/releases/download";
const DEFAULT_NEBULA_VERSION: &str = "1.9.3";

const SYSTEMD_UNIT: &str = "\
[Unit]
Description=Nebula overlay node
After=network-online.target
Wants=network-online.target

[Service]
ExecStart=/usr/local/bin/nebula -config /etc/nebula/config.yml
Restart=on-failure
RestartSec=5
User=root
WorkingDirectory=/etc/nebula
LimitNOFILE=65535

[Install]
WantedBy=multi-user.target
";

/// Renders install commands and scripts for nodes.
#[derive(Debug, Clone)]
pub struct InstallScriptGenerator {
    api_base: String,
    token: Option<String>,
    download: DownloadConfig,
}

impl InstallScriptGenerator {
    /// Build a generator from the manager configuration.
    #[must_use]
    pub fn from_config(config: &ManagerConfig) -> Self {
        Self {
            api_base: config.api_base().to_string(),
            token: config.token().map(ToString::to_string),
            download: config.download.clone(),
        }
    }

    /// One-line `curl | bash` bootstrap command for a node.
    #[must_use]
    pub fn install_command(&self, node: &Node) -> String {
        let token = self.token.as_deref().unwrap_or(TOKEN_PLACEHOLDER);
        format!(
            "curl -fsSL -H \"Authorization: Bearer {token}\" \"{}/api/nodes/{}/install-script\" | bash",
            self.api_base, node.id
        )
    }

    /// Download proxy prefix for a node, empty when none applies.
    #[must_use]
    pub fn proxy_prefix_for(&self, node: &Node) -> String {
        match node.proxy_mode {
            Some(ProxyMode::Ipv4) => self.download.proxy_prefix_ipv4.clone(),
            Some(ProxyMode::Ipv6) => self.download.proxy_prefix_ipv6.clone(),
            None => {
                let prefix = self.download.proxy_prefix.trim();
                if prefix.is_empty() || prefix.ends_with('/') {
                    prefix.to_string()
                } else {
                    format!("{prefix}/")
                }
            }
        }
    }

    /// Full bash install script for a node.
    #[must_use]
    pub fn generate(&self, node: &Node) -> String {
        let download_base = non_empty_or(
            self.download.base_url.trim_end_matches('/'),
            DEFAULT_DOWNLOAD_BASE,
        );
        let version = non_empty_or(self.download.nebula_version.trim(), DEFAULT_NEBULA_VERSION);
        let name = escape_double_quotes(&node.name);
        let token_line = self.token.as_deref().map_or_else(
            || TOKEN_PLACEHOLDER.to_string(),
            escape_double_quotes,
        );

        let mut s = String::with_capacity(4096);
        s.push_str("#!/bin/bash\nset -euo pipefail\n\n");

        let _ = writeln!(s, "API_BASE=\"${{NEBULA_MANAGER_API:-{}}}\"", escape_double_quotes(&self.api_base));
        let _ = writeln!(s, "NODE_ID={}", node.id);
        let _ = writeln!(s, "NODE_NAME=\"{name}\"");
        s.push_str("NEBULA_DIR=\"${NEBULA_DIR:-/etc/nebula}\"\n");
        s.push_str("TMP_DIR=$(mktemp -d)\n");
        s.push_str("trap 'rm -rf \"$TMP_DIR\"' EXIT\n\n");
        let _ = writeln!(s, "NEBULA_VERSION=\"${{NEBULA_VERSION:-{}}}\"", escape_double_quotes(version));
        let _ = writeln!(s, "NEBULA_DOWNLOAD_BASE=\"{}\"", escape_double_quotes(download_base));
        let _ = writeln!(
            s,
            "NEBULA_PROXY_PREFIX=\"{}\"",
            escape_double_quotes(&self.proxy_prefix_for(node))
        );
        let _ = writeln!(s, "NEBULA_ACCESS_TOKEN=\"{token_line}\"");
        s.push_str("CURL_AUTH=(-H \"Authorization: Bearer $NEBULA_ACCESS_TOKEN\")\n\n");

        for (tool, purpose) in [
            ("curl", "to download files"),
            ("tar", "to unpack archives"),
            ("systemctl", "to install the systemd service"),
        ] {
            let _ = writeln!(s, "if ! command -v {tool} >/dev/null 2>&1; then");
            let _ = writeln!(s, "  echo '{tool} is required {purpose}' >&2");
            s.push_str("  exit 1\nfi\n");
        }
        s.push('\n');

        s.push_str("OS=$(uname -s | tr 'A-Z' 'a-z')\n");
        s.push_str("ARCH=$(uname -m)\n");
        s.push_str("if [ \"$OS\" != \"linux\" ]; then\n");
        s.push_str("  echo 'this installer only supports Linux' >&2\n");
        s.push_str("  exit 1\nfi\n");
        s.push_str("case $ARCH in\n");
        s.push_str("  x86_64|amd64) ARCH=amd64 ;;\n");
        s.push_str("  aarch64|arm64) ARCH=arm64 ;;\n");
        s.push_str("  armv7l|armv7) ARCH=arm ;;\n");
        s.push_str("  armv6l) ARCH=arm6 ;;\n");
        s.push_str("  i386|i686) ARCH=386 ;;\n");
        s.push_str("  *) echo \"unsupported CPU architecture: $ARCH\" >&2; exit 1 ;;\n");
        s.push_str("esac\n");
        s.push_str("NEBULA_PACKAGE=\"nebula-linux-$ARCH.tar.gz\"\n");
        s.push_str("BASE_URL=\"$NEBULA_DOWNLOAD_BASE/v$NEBULA_VERSION/$NEBULA_PACKAGE\"\n");
        s.push_str("if [ -n \"$NEBULA_PROXY_PREFIX\" ]; then\n");
        s.push_str("  DOWNLOAD_URL=\"$NEBULA_PROXY_PREFIX$BASE_URL\"\nelse\n");
        s.push_str("  DOWNLOAD_URL=\"$BASE_URL\"\nfi\n\n");

        s.push_str("echo \"Downloading Nebula from $DOWNLOAD_URL...\"\n");
        s.push_str("curl -fsSL \"$DOWNLOAD_URL\" -o \"$TMP_DIR/$NEBULA_PACKAGE\"\n");
        s.push_str("tar -xzf \"$TMP_DIR/$NEBULA_PACKAGE\" -C \"$TMP_DIR\" nebula\n");
        s.push_str("sudo install -m 755 \"$TMP_DIR/nebula\" /usr/local/bin/nebula\n\n");

        s.push_str("echo \"Fetching node bundle from $API_BASE...\"\n");
        s.push_str("curl -fsSL \"${CURL_AUTH[@]}\" \"$API_BASE/api/nodes/$NODE_ID/bundle\" -o \"$TMP_DIR/node_bundle.tar.gz\"\n");
        s.push_str("tar -xzf \"$TMP_DIR/node_bundle.tar.gz\" -C \"$TMP_DIR\"\n\n");

        s.push_str("sudo install -d -m 755 \"$NEBULA_DIR\"\n");
        s.push_str("sudo install -m 600 \"$TMP_DIR/ca.crt\" \"$NEBULA_DIR/ca.crt\"\n");
        let _ = writeln!(s, "sudo install -m 600 \"$TMP_DIR/{name}.crt\" \"$NEBULA_DIR/{name}.crt\"");
        let _ = writeln!(s, "sudo install -m 600 \"$TMP_DIR/{name}.key\" \"$NEBULA_DIR/{name}.key\"");
        s.push_str("sudo install -m 640 \"$TMP_DIR/config.yml\" \"$NEBULA_DIR/config.yml\"\n");
        s.push_str("sudo chmod 600 \"$NEBULA_DIR\"/*.key\n");

        s.push_str("sudo tee /etc/systemd/system/nebula.service >/dev/null <<'UNIT'\n");
        s.push_str(SYSTEMD_UNIT);
        s.push_str("UNIT\n");
        s.push_str("sudo systemctl daemon-reload\n");
        s.push_str("sudo systemctl enable --now nebula.service\n");
        s.push_str("echo \"Nebula node $NODE_NAME is installed and running as a systemd service\"\n");
        s.push_str("sudo systemctl status nebula.service --no-pager\n");
        s
    }
}

/// Escape a value for interpolation inside a double-quoted shell string.
#[must_use]
pub fn escape_double_quotes(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use nebula_core::NodeRole;

    fn node(proxy_mode: Option<ProxyMode>) -> Node {
        Node {
            id: 7,
            name: "web1".into(),
            role: NodeRole::Standard,
            subnet_ip: "10.0.0.5".into(),
            subnet_cidr: "10.0.0.5/24".into(),
            subnet_host: "10.0.0.5".into(),
            public_ip: None,
            port: 4242,
            tags: Vec::new(),
            proxy_mode,
            certificate_pem: String::new(),
            private_key_pem: String::new(),
            config_content: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn generator(token: Option<&str>) -> InstallScriptGenerator {
        let mut config = ManagerConfig {
            api_base_url: "https://mgr.example.com/".into(),
            static_token: token.map(ToString::to_string),
            ..ManagerConfig::default()
        };
        config.download.proxy_prefix = "https://mirror.example.com".into();
        config.download.proxy_prefix_ipv4 = "https://v4.example.com/".into();
        config.download.proxy_prefix_ipv6 = "https://v6.example.com/".into();
        InstallScriptGenerator::from_config(&config)
    }

    #[test]
    fn test_install_command_with_token() {
        let cmd = generator(Some("s3cret")).install_command(&node(None));
        assert_eq!(
            cmd,
            "curl -fsSL -H \"Authorization: Bearer s3cret\" \"https://mgr.example.com/api/nodes/7/install-script\" | bash"
        );
    }

    #[test]
    fn test_install_command_without_token() {
        let cmd = generator(None).install_command(&node(None));
        assert!(cmd.contains("Bearer ${NEBULA_ACCESS_TOKEN:?missing NEBULA_ACCESS_TOKEN}"));
        assert!(cmd.ends_with("/api/nodes/7/install-script\" | bash"));
    }

    #[test]
    fn test_default_api_base() {
        let gen = InstallScriptGenerator::from_config(&ManagerConfig::default());
        assert!(gen
            .install_command(&node(None))
            .contains("\"http://localhost:8080/api/nodes/7/install-script\""));
    }

    #[test]
    fn test_proxy_prefix_selection() {
        let gen = generator(None);
        assert_eq!(gen.proxy_prefix_for(&node(None)), "https://mirror.example.com/");
        assert_eq!(gen.proxy_prefix_for(&node(Some(ProxyMode::Ipv4))), "https://v4.example.com/");
        assert_eq!(gen.proxy_prefix_for(&node(Some(ProxyMode::Ipv6))), "https://v6.example.com/");

        let plain = InstallScriptGenerator::from_config(&ManagerConfig::default());
        assert_eq!(plain.proxy_prefix_for(&node(None)), "");
    }

    #[test]
    fn test_script_token_handling() {
        let embedded = generator(Some("to\"k\\en")).generate(&node(None));
        assert!(embedded.contains("NEBULA_ACCESS_TOKEN=\"to\\\"k\\\\en\"\n"));

        let deferred = generator(None).generate(&node(None));
        assert!(deferred.contains(
            "NEBULA_ACCESS_TOKEN=\"${NEBULA_ACCESS_TOKEN:?missing NEBULA_ACCESS_TOKEN}\"\n"
        ));
    }

    #[test]
    fn test_script_contents() {
        let script = generator(None).generate(&node(Some(ProxyMode::Ipv6)));

        assert!(script.starts_with("#!/bin/bash\nset -euo pipefail\n"));
        assert!(script.contains("API_BASE=\"${NEBULA_MANAGER_API:-https://mgr.example.com}\"\n"));
        assert!(script.contains("NODE_ID=7\n"));
        assert!(script.contains("NEBULA_VERSION=\"${NEBULA_VERSION:-1.9.3}\"\n"));
        assert!(script.contains("NEBULA_PROXY_PREFIX=\"https://v6.example.com/\"\n"));
        assert!(script.contains("  x86_64|amd64) ARCH=amd64 ;;\n"));
        assert!(script.contains("  armv6l) ARCH=arm6 ;;\n"));
        assert!(script.contains("  i386|i686) ARCH=386 ;;\n"));
        assert!(script.contains("\"$API_BASE/api/nodes/$NODE_ID/bundle\""));
        assert!(script.contains("\"$TMP_DIR/web1.key\" \"$NEBULA_DIR/web1.key\""));
        assert!(script.contains("Restart=on-failure\nRestartSec=5\n"));
        assert!(script.contains("sudo systemctl enable --now nebula.service\n"));
    }

    #[test]
    fn test_escape_double_quotes() {
        assert_eq!(escape_double_quotes(r#"a"b\c"#), r#"a\"b\\c"#);
        assert_eq!(escape_double_quotes("plain"), "plain");
    }
}
