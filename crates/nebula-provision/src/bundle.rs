//! Downloadable node bundle (`.tar.gz`).

use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use nebula_core::{CertificateAuthority, Node, ProvisionError, Result};
use std::path::Path;

use crate::artifacts::{CA_CERT_FILE, CONFIG_FILE};

const SECRET_MODE: u32 = 0o600;
const CONFIG_MODE: u32 = 0o640;

/// Build a gzip-compressed tar holding exactly the node's four files.
pub fn build(node: &Node, ca: &CertificateAuthority) -> Result<Vec<u8>> {
    let mtime = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
    let entries = [
        (CA_CERT_FILE.to_string(), ca.certificate_pem.as_str(), SECRET_MODE),
        (node.cert_file_name(), node.certificate_pem.as_str(), SECRET_MODE),
        (node.key_file_name(), node.private_key_pem.as_str(), SECRET_MODE),
        (CONFIG_FILE.to_string(), node.config_content.as_str(), CONFIG_MODE),
    ];

    let mut archive = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, contents, mode) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(contents.len() as u64);
        header.set_mode(mode);
        header.set_mtime(mtime);
        archive
            .append_data(&mut header, &name, contents.as_bytes())
            .map_err(|e| ProvisionError::filesystem(&name, e))?;
    }

    let bundle = Path::new("bundle.tar.gz");
    archive
        .into_inner()
        .and_then(GzEncoder::finish)
        .map_err(|e| ProvisionError::filesystem(bundle, e))
}
