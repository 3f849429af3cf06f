//! On-disk node artifacts.
//!
//! Layout: `<data_dir>/nodes/<name>/{ca.crt, <name>.crt, <name>.key, config.yml}`.

use nebula_core::{NodeArtifacts, ProvisionError, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// File name of the CA certificate inside a node directory.
pub const CA_CERT_FILE: &str = "ca.crt";

/// File name of the rendered configuration inside a node directory.
pub const CONFIG_FILE: &str = "config.yml";

const DIR_MODE: u32 = 0o755;
const SECRET_MODE: u32 = 0o600;
const CONFIG_MODE: u32 = 0o640;

/// Writes and removes per-node artifact directories.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    nodes_dir: PathBuf,
}

impl ArtifactStore {
    /// Artifact store rooted at `<data_dir>/nodes`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            nodes_dir: data_dir.as_ref().join("nodes"),
        }
    }

    /// Directory holding a node's files.
    #[must_use]
    pub fn node_dir(&self, name: &str) -> PathBuf {
        self.nodes_dir.join(name)
    }

    /// Write all four files for `name`, replacing any previous content.
    pub async fn write(&self, name: &str, files: &NodeArtifacts) -> Result<PathBuf> {
        ensure_safe_name(name)?;
        let dir = self.node_dir(name);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ProvisionError::filesystem(&dir, e))?;
        set_mode(&dir, DIR_MODE).await?;

        let entries = [
            (CA_CERT_FILE.to_string(), files.ca_cert.as_str(), SECRET_MODE),
            (format!("{name}.crt"), files.certificate.as_str(), SECRET_MODE),
            (format!("{name}.key"), files.private_key.as_str(), SECRET_MODE),
            (CONFIG_FILE.to_string(), files.config.as_str(), CONFIG_MODE),
        ];
        for (file, contents, mode) in entries {
            let path = dir.join(file);
            write_with_mode(&path, contents.as_bytes(), mode)
                .await
                .map_err(|e| ProvisionError::filesystem(&path, e))?;
        }

        debug!(node = name, dir = %dir.display(), "wrote node artifacts");
        Ok(dir)
    }

    /// Remove a node's directory. A directory that is already gone is fine.
    pub async fn remove(&self, name: &str) -> Result<()> {
        ensure_safe_name(name)?;
        let dir = self.node_dir(name);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(node = name, "artifact directory already removed");
                Ok(())
            }
            Err(e) => Err(ProvisionError::filesystem(dir, e)),
        }
    }
}

/// Node names become directory and file names.
pub fn ensure_safe_name(name: &str) -> Result<()> {
    let unsafe_name = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
        || name.trim() != name;
    if unsafe_name {
        return Err(ProvisionError::Validation(format!(
            "node name {name:?} is not a valid file name"
        )));
    }
    Ok(())
}

/// Write `contents` to `path` so that it never holds data under a wider
/// mode than `mode`. Existing files are narrowed before they are truncated.
pub(crate) async fn write_with_mode(
    path: &Path,
    contents: &[u8],
    mode: u32,
) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(false);
    #[cfg(unix)]
    options.mode(mode);

    let mut file = options.open(path).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(mode))
            .await?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    file.set_len(0).await?;
    file.write_all(contents).await?;
    file.flush().await
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|e| ProvisionError::filesystem(path, e))
}

#[cfg(not(unix))]
#[allow(clippy::unused_async)]
async fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files() -> NodeArtifacts {
        NodeArtifacts {
            certificate: "cert".into(),
            private_key: "key".into(),
            ca_cert: "ca".into(),
            config: "config".into(),
        }
    }

    #[tokio::test]
    async fn test_write_layout() {
        let data = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(data.path());

        let dir = store.write("web1", &files()).await.unwrap();
        assert_eq!(dir, data.path().join("nodes").join("web1"));

        for (file, expected) in [
            ("ca.crt", "ca"),
            ("web1.crt", "cert"),
            ("web1.key", "key"),
            ("config.yml", "config"),
        ] {
            assert_eq!(std::fs::read_to_string(dir.join(file)).unwrap(), expected);
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_modes() {
        use std::os::unix::fs::PermissionsExt;

        let data = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(data.path());
        let dir = store.write("web1", &files()).await.unwrap();

        let mode = |p: PathBuf| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(dir.join("web1.key")), 0o600);
        assert_eq!(mode(dir.join("ca.crt")), 0o600);
        assert_eq!(mode(dir.join("config.yml")), 0o640);
        assert_eq!(mode(dir.clone()), 0o755);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rewrite_narrows_existing_key() {
        use std::os::unix::fs::PermissionsExt;

        let data = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(data.path());
        let dir = store.node_dir("web1");
        std::fs::create_dir_all(&dir).unwrap();
        let key = dir.join("web1.key");
        std::fs::write(&key, "an older and much longer key").unwrap();
        std::fs::set_permissions(&key, std::fs::Permissions::from_mode(0o644)).unwrap();

        store.write("web1", &files()).await.unwrap();

        assert_eq!(std::fs::read_to_string(&key).unwrap(), "key");
        let mode = std::fs::metadata(&key).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let data = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(data.path());
        store.write("web1", &files()).await.unwrap();

        store.remove("web1").await.unwrap();
        assert!(!store.node_dir("web1").exists());
        store.remove("web1").await.unwrap();
    }

    #[test]
    fn test_unsafe_names() {
        for name in ["", ".", "..", "a/b", "a\\b", " web1"] {
            assert!(ensure_safe_name(name).is_err(), "{name:?}");
        }
        assert!(ensure_safe_name("web-1.example").is_ok());
    }
}
