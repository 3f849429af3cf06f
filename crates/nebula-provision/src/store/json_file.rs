use async_trait::async_trait;
use nebula_core::{
    CertificateAuthority, ConfigTemplate, NetworkSettings, Node, NodeRole, ProvisionError, Result,
};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use super::{Store, StoreState};
use crate::artifacts::write_with_mode;

const STORE_FILE_MODE: u32 = 0o600;

/// Store persisted as a single pretty-printed JSON document.
///
/// Mutations are applied to a copy of the state, written to a sibling
/// temporary file, and renamed over the original before the in-memory state
/// is swapped. A failed write leaves both the file and memory untouched.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                ProvisionError::Persistence(format!("failed to parse {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(e) => {
                return Err(ProvisionError::Persistence(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };
        debug!(path = %path.display(), "opened JSON store");
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&StoreState) -> T + Send,
    {
        f(&*self.state.lock().await)
    }

    async fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut StoreState) -> Result<T> + Send,
        T: Send,
    {
        let mut guard = self.state.lock().await;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        persist(&self.path, &next).await?;
        *guard = next;
        Ok(out)
    }
}

async fn persist(path: &Path, state: &StoreState) -> Result<()> {
    let fail = |what: &str, e: std::io::Error| {
        ProvisionError::Persistence(format!("failed to {what} {}: {e}", path.display()))
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| fail("create directory for", e))?;
    }

    // The state carries CA and node private keys.
    let content = serde_json::to_string_pretty(state)?;
    let tmp = path.with_extension("json.tmp");
    write_with_mode(&tmp, content.as_bytes(), STORE_FILE_MODE)
        .await
        .map_err(|e| fail("write", e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| fail("replace", e))
}

#[async_trait]
impl Store for JsonFileStore {
    async fn get_ca(&self) -> Result<Option<CertificateAuthority>> {
        Ok(self.read(|s| s.ca.clone()).await)
    }

    async fn replace_ca(&self, ca: CertificateAuthority) -> Result<CertificateAuthority> {
        self.mutate(|s| Ok(s.replace_ca(ca))).await
    }

    async fn get_settings(&self) -> Result<Option<NetworkSettings>> {
        Ok(self.read(|s| s.settings.clone()).await)
    }

    async fn save_settings(&self, settings: NetworkSettings) -> Result<NetworkSettings> {
        self.mutate(|s| Ok(s.save_settings(settings))).await
    }

    async fn get_template(&self, name: &str) -> Result<Option<ConfigTemplate>> {
        Ok(self.read(|s| s.get_template(name)).await)
    }

    async fn list_templates(&self) -> Result<Vec<ConfigTemplate>> {
        Ok(self.read(StoreState::list_templates).await)
    }

    async fn save_template(&self, template: ConfigTemplate) -> Result<ConfigTemplate> {
        self.mutate(|s| Ok(s.save_template(template))).await
    }

    async fn delete_template(&self, id: u64) -> Result<bool> {
        self.mutate(|s| Ok(s.delete_template(id))).await
    }

    async fn insert_node(&self, node: Node) -> Result<Node> {
        self.mutate(|s| s.insert_node(node)).await
    }

    async fn get_node(&self, id: u64) -> Result<Option<Node>> {
        Ok(self.read(|s| s.get_node(id)).await)
    }

    async fn get_node_by_name(&self, name: &str) -> Result<Option<Node>> {
        Ok(self.read(|s| s.get_node_by_name(name)).await)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        Ok(self.read(StoreState::list_nodes).await)
    }

    async fn list_nodes_by_role(&self, role: NodeRole) -> Result<Vec<Node>> {
        Ok(self.read(|s| s.list_nodes_by_role(role)).await)
    }

    async fn update_node(&self, node: &Node) -> Result<Node> {
        self.mutate(|s| s.update_node(node)).await
    }

    async fn delete_node(&self, id: u64) -> Result<bool> {
        self.mutate(|s| Ok(s.delete_node(id))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ca(name: &str) -> CertificateAuthority {
        CertificateAuthority {
            id: 0,
            name: name.to_string(),
            description: String::new(),
            certificate_pem: "-----BEGIN NEBULA CERTIFICATE-----".into(),
            private_key_pem: "-----BEGIN NEBULA ED25519 PRIVATE KEY-----".into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        {
            let store = JsonFileStore::open(&path).await.unwrap();
            store.replace_ca(ca("first")).await.unwrap();
            store.replace_ca(ca("second")).await.unwrap();
            store
                .save_template(ConfigTemplate::new("default", "body"))
                .await
                .unwrap();
        }

        let store = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(store.get_ca().await.unwrap().unwrap().name, "second");
        assert_eq!(store.list_templates().await.unwrap().len(), 1);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_store_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(store.path(), path);
        store.replace_ca(ca("root")).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonFileStore::open(&path).await.unwrap_err();
        assert!(matches!(err, ProvisionError::Persistence(_)));
    }
}
