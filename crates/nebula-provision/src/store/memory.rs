use async_trait::async_trait;
use nebula_core::{CertificateAuthority, ConfigTemplate, NetworkSettings, Node, NodeRole, Result};
use tokio::sync::RwLock;

use super::{Store, StoreState};

/// Process-local store. Every operation holds the lock for its whole
/// duration, so CA replacement is trivially atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_ca(&self) -> Result<Option<CertificateAuthority>> {
        Ok(self.state.read().await.ca.clone())
    }

    async fn replace_ca(&self, ca: CertificateAuthority) -> Result<CertificateAuthority> {
        Ok(self.state.write().await.replace_ca(ca))
    }

    async fn get_settings(&self) -> Result<Option<NetworkSettings>> {
        Ok(self.state.read().await.settings.clone())
    }

    async fn save_settings(&self, settings: NetworkSettings) -> Result<NetworkSettings> {
        Ok(self.state.write().await.save_settings(settings))
    }

    async fn get_template(&self, name: &str) -> Result<Option<ConfigTemplate>> {
        Ok(self.state.read().await.get_template(name))
    }

    async fn list_templates(&self) -> Result<Vec<ConfigTemplate>> {
        Ok(self.state.read().await.list_templates())
    }

    async fn save_template(&self, template: ConfigTemplate) -> Result<ConfigTemplate> {
        Ok(self.state.write().await.save_template(template))
    }

    async fn delete_template(&self, id: u64) -> Result<bool> {
        Ok(self.state.write().await.delete_template(id))
    }

    async fn insert_node(&self, node: Node) -> Result<Node> {
        self.state.write().await.insert_node(node)
    }

    async fn get_node(&self, id: u64) -> Result<Option<Node>> {
        Ok(self.state.read().await.get_node(id))
    }

    async fn get_node_by_name(&self, name: &str) -> Result<Option<Node>> {
        Ok(self.state.read().await.get_node_by_name(name))
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        Ok(self.state.read().await.list_nodes())
    }

    async fn list_nodes_by_role(&self, role: NodeRole) -> Result<Vec<Node>> {
        Ok(self.state.read().await.list_nodes_by_role(role))
    }

    async fn update_node(&self, node: &Node) -> Result<Node> {
        self.state.write().await.update_node(node)
    }

    async fn delete_node(&self, id: u64) -> Result<bool> {
        Ok(self.state.write().await.delete_node(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn node(name: &str, role: NodeRole) -> Node {
        Node {
            id: 0,
            name: name.to_string(),
            role,
            subnet_ip: String::new(),
            subnet_cidr: "10.0.0.1/24".into(),
            subnet_host: "10.0.0.1".into(),
            public_ip: None,
            port: 4242,
            tags: Vec::new(),
            proxy_mode: None,
            certificate_pem: String::new(),
            private_key_pem: String::new(),
            config_content: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_unique_node_names() {
        let store = MemoryStore::new();
        store.insert_node(node("a", NodeRole::Standard)).await.unwrap();
        let err = store.insert_node(node("a", NodeRole::Lighthouse)).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_role_filter_and_delete() {
        let store = MemoryStore::new();
        let lh = store.insert_node(node("lh", NodeRole::Lighthouse)).await.unwrap();
        store.insert_node(node("std", NodeRole::Standard)).await.unwrap();

        let lighthouses = store.list_nodes_by_role(NodeRole::Lighthouse).await.unwrap();
        assert_eq!(lighthouses.len(), 1);
        assert_eq!(lighthouses[0].name, "lh");

        assert!(store.delete_node(lh.id).await.unwrap());
        assert!(!store.delete_node(lh.id).await.unwrap());
        assert_eq!(store.list_nodes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_template_upsert_by_name() {
        let store = MemoryStore::new();
        let first = store
            .save_template(ConfigTemplate::new("default", "a"))
            .await
            .unwrap();
        let second = store
            .save_template(ConfigTemplate::new("default", "b"))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.get_template("default").await.unwrap().unwrap().content, "b");
        assert_eq!(store.list_templates().await.unwrap().len(), 1);
    }
}
