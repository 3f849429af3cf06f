//! Record store.
//!
//! The pipeline talks to persistence only through [`Store`]. Two
//! implementations ship with the crate:
//!
//! - [`MemoryStore`]: process-local, for tests and embedding
//! - [`JsonFileStore`]: the same state persisted to a JSON file

mod json_file;
mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::Utc;
use nebula_core::{
    CertificateAuthority, ConfigTemplate, NetworkSettings, Node, NodeRole, ProvisionError, Result,
};
use serde::{Deserialize, Serialize};

/// Persistence operations the pipeline relies on.
#[async_trait]
pub trait Store: Send + Sync {
    /// The zero-or-one stored CA.
    async fn get_ca(&self) -> Result<Option<CertificateAuthority>>;

    /// Delete every stored CA and insert `ca`, as one unit of work.
    async fn replace_ca(&self, ca: CertificateAuthority) -> Result<CertificateAuthority>;

    /// The settings row, if one has been created.
    async fn get_settings(&self) -> Result<Option<NetworkSettings>>;

    /// Create or overwrite the settings row.
    async fn save_settings(&self, settings: NetworkSettings) -> Result<NetworkSettings>;

    /// Template by unique name.
    async fn get_template(&self, name: &str) -> Result<Option<ConfigTemplate>>;

    /// All templates ordered by name.
    async fn list_templates(&self) -> Result<Vec<ConfigTemplate>>;

    /// Insert a template, or replace the body of the one with the same name.
    async fn save_template(&self, template: ConfigTemplate) -> Result<ConfigTemplate>;

    /// Delete a template by id. Returns false if it did not exist.
    async fn delete_template(&self, id: u64) -> Result<bool>;

    /// Insert a node. Fails with a validation error on a duplicate name.
    async fn insert_node(&self, node: Node) -> Result<Node>;

    /// Node by id.
    async fn get_node(&self, id: u64) -> Result<Option<Node>>;

    /// Node by unique name.
    async fn get_node_by_name(&self, name: &str) -> Result<Option<Node>>;

    /// All nodes, newest first.
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// Nodes with the given role, in insertion order.
    async fn list_nodes_by_role(&self, role: NodeRole) -> Result<Vec<Node>>;

    /// Overwrite an existing node.
    async fn update_node(&self, node: &Node) -> Result<Node>;

    /// Delete a node by id. Returns false if it did not exist.
    async fn delete_node(&self, id: u64) -> Result<bool>;
}

/// Complete store contents, shared by both implementations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StoreState {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    ca: Option<CertificateAuthority>,
    #[serde(default)]
    settings: Option<NetworkSettings>,
    #[serde(default)]
    templates: Vec<ConfigTemplate>,
    #[serde(default)]
    nodes: Vec<Node>,
}

impl StoreState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub(crate) fn replace_ca(&mut self, mut ca: CertificateAuthority) -> CertificateAuthority {
        ca.id = self.allocate_id();
        self.ca = Some(ca.clone());
        ca
    }

    pub(crate) fn save_settings(&mut self, mut settings: NetworkSettings) -> NetworkSettings {
        settings.updated_at = Utc::now();
        self.settings = Some(settings.clone());
        settings
    }

    pub(crate) fn get_template(&self, name: &str) -> Option<ConfigTemplate> {
        self.templates.iter().find(|t| t.name == name).cloned()
    }

    pub(crate) fn list_templates(&self) -> Vec<ConfigTemplate> {
        let mut templates = self.templates.clone();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        templates
    }

    pub(crate) fn save_template(&mut self, template: ConfigTemplate) -> ConfigTemplate {
        let now = Utc::now();
        if let Some(existing) = self.templates.iter_mut().find(|t| t.name == template.name) {
            existing.content = template.content;
            existing.updated_at = now;
            return existing.clone();
        }

        let mut template = template;
        template.id = self.allocate_id();
        template.created_at = now;
        template.updated_at = now;
        self.templates.push(template.clone());
        template
    }

    pub(crate) fn delete_template(&mut self, id: u64) -> bool {
        let before = self.templates.len();
        self.templates.retain(|t| t.id != id);
        self.templates.len() != before
    }

    pub(crate) fn insert_node(&mut self, mut node: Node) -> Result<Node> {
        if self.nodes.iter().any(|n| n.name == node.name) {
            return Err(ProvisionError::Validation(format!(
                "node name {} already exists",
                node.name
            )));
        }
        let now = Utc::now();
        node.id = self.allocate_id();
        node.created_at = now;
        node.updated_at = now;
        self.nodes.push(node.clone());
        Ok(node)
    }

    pub(crate) fn get_node(&self, id: u64) -> Option<Node> {
        self.nodes.iter().find(|n| n.id == id).cloned()
    }

    pub(crate) fn get_node_by_name(&self, name: &str) -> Option<Node> {
        self.nodes.iter().find(|n| n.name == name).cloned()
    }

    pub(crate) fn list_nodes(&self) -> Vec<Node> {
        let mut nodes = self.nodes.clone();
        nodes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        nodes
    }

    pub(crate) fn list_nodes_by_role(&self, role: NodeRole) -> Vec<Node> {
        self.nodes.iter().filter(|n| n.role == role).cloned().collect()
    }

    pub(crate) fn update_node(&mut self, node: &Node) -> Result<Node> {
        if self.nodes.iter().any(|n| n.name == node.name && n.id != node.id) {
            return Err(ProvisionError::Validation(format!(
                "node name {} already exists",
                node.name
            )));
        }
        let slot = self
            .nodes
            .iter_mut()
            .find(|n| n.id == node.id)
            .ok_or_else(|| ProvisionError::not_found(format!("node {}", node.id)))?;
        let mut updated = node.clone();
        updated.created_at = slot.created_at;
        updated.updated_at = Utc::now();
        *slot = updated.clone();
        Ok(updated)
    }

    pub(crate) fn delete_node(&mut self, id: u64) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|n| n.id != id);
        self.nodes.len() != before
    }
}
