//! Node provisioning.
//!
//! [`NodeProvisioner`] ties the pipeline together: it validates requests,
//! issues certificates, renders configuration, writes artifacts, and keeps
//! the node records in step with them.
//!
//! Every read of a node's artifacts recomputes them from the current CA,
//! settings and lighthouse set. Files are written before the record is
//! committed, so a failed commit leaves the files ahead of the row until the
//! next read rather than the reverse.

use chrono::Utc;
use nebula_core::{
    CertificateAuthority, CreateNodeRequest, NetworkSettings, Node, NodeArtifacts, NodeRole,
    NodeView, ProvisionError, ProxyMode, Result,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::artifacts::{self, ArtifactStore, CA_CERT_FILE};
use crate::bundle;
use crate::ca::CaManager;
use crate::config::ManagerConfig;
use crate::install::InstallScriptGenerator;
use crate::issuer::CertificateIssuer;
use crate::settings::SettingsService;
use crate::signer::Signer;
use crate::store::Store;
use crate::subnet;
use crate::template::{self, LighthouseEntry, RenderContext, TemplateService};

/// Per-node async locks, created on first use.
///
/// An entry whose only reference is the map itself is neither held nor
/// awaited, so it is dropped on the next acquire. The map only ever holds
/// ids that are in use plus the most recent one.
#[derive(Debug, Default)]
struct NodeLocks {
    locks: Mutex<HashMap<u64, Arc<Mutex<()>>>>,
}

impl NodeLocks {
    async fn acquire(&self, id: u64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}

/// Provisions nodes and serves their artifacts.
pub struct NodeProvisioner {
    store: Arc<dyn Store>,
    issuer: CertificateIssuer,
    ca: CaManager,
    settings: SettingsService,
    templates: TemplateService,
    artifacts: ArtifactStore,
    installer: InstallScriptGenerator,
    locks: NodeLocks,
    create_lock: Mutex<()>,
}

impl NodeProvisioner {
    /// Wire the pipeline over a store and a signer.
    pub fn new(store: Arc<dyn Store>, signer: Arc<dyn Signer>, config: &ManagerConfig) -> Self {
        let issuer = CertificateIssuer::new(signer);
        Self {
            ca: CaManager::new(store.clone(), issuer.clone()),
            settings: SettingsService::new(store.clone()),
            templates: TemplateService::new(store.clone()),
            artifacts: ArtifactStore::new(&config.data_dir),
            installer: InstallScriptGenerator::from_config(config),
            locks: NodeLocks::default(),
            create_lock: Mutex::new(()),
            issuer,
            store,
        }
    }

    /// CA lifecycle.
    pub const fn ca(&self) -> &CaManager {
        &self.ca
    }

    /// Network settings.
    pub const fn settings(&self) -> &SettingsService {
        &self.settings
    }

    /// Template catalogue.
    pub const fn templates(&self) -> &TemplateService {
        &self.templates
    }

    /// Provision a new node.
    #[instrument(skip(self, req), fields(name = %req.name, role = %req.role))]
    pub async fn create(&self, req: CreateNodeRequest) -> Result<NodeView> {
        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(ProvisionError::Validation("name is required".into()));
        }
        artifacts::ensure_safe_name(&name)?;
        let role: NodeRole = req.role.trim().parse()?;

        // Serialize creation so two requests for one name cannot share a directory.
        let _create = self.create_lock.lock().await;

        if self.store.get_node_by_name(&name).await?.is_some() {
            return Err(ProvisionError::Validation(format!(
                "node name {name} already exists"
            )));
        }

        let ca = self.require_ca("CA not generated yet").await?;
        let settings = self.settings.get().await?;
        let subnet = subnet::normalize(&req.subnet_ip, Some(&settings))?;
        let port = req
            .port
            .filter(|p| *p != 0)
            .unwrap_or_else(|| settings.effective_port());

        let issued = self
            .issuer
            .issue_node_certificate(
                &ca.certificate_pem,
                &ca.private_key_pem,
                &name,
                &subnet.cidr,
                settings.effective_validity_days(),
            )
            .await?;

        let now = Utc::now();
        let mut node = Node {
            id: 0,
            name: name.clone(),
            role,
            subnet_ip: subnet.host.clone(),
            subnet_cidr: subnet.cidr,
            subnet_host: subnet.host,
            public_ip: req
                .public_ip
                .map(|ip| ip.trim().to_string())
                .filter(|ip| !ip.is_empty()),
            port,
            tags: clean_tags(req.tags),
            proxy_mode: ProxyMode::normalize(req.proxy_mode.as_deref()),
            certificate_pem: issued.certificate_pem,
            private_key_pem: issued.private_key_pem,
            config_content: String::new(),
            created_at: now,
            updated_at: now,
        };

        let mut lighthouses = self.lighthouses(&settings).await?;
        if node.is_lighthouse() {
            lighthouses.push(LighthouseEntry::new(
                &node.name,
                node.public_ip_str(),
                &node.subnet_host,
                node.port,
            ));
        }
        node.config_content = self.render(&node, lighthouses).await?;

        self.write_artifacts(&node, &ca).await?;
        let node = match self.store.insert_node(node).await {
            Ok(node) => node,
            Err(e) => {
                if let Err(cleanup) = self.artifacts.remove(&name).await {
                    warn!(error = %cleanup, "failed to remove artifacts of rejected node");
                }
                return Err(e);
            }
        };

        info!(id = node.id, subnet = %node.subnet_cidr, "node provisioned");
        Ok(self.to_view(&node))
    }

    /// All nodes, newest first.
    pub async fn list(&self) -> Result<Vec<NodeView>> {
        let nodes = self.store.list_nodes().await?;
        Ok(nodes.iter().map(|n| self.to_view(n)).collect())
    }

    /// Outward view of a single node. Does not refresh artifacts.
    pub async fn get(&self, id: u64) -> Result<NodeView> {
        let node = self.load(id).await?;
        Ok(self.to_view(&node))
    }

    /// Refreshed certificate, key, CA certificate and config.
    #[instrument(skip(self))]
    pub async fn artifacts(&self, id: u64) -> Result<NodeArtifacts> {
        let (node, ca) = self.refresh(id).await?;
        Ok(NodeArtifacts {
            certificate: node.certificate_pem,
            private_key: node.private_key_pem,
            ca_cert: ca.certificate_pem,
            config: node.config_content,
        })
    }

    /// Refreshed `config.yml` content.
    #[instrument(skip(self))]
    pub async fn config(&self, id: u64) -> Result<String> {
        let (node, _) = self.refresh(id).await?;
        Ok(node.config_content)
    }

    /// Refreshed `.tar.gz` bundle.
    #[instrument(skip(self))]
    pub async fn bundle(&self, id: u64) -> Result<Vec<u8>> {
        let (node, ca) = self.refresh(id).await?;
        bundle::build(&node, &ca)
    }

    /// Install script for a node, generated after a refresh.
    #[instrument(skip(self))]
    pub async fn install_script(&self, id: u64) -> Result<String> {
        let (node, _) = self.refresh(id).await?;
        Ok(self.installer.generate(&node))
    }

    /// Delete a node record and its artifact directory.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: u64) -> Result<()> {
        let guard = self.locks.acquire(id).await;
        let node = self.load(id).await?;
        if !self.store.delete_node(id).await? {
            return Err(ProvisionError::not_found(format!("node {id}")));
        }
        if let Err(e) = self.artifacts.remove(&node.name).await {
            warn!(node = %node.name, error = %e, "failed to remove node artifacts");
        }
        drop(guard);

        info!(node = %node.name, "node deleted");
        Ok(())
    }

    /// Build the outward view. Missing split subnet fields are derived from
    /// legacy storage where possible; this never fails.
    #[must_use]
    pub fn to_view(&self, node: &Node) -> NodeView {
        let mut cidr = node.subnet_cidr.clone();
        let mut host = node.subnet_host.clone();
        let fallback = if node.subnet_cidr.is_empty() {
            &node.subnet_ip
        } else {
            &node.subnet_cidr
        };
        if (cidr.is_empty() || host.is_empty()) && !fallback.is_empty() {
            if let Ok(derived) = subnet::normalize(fallback, None) {
                if cidr.is_empty() {
                    cidr = derived.cidr;
                }
                if host.is_empty() {
                    host = derived.host;
                }
            }
        }
        if host.is_empty() {
            host.clone_from(&node.subnet_ip);
        }
        if cidr.is_empty() {
            cidr.clone_from(&host);
        }

        NodeView {
            id: node.id,
            name: node.name.clone(),
            role: node.role,
            subnet_ip: cidr,
            subnet_host: host,
            public_ip: node.public_ip.clone(),
            port: node.port,
            tags: node.tags.clone(),
            proxy_mode: node.proxy_mode,
            install_command: self.installer.install_command(node),
            created_at: node.created_at.to_rfc3339(),
        }
    }

    /// Recompute a node's certificate and config, rewrite its files, then
    /// persist the row.
    async fn refresh(&self, id: u64) -> Result<(Node, CertificateAuthority)> {
        let _guard = self.locks.acquire(id).await;

        let mut node = self.load(id).await?;
        let ca = self.require_ca("no CA present").await?;
        let settings = self.settings.get().await?;

        backfill_subnet(&mut node, &settings)?;
        if node.port == 0 {
            node.port = settings.effective_port();
        }

        let issued = self
            .issuer
            .issue_node_certificate(
                &ca.certificate_pem,
                &ca.private_key_pem,
                &node.name,
                &node.subnet_cidr,
                settings.effective_validity_days(),
            )
            .await?;
        node.certificate_pem = issued.certificate_pem;
        node.private_key_pem = issued.private_key_pem;

        let lighthouses = self.lighthouses(&settings).await?;
        node.config_content = self.render(&node, lighthouses).await?;

        self.write_artifacts(&node, &ca).await?;
        let node = self.store.update_node(&node).await?;
        debug!(node = %node.name, "node artifacts refreshed");
        Ok((node, ca))
    }

    async fn load(&self, id: u64) -> Result<Node> {
        self.store
            .get_node(id)
            .await?
            .ok_or_else(|| ProvisionError::not_found(format!("node {id}")))
    }

    async fn require_ca(&self, message: &str) -> Result<CertificateAuthority> {
        self.ca
            .get()
            .await?
            .ok_or_else(|| ProvisionError::PreconditionFailed(message.to_string()))
    }

    async fn lighthouses(&self, settings: &NetworkSettings) -> Result<Vec<LighthouseEntry>> {
        let default_port = settings.effective_port();
        let nodes = self.store.list_nodes_by_role(NodeRole::Lighthouse).await?;
        Ok(nodes
            .iter()
            .map(|n| {
                let port = if n.port == 0 { default_port } else { n.port };
                let subnet_host = if n.subnet_host.is_empty() {
                    &n.subnet_ip
                } else {
                    &n.subnet_host
                };
                LighthouseEntry::new(&n.name, n.public_ip_str(), subnet_host, port)
            })
            .collect())
    }

    async fn render(&self, node: &Node, lighthouses: Vec<LighthouseEntry>) -> Result<String> {
        let template = self.templates.ensure_default().await?;
        let ctx = RenderContext {
            name: node.name.clone(),
            ca_cert_path: CA_CERT_FILE.to_string(),
            cert_path: node.cert_file_name(),
            key_path: node.key_file_name(),
            subnet_ip: node.subnet_host.clone(),
            subnet_cidr: node.subnet_cidr.clone(),
            public_ip: node.public_ip_str().to_string(),
            listen_port: node.port,
            is_lighthouse: node.is_lighthouse(),
            lighthouses,
            device_id: node.name.clone(),
        };
        template::render(&template.content, &ctx)
    }

    async fn write_artifacts(&self, node: &Node, ca: &CertificateAuthority) -> Result<()> {
        let files = NodeArtifacts {
            certificate: node.certificate_pem.clone(),
            private_key: node.private_key_pem.clone(),
            ca_cert: ca.certificate_pem.clone(),
            config: node.config_content.clone(),
        };
        self.artifacts.write(&node.name, &files).await.map(|_| ())
    }
}

/// Split legacy single-field subnet storage into `cidr` and `host`.
fn backfill_subnet(node: &mut Node, settings: &NetworkSettings) -> Result<()> {
    if !node.subnet_host.is_empty() && !node.subnet_cidr.is_empty() {
        node.subnet_ip.clone_from(&node.subnet_host);
        return Ok(());
    }
    let base = if node.subnet_cidr.is_empty() {
        &node.subnet_ip
    } else {
        &node.subnet_cidr
    };
    let subnet = subnet::normalize(base, Some(settings))?;
    node.subnet_ip.clone_from(&subnet.host);
    node.subnet_cidr = subnet.cidr;
    node.subnet_host = subnet.host;
    Ok(())
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
