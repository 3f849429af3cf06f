//! Configuration templates.
//!
//! Node configuration is rendered with [Tera](https://keats.github.io/tera/)
//! from a named template body stored alongside the nodes. Bodies support
//! substitution, `{% if %}`, `{% for %}`, and `{%- -%}` whitespace control.

mod defaults;

pub use defaults::{DEFAULT_TEMPLATE, DEFAULT_TEMPLATE_NAME, LEGACY_DEFAULT_TEMPLATE};

use nebula_core::{ConfigTemplate, ProvisionError, Result};
use serde::Serialize;
use std::error::Error as _;
use std::sync::Arc;
use tera::{Context, Tera};
use tracing::{debug, info};

use crate::store::Store;

/// A lighthouse as seen by the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LighthouseEntry {
    /// Node name
    pub name: String,
    /// Public address, empty when unset
    pub public_ip: String,
    /// Overlay address without mask
    pub subnet_ip: String,
    /// Listen port
    pub port: u16,
    /// `public_ip:port`, empty when the lighthouse has no public address
    pub public_host: String,
}

impl LighthouseEntry {
    /// Build an entry, deriving `public_host` from the address and port.
    #[must_use]
    pub fn new(name: &str, public_ip: &str, subnet_ip: &str, port: u16) -> Self {
        let public_host = if public_ip.is_empty() {
            String::new()
        } else {
            format!("{public_ip}:{port}")
        };
        Self {
            name: name.to_string(),
            public_ip: public_ip.to_string(),
            subnet_ip: subnet_ip.to_string(),
            port,
            public_host,
        }
    }
}

/// Values available to a template body.
#[derive(Debug, Clone, Serialize)]
pub struct RenderContext {
    /// Node name
    pub name: String,
    /// CA certificate path as referenced from the config
    pub ca_cert_path: String,
    /// Node certificate path
    pub cert_path: String,
    /// Node key path
    pub key_path: String,
    /// Overlay address without mask
    pub subnet_ip: String,
    /// Overlay address with mask
    pub subnet_cidr: String,
    /// Public address, empty when unset
    pub public_ip: String,
    /// UDP listen port
    pub listen_port: u16,
    /// Whether this node is a lighthouse
    pub is_lighthouse: bool,
    /// Every lighthouse, in store order
    pub lighthouses: Vec<LighthouseEntry>,
    /// Tun device suffix
    pub device_id: String,
}

/// Render `body` with `ctx`. Autoescaping is off; the output is YAML.
pub fn render(body: &str, ctx: &RenderContext) -> Result<String> {
    let context = Context::from_serialize(ctx).map_err(|e| template_error(&e))?;
    Tera::one_off(body, &context, false).map_err(|e| template_error(&e))
}

/// Tera keeps the useful part of a message (which variable, which line) in
/// the source chain.
fn template_error(err: &tera::Error) -> ProvisionError {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    ProvisionError::Template(message)
}

/// Catalogue of stored template bodies.
#[derive(Clone)]
pub struct TemplateService {
    store: Arc<dyn Store>,
}

impl TemplateService {
    /// Create a service over the given store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Return the `default` template, creating or migrating it as needed.
    pub async fn ensure_default(&self) -> Result<ConfigTemplate> {
        match self.store.get_template(DEFAULT_TEMPLATE_NAME).await? {
            None => {
                info!("creating default config template");
                self.store
                    .save_template(ConfigTemplate::new(DEFAULT_TEMPLATE_NAME, DEFAULT_TEMPLATE))
                    .await
            }
            Some(existing) if existing.content == LEGACY_DEFAULT_TEMPLATE => {
                info!(id = existing.id, "migrating legacy default template");
                self.store
                    .save_template(ConfigTemplate::new(DEFAULT_TEMPLATE_NAME, DEFAULT_TEMPLATE))
                    .await
            }
            Some(existing) => Ok(existing),
        }
    }

    /// All templates, ordered by name.
    pub async fn list(&self) -> Result<Vec<ConfigTemplate>> {
        self.store.list_templates().await
    }

    /// Template by name.
    pub async fn get_by_name(&self, name: &str) -> Result<ConfigTemplate> {
        self.store
            .get_template(name)
            .await?
            .ok_or_else(|| ProvisionError::not_found(format!("template {name}")))
    }

    /// Create a template or replace the body of an existing one.
    pub async fn upsert(&self, name: &str, content: &str) -> Result<ConfigTemplate> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProvisionError::Validation("template name is required".into()));
        }
        debug!(name, "saving config template");
        self.store
            .save_template(ConfigTemplate::new(name, content))
            .await
    }

    /// Delete a template by id.
    pub async fn delete(&self, id: u64) -> Result<()> {
        if self.store.delete_template(id).await? {
            Ok(())
        } else {
            Err(ProvisionError::not_found(format!("template {id}")))
        }
    }
}
