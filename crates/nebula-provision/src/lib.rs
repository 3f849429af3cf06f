//! nebula-provision: identity and configuration provisioning for Nebula
//! overlay nodes.
//!
//! # Pipeline
//!
//! - [`subnet`] normalizes free-form node addresses into `host/mask`
//! - [`issuer`] issues CA and node certificates through a [`signer::Signer`]
//! - [`ca`] owns the single certificate authority
//! - [`template`] renders `config.yml` from stored Tera templates
//! - [`artifacts`] writes per-node files under `<data_dir>/nodes/<name>/`
//! - [`bundle`] packs those files into a `.tar.gz`
//! - [`install`] produces the bootstrap command and install script
//! - [`orchestrator`] drives all of the above for create, read and delete
//!
//! Records live behind the [`store::Store`] trait.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use nebula_core::{CreateCaRequest, CreateNodeRequest};
//! use nebula_provision::{ManagerConfig, MemoryStore, NebulaCertSigner, NodeProvisioner};
//!
//! # async fn example() -> nebula_provision::Result<()> {
//! let config = ManagerConfig::default();
//! let provisioner = NodeProvisioner::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(NebulaCertSigner::from_config(&config.signer)),
//!     &config,
//! );
//!
//! provisioner
//!     .ca()
//!     .generate_or_replace(CreateCaRequest {
//!         name: "corp".into(),
//!         ..Default::default()
//!     })
//!     .await?;
//!
//! let node = provisioner
//!     .create(CreateNodeRequest {
//!         name: "lighthouse-1".into(),
//!         role: "lighthouse".into(),
//!         subnet_ip: "10.10.0.1".into(),
//!         public_ip: Some("203.0.113.10".into()),
//!         ..Default::default()
//!     })
//!     .await?;
//! println!("{}", node.install_command);
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod bundle;
pub mod ca;
pub mod config;
pub mod install;
pub mod issuer;
pub mod orchestrator;
pub mod settings;
pub mod signer;
pub mod store;
pub mod subnet;
pub mod template;

// Re-exports for convenience.
pub use ca::CaManager;
pub use config::ManagerConfig;
pub use nebula_core::{ProvisionError, Result};
pub use orchestrator::NodeProvisioner;
pub use settings::SettingsService;
pub use signer::{FakeSigner, NebulaCertSigner, Signer};
pub use store::{JsonFileStore, MemoryStore, Store};
pub use template::TemplateService;
