//! Command implementations.

pub mod ca;
pub mod node;
pub mod settings;
pub mod template;

use nebula_provision::NodeProvisioner;
use std::sync::Arc;

use crate::output::OutputFormat;

/// Shared context for all commands.
#[derive(Clone)]
pub struct Context {
    /// Wired provisioning pipeline
    pub provisioner: Arc<NodeProvisioner>,

    /// Output format
    pub output_format: OutputFormat,
}
