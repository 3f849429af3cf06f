//! Command-line argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::output::OutputFormat;

/// Provision identities and configuration for Nebula overlay nodes
///
/// Generate a CA first, then create nodes. Every read of a node's
/// artifacts re-issues its certificate against the current CA.
#[derive(Parser, Debug)]
#[command(name = "nebula-manager")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (default: platform config dir)
    #[arg(short, long, env = "NEBULA_MANAGER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory for the record store and node artifacts
    #[arg(long, env = "NEBULA_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Use the built-in offline signer instead of nebula-cert; state lives
    /// under `<data-dir>/offline` (dry runs only)
    #[arg(long, global = true)]
    pub offline: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Increase verbosity
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Certificate authority
    Ca(CaArgs),

    /// Nodes and their artifacts
    Node(NodeArgs),

    /// Network-wide settings
    Settings(SettingsArgs),

    /// Configuration templates
    Template(TemplateArgs),
}

// ============================================================================
// CA command
// ============================================================================

#[derive(Args, Debug)]
pub struct CaArgs {
    #[command(subcommand)]
    pub command: CaCommands,
}

#[derive(Subcommand, Debug)]
pub enum CaCommands {
    /// Show the current CA (without key material)
    Show,

    /// Generate a new CA, replacing the current one
    Generate {
        /// CA common name
        name: String,

        /// Free-text description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Validity in days (0 = 365)
        #[arg(long, default_value = "0")]
        validity_days: i64,
    },

    /// Print the CA certificate
    Cert,
}

// ============================================================================
// Node command
// ============================================================================

#[derive(Args, Debug)]
pub struct NodeArgs {
    #[command(subcommand)]
    pub command: NodeCommands,
}

#[derive(Subcommand, Debug)]
pub enum NodeCommands {
    /// Provision a new node
    Create {
        /// Unique node name
        name: String,

        /// Node role (lighthouse or standard)
        #[arg(short, long, default_value = "standard")]
        role: String,

        /// Overlay address, optionally with /mask
        #[arg(short, long)]
        subnet: String,

        /// Publicly reachable address (lighthouses)
        #[arg(long)]
        public_ip: Option<String>,

        /// UDP listen port (default: network handshake port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Download proxy mode (ipv4 or ipv6)
        #[arg(long)]
        proxy_mode: Option<String>,
    },

    /// List nodes, newest first
    List,

    /// Show a node without refreshing it
    Show {
        /// Node id
        id: u64,
    },

    /// Refresh and print certificate, key, CA certificate and config
    Artifacts {
        /// Node id
        id: u64,
    },

    /// Refresh and print config.yml
    Config {
        /// Node id
        id: u64,
    },

    /// Refresh and print the install script
    InstallScript {
        /// Node id
        id: u64,
    },

    /// Refresh and write the .tar.gz bundle
    Bundle {
        /// Node id
        id: u64,

        /// Output file (default: <name>.tar.gz)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Delete a node and its artifacts
    Delete {
        /// Node id
        id: u64,
    },
}

// ============================================================================
// Settings command
// ============================================================================

#[derive(Args, Debug)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommands,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Show current settings
    Show,

    /// Update selected settings
    Update {
        /// Default subnet in CIDR notation
        #[arg(long)]
        default_subnet: Option<String>,

        /// Default handshake port
        #[arg(long)]
        handshake_port: Option<u16>,

        /// Lighthouse host list (free text)
        #[arg(long)]
        lighthouse_hosts: Option<String>,

        /// Node certificate validity in days
        #[arg(long)]
        validity_days: Option<i64>,

        /// Description
        #[arg(long)]
        description: Option<String>,
    },
}

// ============================================================================
// Template command
// ============================================================================

#[derive(Args, Debug)]
pub struct TemplateArgs {
    #[command(subcommand)]
    pub command: TemplateCommands,
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommands {
    /// List templates
    List,

    /// Print a template body
    Show {
        /// Template name
        name: String,
    },

    /// Create or replace a template from a file
    Upsert {
        /// Template name
        name: String,

        /// File holding the template body
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Delete a template
    Delete {
        /// Template id
        id: u64,
    },
}
