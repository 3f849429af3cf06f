//! CLI argument parsing and command dispatch.

pub mod args;
pub mod commands;

use anyhow::Result;
use args::{Cli, Commands};
use clap::Parser;
use nebula_provision::{FakeSigner, JsonFileStore, NebulaCertSigner, NodeProvisioner, Signer};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::output::OutputFormat;

/// Run the CLI application.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let mut config = crate::config::load(cli.config.as_deref(), cli.data_dir.as_deref())?;
    if cli.offline {
        config = crate::config::offline(config);
        info!(data_dir = %config.data_dir.display(), "offline mode, certificates are not real");
    }
    debug!(data_dir = %config.data_dir.display(), "configuration loaded");

    let store = JsonFileStore::open(config.store_path()).await?;
    debug!(store = %store.path().display(), "store opened");
    let signer: Arc<dyn Signer> = if cli.offline {
        Arc::new(FakeSigner::new())
    } else {
        Arc::new(NebulaCertSigner::from_config(&config.signer))
    };
    let provisioner = NodeProvisioner::new(Arc::new(store), signer, &config);

    let ctx = commands::Context {
        provisioner: Arc::new(provisioner),
        output_format: cli.output.unwrap_or_default(),
    };

    match cli.command {
        Commands::Ca(args) => commands::ca::execute(ctx, args).await,
        Commands::Node(args) => commands::node::execute(ctx, args).await,
        Commands::Settings(args) => commands::settings::execute(ctx, args).await,
        Commands::Template(args) => commands::template::execute(ctx, args).await,
    }
}

/// Logs go to stderr so command output stays pipeable.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}
