//! nebula-manager - Nebula overlay node provisioning
//!
//! Issues node certificates, renders configs, and produces install bundles.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    nebula_cli::run().await
}
