//! `nebula-manager node` - Nodes and their artifacts.

use anyhow::{Context as _, Result};
use colored::Colorize;
use nebula_core::{CreateNodeRequest, NodeView};
use std::path::PathBuf;
use tabled::{settings::Style, Table, Tabled};

use super::Context;
use crate::cli::args::{NodeArgs, NodeCommands};
use crate::output::OutputFormat;

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Subnet")]
    subnet: String,
    #[tabled(rename = "Public")]
    public: String,
    #[tabled(rename = "Port")]
    port: u16,
    #[tabled(rename = "Tags")]
    tags: String,
}

impl From<&NodeView> for NodeRow {
    fn from(node: &NodeView) -> Self {
        Self {
            id: node.id,
            name: node.name.clone(),
            role: node.role.to_string(),
            subnet: node.subnet_ip.clone(),
            public: node.public_ip.clone().unwrap_or_default(),
            port: node.port,
            tags: node.tags.join(","),
        }
    }
}

pub async fn execute(ctx: Context, args: NodeArgs) -> Result<()> {
    match args.command {
        NodeCommands::Create {
            name,
            role,
            subnet,
            public_ip,
            port,
            tags,
            proxy_mode,
        } => {
            let req = CreateNodeRequest {
                name,
                role,
                subnet_ip: subnet,
                public_ip,
                port,
                tags,
                proxy_mode,
            };
            create(ctx, req).await
        }
        NodeCommands::List => list(ctx).await,
        NodeCommands::Show { id } => {
            let node = ctx.provisioner.get(id).await?;
            print_node(&ctx, &node)
        }
        NodeCommands::Artifacts { id } => artifacts(ctx, id).await,
        NodeCommands::Config { id } => {
            print!("{}", ctx.provisioner.config(id).await?);
            Ok(())
        }
        NodeCommands::InstallScript { id } => {
            print!("{}", ctx.provisioner.install_script(id).await?);
            Ok(())
        }
        NodeCommands::Bundle { id, file } => bundle(ctx, id, file).await,
        NodeCommands::Delete { id } => delete(ctx, id).await,
    }
}

async fn create(ctx: Context, req: CreateNodeRequest) -> Result<()> {
    let node = ctx.provisioner.create(req).await?;

    if ctx.output_format == OutputFormat::Pretty {
        println!("{}", "Node provisioned".green().bold());
        println!();
    }
    print_node(&ctx, &node)
}

async fn list(ctx: Context) -> Result<()> {
    let nodes = ctx.provisioner.list().await?;

    match ctx.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&nodes)?);
        }
        OutputFormat::Pretty => {
            if nodes.is_empty() {
                println!("  No nodes yet.");
                println!();
                println!(
                    "  Create one with: {} node create <NAME> --subnet <IP>",
                    "nebula-manager".cyan()
                );
                return Ok(());
            }

            let rows: Vec<NodeRow> = nodes.iter().map(NodeRow::from).collect();
            let table = Table::new(&rows).with(Style::rounded()).to_string();
            println!("{table}");
        }
    }

    Ok(())
}

async fn artifacts(ctx: Context, id: u64) -> Result<()> {
    let artifacts = ctx.provisioner.artifacts(id).await?;

    match ctx.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&artifacts)?);
        }
        OutputFormat::Pretty => {
            for (label, body) in [
                ("Certificate", &artifacts.certificate),
                ("Private key", &artifacts.private_key),
                ("CA certificate", &artifacts.ca_cert),
                ("Config", &artifacts.config),
            ] {
                println!("{}", format!("# {label}").bold());
                println!("{}", body.trim_end());
                println!();
            }
        }
    }

    Ok(())
}

async fn bundle(ctx: Context, id: u64, file: Option<PathBuf>) -> Result<()> {
    let node = ctx.provisioner.get(id).await?;
    let bytes = ctx.provisioner.bundle(id).await?;

    let path = file.unwrap_or_else(|| PathBuf::from(format!("{}.tar.gz", node.name)));
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    match ctx.output_format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "id": id,
                "path": path,
                "bytes": bytes.len(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Pretty => {
            println!(
                "Wrote {} ({} bytes)",
                path.display().to_string().cyan(),
                bytes.len()
            );
        }
    }

    Ok(())
}

async fn delete(ctx: Context, id: u64) -> Result<()> {
    ctx.provisioner.delete(id).await?;

    match ctx.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "deleted": id }));
        }
        OutputFormat::Pretty => {
            println!("{} node {}", "Deleted".green(), id);
        }
    }

    Ok(())
}

fn print_node(ctx: &Context, node: &NodeView) -> Result<()> {
    match ctx.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(node)?);
        }
        OutputFormat::Pretty => {
            println!("  {:<10} {}", "ID:".bold(), node.id);
            println!("  {:<10} {}", "Name:".bold(), node.name.cyan());
            println!("  {:<10} {}", "Role:".bold(), node.role);
            println!("  {:<10} {}", "Subnet:".bold(), node.subnet_ip);
            if let Some(ip) = &node.public_ip {
                println!("  {:<10} {}", "Public:".bold(), ip);
            }
            println!("  {:<10} {}", "Port:".bold(), node.port);
            if !node.tags.is_empty() {
                println!("  {:<10} {}", "Tags:".bold(), node.tags.join(", "));
            }
            if let Some(mode) = node.proxy_mode {
                println!("  {:<10} {}", "Proxy:".bold(), mode);
            }
            println!("  {:<10} {}", "Created:".bold(), node.created_at);
            println!();
            println!("{}", "Install on the host with:".dimmed());
            println!("  {}", node.install_command);
        }
    }

    Ok(())
}
