//! `nebula-manager ca` - Certificate authority.

use anyhow::Result;
use colored::Colorize;
use nebula_core::{CaSummary, CreateCaRequest};

use super::Context;
use crate::cli::args::{CaArgs, CaCommands};
use crate::output::OutputFormat;

pub async fn execute(ctx: Context, args: CaArgs) -> Result<()> {
    match args.command {
        CaCommands::Show => show(ctx).await,
        CaCommands::Generate {
            name,
            description,
            validity_days,
        } => generate(ctx, name, description, validity_days).await,
        CaCommands::Cert => {
            print!("{}", ctx.provisioner.ca().certificate().await?);
            Ok(())
        }
    }
}

async fn show(ctx: Context) -> Result<()> {
    let summary = ctx.provisioner.ca().get().await?.map(|ca| ca.summary());

    match ctx.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Pretty => match summary {
            Some(ca) => print_summary(&ca),
            None => {
                println!("  No certificate authority yet.");
                println!();
                println!("  Create one with: {} ca generate <NAME>", "nebula-manager".cyan());
            }
        },
    }

    Ok(())
}

async fn generate(ctx: Context, name: String, description: String, validity_days: i64) -> Result<()> {
    let ca = ctx
        .provisioner
        .ca()
        .generate_or_replace(CreateCaRequest {
            name,
            description,
            validity_days,
        })
        .await?;
    let summary = ca.summary();

    match ctx.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Pretty => {
            println!("{}", "Certificate authority generated".green().bold());
            print_summary(&summary);
            println!();
            println!(
                "{}",
                "Existing node certificates are re-issued on their next read.".dimmed()
            );
        }
    }

    Ok(())
}

fn print_summary(ca: &CaSummary) {
    println!("  {:<12} {}", "ID:".bold(), ca.id);
    println!("  {:<12} {}", "Name:".bold(), ca.name.cyan());
    if !ca.description.is_empty() {
        println!("  {:<12} {}", "Description:".bold(), ca.description);
    }
    println!("  {:<12} {}", "Created:".bold(), ca.created_at.to_rfc3339());
}
