//! `nebula-manager settings` - Network-wide settings.

use anyhow::Result;
use colored::Colorize;
use nebula_core::{NetworkSettings, SettingsUpdate};

use super::Context;
use crate::cli::args::{SettingsArgs, SettingsCommands};
use crate::output::OutputFormat;

pub async fn execute(ctx: Context, args: SettingsArgs) -> Result<()> {
    let settings = match args.command {
        SettingsCommands::Show => ctx.provisioner.settings().get().await?,
        SettingsCommands::Update {
            default_subnet,
            handshake_port,
            lighthouse_hosts,
            validity_days,
            description,
        } => {
            ctx.provisioner
                .settings()
                .update(SettingsUpdate {
                    default_subnet,
                    handshake_port,
                    lighthouse_hosts,
                    certificate_validity_days: validity_days,
                    description,
                })
                .await?
        }
    };

    print_settings(&ctx, &settings)
}

fn print_settings(ctx: &Context, settings: &NetworkSettings) -> Result<()> {
    match ctx.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(settings)?);
        }
        OutputFormat::Pretty => {
            println!("{}", "Network settings".bold());
            println!();
            println!("  {:<16} {}", "Default subnet:", settings.default_subnet.cyan());
            println!("  {:<16} {}", "Handshake port:", settings.handshake_port);
            println!(
                "  {:<16} {} days",
                "Cert validity:", settings.certificate_validity_days
            );
            if !settings.lighthouse_hosts.is_empty() {
                println!("  {:<16} {}", "Lighthouses:", settings.lighthouse_hosts);
            }
            if !settings.description.is_empty() {
                println!("  {:<16} {}", "Description:", settings.description);
            }
        }
    }

    Ok(())
}
