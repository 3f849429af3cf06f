//! `nebula-manager template` - Configuration templates.

use anyhow::{Context as _, Result};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use super::Context;
use crate::cli::args::{TemplateArgs, TemplateCommands};
use crate::output::OutputFormat;

#[derive(Tabled)]
struct TemplateRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Lines")]
    lines: usize,
    #[tabled(rename = "Updated")]
    updated: String,
}

pub async fn execute(ctx: Context, args: TemplateArgs) -> Result<()> {
    let templates = ctx.provisioner.templates();

    match args.command {
        TemplateCommands::List => {
            // Make sure the built-in default shows up even before the first node.
            templates.ensure_default().await?;
            let all = templates.list().await?;

            match ctx.output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&all)?);
                }
                OutputFormat::Pretty => {
                    let rows: Vec<TemplateRow> = all
                        .iter()
                        .map(|t| TemplateRow {
                            id: t.id,
                            name: t.name.clone(),
                            lines: t.content.lines().count(),
                            updated: t.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                        })
                        .collect();
                    println!("{}", Table::new(&rows).with(Style::rounded()));
                }
            }
        }
        TemplateCommands::Show { name } => {
            let template = templates.get_by_name(&name).await?;
            match ctx.output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&template)?);
                }
                OutputFormat::Pretty => print!("{}", template.content),
            }
        }
        TemplateCommands::Upsert { name, file } => {
            let content = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let template = templates.upsert(&name, &content).await?;
            match ctx.output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&template)?);
                }
                OutputFormat::Pretty => {
                    println!("{} template {}", "Saved".green(), template.name.cyan());
                }
            }
        }
        TemplateCommands::Delete { id } => {
            templates.delete(id).await?;
            match ctx.output_format {
                OutputFormat::Json => println!("{}", serde_json::json!({ "deleted": id })),
                OutputFormat::Pretty => println!("{} template {}", "Deleted".green(), id),
            }
        }
    }

    Ok(())
}
