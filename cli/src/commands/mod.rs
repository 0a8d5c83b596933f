pub mod listeners;
pub mod render;
pub mod schema;
pub mod status;

use crate::cli::{Cli, Commands, OutputFormat};
use crate::table_theme::TableTheme;
use anyhow::{Context, Result};
use ingress_core::io::{load_manifests, load_settings};
use ingress_core::snapshot::Snapshot;
use serde::Serialize;
use tabled::{Table, Tabled};
use tracing::debug;

/// Builds a snapshot from the manifests and settings named on the command line.
pub fn load_snapshot(cli: &Cli) -> Result<Snapshot> {
    let settings = load_settings(cli.settings.as_deref()).context("Unable to load settings")?;
    let manifests = load_manifests(&cli.manifests).context("Unable to load manifests")?;
    debug!("Loaded {} manifest(s) from {:?}", manifests.len(), cli.manifests);
    Ok(Snapshot::build(1, &manifests, settings))
}

/// Prints rows as a themed table, or serializes them for json/yaml output.
pub fn print_rows<T: Tabled + Serialize>(
    rows: &[T],
    cli: &Cli,
    emoji_columns: &[usize],
) -> Result<()> {
    match cli.output {
        OutputFormat::Table => {
            let table = Table::new(rows);
            let table = if cli.emoji {
                TableTheme::apply_with_emoji(table, emoji_columns)
            } else {
                TableTheme::apply_default(table)
            };
            println!("{table}");
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(rows)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(rows)?),
    }
    Ok(())
}

/// Main command dispatcher
pub fn handle_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Render { name } => render::handle_render_command(name.as_deref(), cli),
        Commands::Status { kind, strict } => {
            status::handle_status_command(kind.as_deref(), *strict, cli)
        }
        Commands::Listeners => listeners::handle_listeners_command(cli),
        Commands::Schema { document } => schema::handle_schema_command(*document),
    }
}
