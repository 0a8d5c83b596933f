use super::load_snapshot;
use crate::cli::{Cli, OutputFormat};
use anyhow::Result;
use ingress_core::emitter::CompiledConfig;
use ingress_core::reconcile::{reconcile_all, reconcile_zone_sync};
use ingress_core::snapshot::Snapshot;

/// Configurations of the snapshot, optionally only those of resources named `name`.
pub fn compiled_configs(snapshot: &Snapshot, name: Option<&str>) -> Vec<CompiledConfig> {
    let configs = reconcile_all(snapshot)
        .into_iter()
        .filter(|reconciliation| name.is_none_or(|name| reconciliation.resource().name() == name))
        .filter_map(|reconciliation| reconciliation.config().clone());

    match name {
        Some(_) => configs.collect(),
        None => configs.chain(reconcile_zone_sync(snapshot)).collect(),
    }
}

pub fn handle_render_command(name: Option<&str>, cli: &Cli) -> Result<()> {
    let snapshot = load_snapshot(cli)?;
    let configs = compiled_configs(&snapshot, name);

    match cli.output {
        OutputFormat::Table => {
            for config in &configs {
                println!("# {}", config.file_name());
                print!("{}", config.text());
                println!();
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&configs)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&configs)?),
    }
    Ok(())
}
