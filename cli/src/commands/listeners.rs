use super::{load_snapshot, print_rows};
use crate::cli::Cli;
use anyhow::Result;
use ingress_core::snapshot::Snapshot;
use serde::Serialize;
use tabled::Tabled;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct ListenerRow {
    pub name: String,
    pub protocol: String,
    pub port: u16,
    pub ssl: bool,
    pub address: String,
    pub accepted: bool,
    pub error: String,
}

/// Accepted listeners first, in name order, then rejected declarations.
pub fn listener_rows(snapshot: &Snapshot) -> Vec<ListenerRow> {
    let accepted = snapshot.registry().listeners().map(|listener| {
        let address = [
            listener.ipv4().map(|ip| ip.to_string()),
            listener.ipv6().map(|ip| format!("[{ip}]")),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ");

        ListenerRow {
            name: listener.name().clone(),
            protocol: listener.protocol().to_string(),
            port: listener.port().get(),
            ssl: listener.ssl(),
            address,
            accepted: true,
            error: String::new(),
        }
    });

    let rejected = snapshot
        .registry_errors()
        .iter()
        .map(|error| ListenerRow {
            name: error.listener_name().to_string(),
            protocol: String::new(),
            port: 0,
            ssl: false,
            address: String::new(),
            accepted: false,
            error: error.to_string(),
        });

    accepted.chain(rejected).collect()
}

pub fn handle_listeners_command(cli: &Cli) -> Result<()> {
    let snapshot = load_snapshot(cli)?;
    if !snapshot.registry().is_deployed() {
        eprintln!("No GlobalConfiguration is deployed");
        return Ok(());
    }
    print_rows(&listener_rows(&snapshot), cli, &[3, 5])
}
