use super::{load_snapshot, print_rows};
use crate::cli::Cli;
use anyhow::{Result, bail};
use ingress_core::reconcile::reconcile_all;
use ingress_core::snapshot::Snapshot;
use ingress_core::status::State;
use serde::Serialize;
use tabled::Tabled;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct StatusRow {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub state: State,
    pub reason: String,
    pub message: String,
}

pub fn status_rows(snapshot: &Snapshot, kind: Option<&str>) -> Vec<StatusRow> {
    reconcile_all(snapshot)
        .into_iter()
        .filter(|reconciliation| {
            kind.is_none_or(|kind| {
                reconciliation
                    .resource()
                    .kind()
                    .to_string()
                    .eq_ignore_ascii_case(kind)
            })
        })
        .map(|reconciliation| {
            let resource = reconciliation.resource();
            let status = reconciliation.status();
            StatusRow {
                kind: resource.kind().to_string(),
                namespace: resource.namespace().clone(),
                name: resource.name().clone(),
                state: status.state(),
                reason: status.reason().to_string(),
                message: status.message().clone(),
            }
        })
        .collect()
}

pub fn handle_status_command(kind: Option<&str>, strict: bool, cli: &Cli) -> Result<()> {
    let snapshot = load_snapshot(cli)?;
    let rows = status_rows(&snapshot, kind);
    print_rows(&rows, cli, &[3])?;

    let invalid = rows.iter().filter(|row| row.state == State::Invalid).count();
    if strict && invalid > 0 {
        bail!("{invalid} resource(s) are invalid");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingress_core::resources::{ManifestSet, read_manifests};
    use ingress_core::settings::Settings;
    use rstest::rstest;

    const MANIFESTS: &str = r"
kind: Policy
metadata:
  name: rate-limit
spec:
  rateLimit:
    rate: 10r/s
    key: ${binary_remote_addr}
---
kind: VirtualServer
metadata:
  name: cafe
spec:
  host: cafe.example.com
  listener:
    http: http-8085
";

    fn snapshot() -> Snapshot {
        let manifests: ManifestSet = read_manifests(MANIFESTS.as_bytes())
            .map(|manifests| manifests.into_iter().collect())
            .unwrap_or_default();
        Snapshot::build(1, &manifests, Settings::default())
    }

    #[rstest]
    #[case(None, 2)]
    #[case(Some("virtualserver"), 1)]
    #[case(Some("Policy"), 1)]
    #[case(Some("TransportServer"), 0)]
    fn test_status_rows_filter(#[case] kind: Option<&str>, #[case] expected: usize) {
        assert_eq!(status_rows(&snapshot(), kind).len(), expected);
    }

    #[test]
    fn test_status_row_content() {
        let rows = status_rows(&snapshot(), Some("VirtualServer"));
        assert_eq!(rows[0].name, "cafe");
        assert_eq!(rows[0].state, State::Warning);
        assert_eq!(
            rows[0].message,
            "Listeners defined, but no GlobalConfiguration is deployed"
        );
    }
}
