//! Shared helpers for the reconciliation scenario tests

#![allow(dead_code)]

use ingress_core::reconcile::{Reconciliation, reconcile_resource};
use ingress_core::resources::{ManifestSet, ObjectRef, ResourceKind, read_manifests};
use ingress_core::settings::Settings;
use ingress_core::snapshot::Snapshot;

pub fn snapshot_with(documents: &[&str], settings: Settings) -> Snapshot {
    let yaml = documents.join("\n---\n");
    let manifests: ManifestSet = match read_manifests(yaml.as_bytes()) {
        Ok(manifests) => manifests.into_iter().collect(),
        Err(err) => panic!("invalid test manifests: {err}"),
    };
    Snapshot::build(1, &manifests, settings)
}

pub fn snapshot(documents: &[&str]) -> Snapshot {
    snapshot_with(documents, Settings::default())
}

pub fn virtual_server(name: &str) -> ObjectRef {
    ObjectRef::builder()
        .kind(ResourceKind::VirtualServer)
        .namespace("default")
        .name(name)
        .build()
}

pub fn reconcile(snapshot: &Snapshot, object_ref: &ObjectRef) -> Reconciliation {
    match reconcile_resource(snapshot, object_ref) {
        Some(reconciliation) => reconciliation,
        None => panic!("{object_ref} is not in the snapshot"),
    }
}

pub fn config_text(reconciliation: &Reconciliation) -> &str {
    match reconciliation.config() {
        Some(config) => config.text(),
        None => panic!("{} produced no configuration", reconciliation.resource()),
    }
}

/// Reads the `rate=` parameter of the first `limit_req_zone` directive as
/// requests per second, scaled by 1000 the way the proxy stores it.
pub fn emitted_rate_millis(config: &str) -> Option<u64> {
    let rate = config
        .lines()
        .find(|line| line.trim_start().starts_with("limit_req_zone"))?
        .split_whitespace()
        .find_map(|param| param.strip_prefix("rate="))?
        .trim_end_matches(';');
    let (count, unit) = rate.split_once("r/")?;
    let count: u64 = count.parse().ok()?;
    match unit {
        "s" => Some(count * 1000),
        "m" => Some(count * 1000 / 60),
        _ => None,
    }
}

/// Model of the proxy's `limit_req` leaky bucket for a single key: a request
/// is admitted when the bucket, drained at `rate` since the last admitted
/// request, can take it without exceeding `burst`.
pub struct LeakyBucket {
    rate_millis: u64,
    burst_millis: u64,
    excess: Option<u64>,
    last_ms: u64,
}

impl LeakyBucket {
    pub fn new(rate_millis: u64, burst: u64) -> Self {
        Self {
            rate_millis,
            burst_millis: burst * 1000,
            excess: None,
            last_ms: 0,
        }
    }

    /// Returns the response status for a request arriving at `now_ms`.
    pub fn request(&mut self, now_ms: u64) -> u16 {
        let Some(previous) = self.excess else {
            self.excess = Some(0);
            self.last_ms = now_ms;
            return 200;
        };

        let elapsed = now_ms.saturating_sub(self.last_ms);
        let drained = self.rate_millis * elapsed / 1000;
        let excess = (previous + 1000).saturating_sub(drained);
        if excess > self.burst_millis {
            return 503;
        }
        self.excess = Some(excess);
        self.last_ms = now_ms;
        200
    }
}

/// Status codes for requests sent every `interval_ms` during `duration_ms`.
pub fn send_continuously(bucket: &mut LeakyBucket, duration_ms: u64, interval_ms: u64) -> Vec<u16> {
    (0..duration_ms)
        .step_by(usize::try_from(interval_ms).unwrap_or(1))
        .map(|now| bucket.request(now))
        .collect()
}

/// The body of the `location {path}` block of a rendered server.
pub fn location_block<'a>(config: &'a str, path: &str) -> Option<&'a str> {
    let start = config.find(&format!("location {path} {{"))?;
    let rest = &config[start..];
    let end = rest.find("\n    }")?;
    Some(&rest[..end])
}
