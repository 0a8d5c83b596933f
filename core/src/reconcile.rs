use crate::emitter::{
    CompiledConfig, EmitterSettings, emit_transport_server, emit_virtual_server, emit_zone_sync,
};
use crate::instrumentation::record_reconciliation;
use crate::listeners::{bind, bind_virtual_server, transport_server_reference};
use crate::policies::{PolicyReference, PolicyScope, Resolution, resolve};
use crate::resources::{
    ObjectRef, Resource, ResourceKind, TransportServer, VirtualServer, validate_transport_server,
    validate_virtual_server,
};
use crate::snapshot::Snapshot;
use crate::status::{
    ResourceStatus, report, report_claim_conflict, report_global_configuration,
    report_ignored_global_configuration, report_policy,
};
use getset::Getters;
use tracing::{debug, info};

/// The outcome of reconciling one resource against one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Reconciliation {
    #[getset(get = "pub")]
    resource: ObjectRef,

    /// `None` when the resource contributes no configuration.
    #[getset(get = "pub")]
    config: Option<CompiledConfig>,

    #[getset(get = "pub")]
    status: ResourceStatus,
}

impl Reconciliation {
    fn new(resource: ObjectRef, config: Option<CompiledConfig>, status: ResourceStatus) -> Self {
        record_reconciliation(resource.kind(), status.state());
        debug!(
            "Reconciled {}: {} ({})",
            resource,
            status.state(),
            status.message()
        );
        Self {
            resource,
            config,
            status,
        }
    }
}

fn policy_references(
    refs: &[crate::resources::PolicyRef],
    namespace: &str,
    scope: PolicyScope,
) -> Vec<PolicyReference> {
    refs.iter()
        .map(|policy_ref| PolicyReference::from_ref(policy_ref, namespace, scope))
        .collect()
}

pub fn reconcile_virtual_server(snapshot: &Snapshot, virtual_server: &VirtualServer) -> Reconciliation {
    let object_ref = virtual_server.object_ref();
    let errors = validate_virtual_server(virtual_server);
    if !errors.is_empty() {
        let status = ResourceStatus::invalid_resource(&object_ref, &errors);
        return Reconciliation::new(object_ref, None, status);
    }

    let spec = virtual_server.spec();
    let namespace = object_ref.namespace().as_str();
    let binding = bind_virtual_server(snapshot.registry(), spec);

    let spec_references = policy_references(spec.policies(), namespace, PolicyScope::Spec);
    let resolutions: Vec<Resolution> = spec
        .routes()
        .iter()
        .map(|route| {
            let route_references =
                policy_references(route.policies(), namespace, PolicyScope::Route);
            resolve(
                &spec_references,
                &route_references,
                snapshot.policies(),
                snapshot.replicas(),
            )
        })
        .collect();

    let config = emit_virtual_server(
        virtual_server,
        &binding,
        &resolutions,
        &EmitterSettings::from(snapshot.settings()),
    );
    let status = if resolutions.is_empty() {
        let spec_only = resolve(
            &spec_references,
            &[],
            snapshot.policies(),
            snapshot.replicas(),
        );
        report(&object_ref, &binding, std::slice::from_ref(&spec_only))
    } else {
        report(&object_ref, &binding, &resolutions)
    };

    Reconciliation::new(object_ref, Some(config), status)
}

pub fn reconcile_transport_server(
    snapshot: &Snapshot,
    transport_server: &TransportServer,
) -> Reconciliation {
    let object_ref = transport_server.object_ref();
    let errors = validate_transport_server(transport_server);
    if !errors.is_empty() {
        let status = ResourceStatus::invalid_resource(&object_ref, &errors);
        return Reconciliation::new(object_ref, None, status);
    }

    if let Err(conflict) = snapshot.claims().check(transport_server) {
        return Reconciliation::new(object_ref, None, report_claim_conflict(&conflict));
    }

    let references: Vec<_> = transport_server_reference(transport_server.spec())
        .into_iter()
        .collect();
    let binding = bind(snapshot.registry(), &references);
    match binding.bound().next() {
        Some((_, listener)) => {
            let config = emit_transport_server(
                transport_server,
                listener,
                &EmitterSettings::from(snapshot.settings()),
            );
            Reconciliation::new(object_ref.clone(), Some(config), ResourceStatus::valid(&object_ref))
        }
        None => Reconciliation::new(object_ref, None, ResourceStatus::warning(binding.messages())),
    }
}

fn reconcile_global_configuration(snapshot: &Snapshot, object_ref: &ObjectRef) -> Reconciliation {
    let selected = snapshot.selected_global_configuration().as_ref();
    let status = if selected == Some(object_ref) {
        report_global_configuration(
            object_ref,
            snapshot.registry().len(),
            snapshot.registry_errors(),
        )
    } else {
        report_ignored_global_configuration(selected)
    };
    Reconciliation::new(object_ref.clone(), None, status)
}

fn reconcile_policy(snapshot: &Snapshot, object_ref: &ObjectRef) -> Option<Reconciliation> {
    snapshot
        .policies()
        .entries()
        .find(|(_, entry)| entry.object_ref() == object_ref)
        .map(|(_, entry)| Reconciliation::new(object_ref.clone(), None, report_policy(entry)))
}

/// Reconciles a single resource, or `None` when the snapshot no longer
/// contains it.
pub fn reconcile_resource(snapshot: &Snapshot, object_ref: &ObjectRef) -> Option<Reconciliation> {
    match object_ref.kind() {
        ResourceKind::VirtualServer => snapshot
            .virtual_servers()
            .get(object_ref)
            .map(|vs| reconcile_virtual_server(snapshot, vs)),
        ResourceKind::TransportServer => snapshot
            .transport_servers()
            .get(object_ref)
            .map(|ts| reconcile_transport_server(snapshot, ts)),
        ResourceKind::GlobalConfiguration => snapshot
            .global_configurations()
            .contains_key(object_ref)
            .then(|| reconcile_global_configuration(snapshot, object_ref)),
        ResourceKind::Policy => reconcile_policy(snapshot, object_ref),
        ResourceKind::ControllerState => None,
    }
}

/// Reconciles every resource of the snapshot, in the snapshot's order.
pub fn reconcile_all(snapshot: &Snapshot) -> Vec<Reconciliation> {
    let reconciliations: Vec<Reconciliation> = snapshot
        .resources()
        .filter_map(|object_ref| reconcile_resource(snapshot, object_ref))
        .collect();
    info!(
        "Reconciled {} resource(s) from snapshot {}",
        reconciliations.len(),
        snapshot.version()
    );
    reconciliations
}

/// The shared zone-sync stream server, when enabled.
pub fn reconcile_zone_sync(snapshot: &Snapshot) -> Option<CompiledConfig> {
    emit_zone_sync(
        snapshot.settings().zone_sync(),
        snapshot.settings().disable_ipv6(),
    )
}
