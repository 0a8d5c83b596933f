use crate::listeners::{
    ListenerClaims, ListenerRegistry, ListenerRules, StructuralError, build_registry,
};
use crate::policies::PolicyStore;
use crate::resources::{
    GlobalConfiguration, ManifestSet, ObjectRef, Resource, TransportServer, VirtualServer,
    validate_transport_server,
};
use crate::settings::Settings;
use getset::{CopyGetters, Getters};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// One consistent view of every input the engine reads. Built once per
/// change and never mutated, so a reconciliation that holds it observes a
/// single registry and policy generation throughout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters, CopyGetters)]
pub struct Snapshot {
    #[getset(get_copy = "pub")]
    version: u64,

    #[getset(get = "pub")]
    settings: Settings,

    #[getset(get = "pub")]
    global_configurations: BTreeMap<ObjectRef, GlobalConfiguration>,

    /// The GlobalConfiguration the registry was built from.
    #[getset(get = "pub")]
    selected_global_configuration: Option<ObjectRef>,

    #[getset(get = "pub")]
    registry: ListenerRegistry,

    #[getset(get = "pub")]
    registry_errors: Vec<StructuralError>,

    #[getset(get = "pub")]
    policies: PolicyStore,

    #[getset(get = "pub")]
    claims: ListenerClaims,

    /// Controller replica count; `None` until it has been observed.
    #[getset(get_copy = "pub")]
    replicas: Option<u32>,

    #[getset(get = "pub")]
    virtual_servers: BTreeMap<ObjectRef, VirtualServer>,

    #[getset(get = "pub")]
    transport_servers: BTreeMap<ObjectRef, TransportServer>,
}

fn index_by_ref<T: Resource + Clone>(resources: &[T]) -> BTreeMap<ObjectRef, T> {
    let mut indexed = BTreeMap::new();
    for resource in resources {
        let object_ref = resource.object_ref();
        if indexed.contains_key(&object_ref) {
            warn!("Ignoring duplicate {}", object_ref);
            continue;
        }
        indexed.insert(object_ref, resource.clone());
    }
    indexed
}

impl Snapshot {
    pub fn build(version: u64, manifests: &ManifestSet, settings: Settings) -> Self {
        let global_configurations = index_by_ref(manifests.global_configurations());
        let selected_global_configuration = match settings.global_configuration() {
            Some(key) => global_configurations
                .keys()
                .find(|object_ref| object_ref.key() == *key)
                .cloned(),
            None => global_configurations.keys().next().cloned(),
        };
        let (registry, registry_errors) = build_registry(
            selected_global_configuration
                .as_ref()
                .and_then(|object_ref| global_configurations.get(object_ref)),
            &ListenerRules::from(&settings),
        );

        let transport_servers = index_by_ref(manifests.transport_servers());
        let claims = ListenerClaims::resolve(
            transport_servers
                .values()
                .filter(|ts| validate_transport_server(ts).is_empty()),
        );

        let replicas = manifests
            .controller_states()
            .iter()
            .find_map(|state| state.spec().replicas());

        let snapshot = Self {
            version,
            policies: PolicyStore::from_policies(manifests.policies()),
            virtual_servers: index_by_ref(manifests.virtual_servers()),
            settings,
            global_configurations,
            selected_global_configuration,
            registry,
            registry_errors,
            claims,
            replicas,
            transport_servers,
        };

        info!(
            "Built snapshot {} with {} listener(s), {} policies, {} VirtualServer(s), {} TransportServer(s)",
            snapshot.version,
            snapshot.registry.len(),
            snapshot.policies.len(),
            snapshot.virtual_servers.len(),
            snapshot.transport_servers.len()
        );
        debug!("Controller replicas: {:?}", snapshot.replicas);

        snapshot
    }

    /// Every resource that receives a status, in a stable order.
    pub fn resources(&self) -> impl Iterator<Item = &ObjectRef> {
        self.global_configurations
            .keys()
            .chain(self.policies.entries().map(|(_, entry)| entry.object_ref()))
            .chain(self.virtual_servers.keys())
            .chain(self.transport_servers.keys())
    }
}
