use super::{
    API_VERSION, GlobalConfiguration, ObjectMeta, Policy, Resource, ResourceKind, TransportServer,
    VirtualServer,
};
use getset::{CopyGetters, Getters};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::io::Read;
use thiserror::Error;
use tracing::{debug, warn};
use typed_builder::TypedBuilder;

/// Any document the engine understands, discriminated by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind")]
pub enum Manifest {
    GlobalConfiguration(GlobalConfiguration),
    VirtualServer(VirtualServer),
    TransportServer(TransportServer),
    Policy(Policy),
    ControllerState(ControllerState),
}

/// Observed state of the controller deployment itself.
#[derive(Debug, Clone, PartialEq, Eq, Getters, TypedBuilder, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ControllerState {
    #[getset(get = "pub")]
    #[builder(default = API_VERSION.to_string(), setter(into))]
    #[serde(default = "default_api_version")]
    api_version: String,

    #[getset(get = "pub")]
    metadata: ObjectMeta,

    #[getset(get = "pub")]
    #[builder(default)]
    #[serde(default)]
    spec: ControllerStateSpec,
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

impl Resource for ControllerState {
    const KIND: ResourceKind = ResourceKind::ControllerState;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    CopyGetters,
    TypedBuilder,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub struct ControllerStateSpec {
    /// Unknown until the deployment has been observed.
    #[getset(get_copy = "pub")]
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    replicas: Option<u32>,
}

/// Manifests grouped by kind, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters)]
pub struct ManifestSet {
    #[getset(get = "pub")]
    global_configurations: Vec<GlobalConfiguration>,

    #[getset(get = "pub")]
    virtual_servers: Vec<VirtualServer>,

    #[getset(get = "pub")]
    transport_servers: Vec<TransportServer>,

    #[getset(get = "pub")]
    policies: Vec<Policy>,

    #[getset(get = "pub")]
    controller_states: Vec<ControllerState>,
}

impl ManifestSet {
    pub fn push(&mut self, manifest: Manifest) {
        match manifest {
            Manifest::GlobalConfiguration(gc) => self.global_configurations.push(gc),
            Manifest::VirtualServer(vs) => self.virtual_servers.push(vs),
            Manifest::TransportServer(ts) => self.transport_servers.push(ts),
            Manifest::Policy(policy) => self.policies.push(policy),
            Manifest::ControllerState(state) => self.controller_states.push(state),
        }
    }

    pub fn len(&self) -> usize {
        self.global_configurations.len()
            + self.virtual_servers.len()
            + self.transport_servers.len()
            + self.policies.len()
            + self.controller_states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<Manifest> for ManifestSet {
    fn from_iter<I: IntoIterator<Item = Manifest>>(iter: I) -> Self {
        let mut set = Self::default();
        for manifest in iter {
            set.push(manifest);
        }
        set
    }
}

impl Extend<Manifest> for ManifestSet {
    fn extend<I: IntoIterator<Item = Manifest>>(&mut self, iter: I) {
        for manifest in iter {
            self.push(manifest);
        }
    }
}

#[derive(Debug, Error)]
pub enum ReadManifestsError {
    #[error("Failed to read manifests: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid manifest in document {index}: {source}")]
    InvalidDocument {
        index: usize,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Reads a multi-document YAML stream. Empty documents are skipped;
/// documents of kinds the engine does not handle are skipped with a warning.
pub fn read_manifests(mut reader: impl Read) -> Result<Vec<Manifest>, ReadManifestsError> {
    let mut contents = String::new();
    reader.read_to_string(&mut contents)?;

    let mut manifests = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(&contents).enumerate() {
        let value = serde_yaml::Value::deserialize(document)
            .map_err(|source| ReadManifestsError::InvalidDocument { index, source })?;
        if value.is_null() {
            continue;
        }

        let kind = value.get("kind").and_then(serde_yaml::Value::as_str);
        if !kind.is_some_and(|kind| kind.parse::<ResourceKind>().is_ok()) {
            warn!("Skipping document {} with unsupported kind {:?}", index, kind);
            continue;
        }

        let manifest = serde_yaml::from_value::<Manifest>(value)
            .map_err(|source| ReadManifestsError::InvalidDocument { index, source })?;
        debug!("Read manifest {} from document {}", manifest_ref(&manifest), index);
        manifests.push(manifest);
    }

    Ok(manifests)
}

fn manifest_ref(manifest: &Manifest) -> super::ObjectRef {
    match manifest {
        Manifest::GlobalConfiguration(gc) => gc.object_ref(),
        Manifest::VirtualServer(vs) => vs.object_ref(),
        Manifest::TransportServer(ts) => ts.object_ref(),
        Manifest::Policy(policy) => policy.object_ref(),
        Manifest::ControllerState(state) => state.object_ref(),
    }
}
