use super::{API_VERSION, FieldError, ObjectMeta, Resource, ResourceKind, Upstream};
use crate::net::Hostname;
use getset::Getters;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use typed_builder::TypedBuilder;

#[derive(Debug, Clone, PartialEq, Eq, Getters, TypedBuilder, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransportServer {
    #[getset(get = "pub")]
    #[builder(default = API_VERSION.to_string(), setter(into))]
    #[serde(default = "default_api_version")]
    api_version: String,

    #[getset(get = "pub")]
    metadata: ObjectMeta,

    #[getset(get = "pub")]
    spec: TransportServerSpec,
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

impl Resource for TransportServer {
    const KIND: ResourceKind = ResourceKind::TransportServer;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Getters, TypedBuilder, Serialize, Deserialize, JsonSchema)]
pub struct TransportServerSpec {
    #[getset(get = "pub")]
    listener: TransportServerListener,

    /// Only meaningful for TLS passthrough style listeners; absent hosts
    /// claim the listener as a whole.
    #[getset(get = "pub")]
    #[builder(default, setter(into, strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    host: Option<Hostname>,

    #[getset(get = "pub")]
    #[builder(default)]
    #[serde(default)]
    upstreams: Vec<Upstream>,

    #[getset(get = "pub")]
    action: TransportServerAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Getters, TypedBuilder, Serialize, Deserialize, JsonSchema)]
pub struct TransportServerListener {
    #[getset(get = "pub")]
    #[builder(setter(into))]
    name: String,

    #[getset(get = "pub")]
    #[builder(setter(into))]
    protocol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Getters, TypedBuilder, Serialize, Deserialize, JsonSchema)]
pub struct TransportServerAction {
    #[getset(get = "pub")]
    #[builder(setter(into))]
    pass: String,
}

pub fn validate_transport_server(transport_server: &TransportServer) -> Vec<FieldError> {
    let spec = transport_server.spec();
    let mut errors = Vec::new();

    if spec.listener().name().is_empty() {
        errors.push(FieldError::required("spec.listener.name"));
    }
    if !matches!(spec.listener().protocol().as_str(), "TCP" | "UDP") {
        errors.push(FieldError::invalid(
            "spec.listener.protocol",
            spec.listener().protocol(),
            "must specify a valid protocol. Accepted values: TCP,UDP",
        ));
    }
    if let Some(host) = spec.host() {
        if !host.is_valid() {
            errors.push(FieldError::invalid(
                "spec.host",
                host,
                "must be a valid DNS hostname",
            ));
        }
    }

    let mut upstream_names = BTreeSet::new();
    for (index, upstream) in spec.upstreams().iter().enumerate() {
        if !upstream_names.insert(upstream.name().as_str()) {
            errors.push(FieldError::duplicate(
                format!("spec.upstreams[{index}].name"),
                upstream.name(),
            ));
        }
    }
    if !upstream_names.contains(spec.action().pass().as_str()) {
        errors.push(FieldError::not_found("spec.action.pass", spec.action().pass()));
    }

    errors
}
