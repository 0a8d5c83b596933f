mod global_configuration;
mod manifests;
mod policy;
mod transport_server;
mod validation;
mod virtual_server;

pub use global_configuration::*;
pub use manifests::*;
pub use policy::*;
pub use transport_server::*;
pub use validation::*;
pub use virtual_server::*;

use chrono::{DateTime, Utc};
use getset::{CopyGetters, Getters};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use strum::{Display as StrumDisplay, EnumString, IntoStaticStr};
use typed_builder::TypedBuilder;

pub const API_VERSION: &str = "k8s.nginx.org/v1";
pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    StrumDisplay,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub enum ResourceKind {
    GlobalConfiguration,
    VirtualServer,
    TransportServer,
    Policy,
    ControllerState,
}

/// Identity of a custom resource within a snapshot.
#[derive(TypedBuilder, Getters, CopyGetters, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    #[getset(get_copy = "pub")]
    kind: ResourceKind,

    #[getset(get = "pub")]
    #[builder(setter(into))]
    namespace: String,

    #[getset(get = "pub")]
    #[builder(setter(into))]
    name: String,
}

impl ObjectRef {
    /// `namespace/name`, the form used in status messages and logs.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl Display for ObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Getters, TypedBuilder, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[getset(get = "pub")]
    #[builder(setter(into))]
    name: String,

    #[getset(get = "pub")]
    #[builder(default, setter(into, strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,

    /// RFC 3339 timestamp used to order competing claims.
    #[getset(get = "pub")]
    #[builder(default, setter(into, strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    creation_timestamp: Option<String>,

    #[getset(get = "pub")]
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    generation: Option<u64>,
}

impl ObjectMeta {
    pub fn namespace_or_default(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.creation_timestamp
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc))
    }
}

pub trait Resource {
    const KIND: ResourceKind;

    fn metadata(&self) -> &ObjectMeta;

    fn object_ref(&self) -> ObjectRef {
        let metadata = self.metadata();
        ObjectRef::builder()
            .kind(Self::KIND)
            .namespace(metadata.namespace_or_default())
            .name(metadata.name().as_str())
            .build()
    }
}

/// A reference from a VirtualServer to a Policy. The namespace defaults to
/// the referencing resource's namespace.
#[derive(
    Debug, Clone, PartialEq, Eq, Getters, TypedBuilder, Serialize, Deserialize, JsonSchema,
)]
pub struct PolicyRef {
    #[getset(get = "pub")]
    #[builder(setter(into))]
    name: String,

    #[getset(get = "pub")]
    #[builder(default, setter(into, strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
}

#[derive(
    Debug, Clone, PartialEq, Eq, Getters, CopyGetters, TypedBuilder, Serialize, Deserialize, JsonSchema,
)]
pub struct Upstream {
    #[getset(get = "pub")]
    #[builder(setter(into))]
    name: String,

    #[getset(get = "pub")]
    #[builder(setter(into))]
    service: String,

    #[getset(get_copy = "pub")]
    port: crate::net::Port,
}
