use super::{ObjectMeta, Resource, ResourceKind, API_VERSION};
use getset::{CopyGetters, Getters};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Cluster-wide listener declarations. Fields stay loosely typed so that
/// every malformed entry can be reported instead of failing the whole
/// document at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Getters, TypedBuilder, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfiguration {
    #[getset(get = "pub")]
    #[builder(default = API_VERSION.to_string(), setter(into))]
    #[serde(default = "default_api_version")]
    api_version: String,

    #[getset(get = "pub")]
    metadata: ObjectMeta,

    #[getset(get = "pub")]
    #[builder(default)]
    #[serde(default)]
    spec: GlobalConfigurationSpec,
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

impl Resource for GlobalConfiguration {
    const KIND: ResourceKind = ResourceKind::GlobalConfiguration;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Getters, TypedBuilder, Serialize, Deserialize, JsonSchema,
)]
pub struct GlobalConfigurationSpec {
    #[getset(get = "pub")]
    #[builder(default)]
    #[serde(default)]
    listeners: Vec<ListenerDeclaration>,
}

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Getters,
    CopyGetters,
    TypedBuilder,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub struct ListenerDeclaration {
    #[getset(get = "pub")]
    #[builder(setter(into))]
    name: String,

    #[getset(get_copy = "pub")]
    port: i64,

    #[getset(get = "pub")]
    #[builder(setter(into))]
    protocol: String,

    #[getset(get_copy = "pub")]
    #[builder(default)]
    #[serde(default)]
    ssl: bool,

    #[getset(get = "pub")]
    #[builder(default, setter(into, strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ipv4: Option<String>,

    #[getset(get = "pub")]
    #[builder(default, setter(into, strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ipv6: Option<String>,
}
