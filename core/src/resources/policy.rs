use super::{API_VERSION, ObjectMeta, Resource, ResourceKind};
use getset::{CopyGetters, Getters};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

#[derive(Debug, Clone, PartialEq, Eq, Getters, TypedBuilder, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    #[getset(get = "pub")]
    #[builder(default = API_VERSION.to_string(), setter(into))]
    #[serde(default = "default_api_version")]
    api_version: String,

    #[getset(get = "pub")]
    metadata: ObjectMeta,

    #[getset(get = "pub")]
    spec: PolicySpec,
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

impl Resource for Policy {
    const KIND: ResourceKind = ResourceKind::Policy;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

/// Exactly one of the policy kinds is expected to be set.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Getters, TypedBuilder, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct PolicySpec {
    #[getset(get = "pub")]
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rate_limit: Option<RateLimitSpec>,

    #[getset(get = "pub")]
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_control: Option<AccessControlSpec>,
}

#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    Getters,
    CopyGetters,
    TypedBuilder,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitSpec {
    /// `{N}r/s` or `{N}r/m`.
    #[getset(get = "pub")]
    #[builder(setter(into))]
    rate: String,

    /// Proxy variable expression, passed through uninterpreted.
    #[getset(get = "pub")]
    #[builder(setter(into))]
    key: String,

    #[getset(get = "pub")]
    #[builder(default, setter(into, strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    zone_size: Option<String>,

    #[getset(get_copy = "pub")]
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    burst: Option<u32>,

    #[getset(get_copy = "pub")]
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delay: Option<u32>,

    #[getset(get_copy = "pub")]
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    no_delay: Option<bool>,

    #[getset(get_copy = "pub")]
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dry_run: Option<bool>,

    #[getset(get = "pub")]
    #[builder(default, setter(into, strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    log_level: Option<String>,

    #[getset(get_copy = "pub")]
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reject_code: Option<u16>,

    /// Divide the rate across controller replicas.
    #[getset(get_copy = "pub")]
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scale: Option<bool>,
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Getters, TypedBuilder, Serialize, Deserialize, JsonSchema,
)]
pub struct AccessControlSpec {
    #[getset(get = "pub")]
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    allow: Vec<String>,

    #[getset(get = "pub")]
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    deny: Vec<String>,
}
