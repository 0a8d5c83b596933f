use crate::listeners::ListenerRules;
use crate::net::Port;
use getset::{CopyGetters, Getters};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use serde_valid::validation::{Error, Errors};
use std::collections::BTreeSet;
use std::io::{Read, Write};
use thiserror::Error;
use typed_builder::TypedBuilder;

pub const DEFAULT_HTTP_PORT: u16 = 80;
pub const DEFAULT_HTTPS_PORT: u16 = 443;
pub const DEFAULT_UPSTREAM_ZONE_SIZE: &str = "256k";
pub const DEFAULT_ZONE_SYNC_PORT: u16 = 12345;
pub const DEFAULT_ZONE_SYNC_RESOLVER: &str = "kube-dns.kube-system.svc.cluster.local";
pub const DEFAULT_ZONE_SYNC_RESOLVER_VALID: &str = "5s";

/// Controller-wide settings that shape validation and rendering.
#[derive(
    Validate,
    TypedBuilder,
    Getters,
    CopyGetters,
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    #[getset(get_copy = "pub")]
    #[builder(default)]
    disable_ipv6: bool,

    #[getset(get_copy = "pub")]
    #[builder(default)]
    proxy_protocol: bool,

    #[getset(get_copy = "pub")]
    #[builder(default = Port::new(DEFAULT_HTTP_PORT))]
    #[validate]
    default_http_port: Port,

    #[getset(get_copy = "pub")]
    #[builder(default = Port::new(DEFAULT_HTTPS_PORT))]
    #[validate]
    default_https_port: Port,

    /// Ports the controller binds for itself. The default listener ports
    /// are always forbidden in addition to these.
    #[getset(get = "pub")]
    #[builder(default = default_forbidden_listener_ports(), setter(into))]
    forbidden_listener_ports: BTreeSet<u16>,

    #[getset(get = "pub")]
    #[builder(default = DEFAULT_UPSTREAM_ZONE_SIZE.to_string(), setter(into))]
    #[validate(pattern = r"^[0-9]+[kKmM]?$")]
    upstream_zone_size: String,

    #[getset(get = "pub")]
    #[builder(default)]
    #[validate]
    zone_sync: ZoneSyncSettings,

    /// `namespace/name` of the GlobalConfiguration to honor. When unset the
    /// first one by `namespace/name` is used.
    #[getset(get = "pub")]
    #[builder(default, setter(into, strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    global_configuration: Option<String>,
}

fn default_forbidden_listener_ports() -> BTreeSet<u16> {
    BTreeSet::from([8080])
}

impl Default for Settings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl From<&Settings> for ListenerRules {
    fn from(settings: &Settings) -> Self {
        let mut forbidden_ports = settings.forbidden_listener_ports.clone();
        forbidden_ports.insert(settings.default_http_port.get());
        forbidden_ports.insert(settings.default_https_port.get());
        ListenerRules::builder().forbidden_ports(forbidden_ports).build()
    }
}

/// Zone synchronization between controller replicas over a headless
/// service.
#[derive(
    Validate,
    TypedBuilder,
    Getters,
    CopyGetters,
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "camelCase", default)]
pub struct ZoneSyncSettings {
    #[getset(get_copy = "pub")]
    #[builder(default)]
    enabled: bool,

    #[getset(get_copy = "pub")]
    #[builder(default = Port::new(DEFAULT_ZONE_SYNC_PORT))]
    #[validate]
    port: Port,

    #[getset(get = "pub")]
    #[builder(default = DEFAULT_ZONE_SYNC_RESOLVER.to_string(), setter(into))]
    #[validate(min_length = 1)]
    resolver_address: String,

    #[getset(get = "pub")]
    #[builder(default = DEFAULT_ZONE_SYNC_RESOLVER_VALID.to_string(), setter(into))]
    #[validate(pattern = r"^[0-9]+(ms|s|m|h|d)?$")]
    resolver_valid: String,

    #[getset(get = "pub")]
    #[builder(default = "nginx-ingress-hl".to_string(), setter(into))]
    #[validate(min_length = 1)]
    #[validate(max_length = 63)]
    headless_service: String,

    #[getset(get = "pub")]
    #[builder(default = "nginx-ingress".to_string(), setter(into))]
    #[validate(min_length = 1)]
    #[validate(max_length = 63)]
    namespace: String,
}

impl Default for ZoneSyncSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("Failed to read settings: {0}")]
    Error(#[from] serde_yaml::Error),

    #[error("Invalid settings: {0}")]
    InvalidSettings(#[from] Errors<Error>),
}

pub fn read_settings(reader: impl Read) -> Result<Settings, ReadError> {
    let settings = serde_yaml::from_reader::<_, Settings>(reader)?;

    settings
        .validate()
        .map(|()| settings)
        .map_err(ReadError::InvalidSettings)
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Failed to write settings: {0}")]
    Error(#[from] serde_yaml::Error),

    #[error("Invalid settings: {0}")]
    InvalidSettings(#[from] Errors<Error>),
}

pub fn write_settings(settings: &Settings, writer: impl Write) -> Result<(), WriteError> {
    settings.validate().map_err(WriteError::InvalidSettings)?;

    serde_yaml::to_writer(writer, settings).map_err(WriteError::Error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertables::{assert_err, assert_ok};
    use rstest::rstest;

    #[test]
    fn test_read_empty_document_uses_defaults() {
        let settings = assert_ok!(read_settings("{}".as_bytes()));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.default_http_port(), Port::new(80));
        assert_eq!(settings.zone_sync().port(), Port::new(12345));
        assert_eq!(
            settings.zone_sync().resolver_address(),
            "kube-dns.kube-system.svc.cluster.local"
        );
        assert_eq!(settings.zone_sync().resolver_valid(), "5s");
    }

    #[test]
    fn test_read_settings() {
        let yaml = r"
disableIpv6: true
proxyProtocol: true
forbiddenListenerPorts: [9113, 8081]
upstreamZoneSize: 512k
globalConfiguration: nginx-ingress/nginx-configuration
zoneSync:
  enabled: true
  port: 34100
  resolverValid: 10s
  headlessService: nginx-ingress-replicaset-hl
";
        let settings = assert_ok!(read_settings(yaml.as_bytes()));
        assert!(settings.disable_ipv6());
        assert!(settings.proxy_protocol());
        assert_eq!(settings.upstream_zone_size(), "512k");
        assert_eq!(
            settings.global_configuration().as_deref(),
            Some("nginx-ingress/nginx-configuration")
        );
        assert!(settings.zone_sync().enabled());
        assert_eq!(settings.zone_sync().port(), Port::new(34100));
        assert_eq!(settings.zone_sync().namespace(), "nginx-ingress");
    }

    #[rstest]
    #[case("upstreamZoneSize: 1G")]
    #[case("zoneSync: {resolverValid: soon}")]
    #[case("zoneSync: {headlessService: ''}")]
    #[case("defaultHttpPort: 0")]
    fn test_read_invalid_settings(#[case] yaml: &str) {
        assert_err!(read_settings(yaml.as_bytes()));
    }

    #[test]
    fn test_default_ports_are_forbidden_listener_ports() {
        let settings = Settings::builder()
            .forbidden_listener_ports([9113])
            .default_https_port(Port::new(8443))
            .build();
        let rules = ListenerRules::from(&settings);
        assert_eq!(
            rules.forbidden_ports(),
            &BTreeSet::from([80, 8443, 9113])
        );
    }

    #[test]
    fn test_write_then_read() {
        let settings = Settings::builder()
            .disable_ipv6(true)
            .zone_sync(ZoneSyncSettings::builder().enabled(true).build())
            .build();
        let mut buffer = Vec::new();
        assert_ok!(write_settings(&settings, &mut buffer));
        assert_eq!(assert_ok!(read_settings(buffer.as_slice())), settings);
    }
}
