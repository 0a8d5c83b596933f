use super::{ListenerDefinition, ListenerProtocol, TLS_PASSTHROUGH_LISTENER_NAME};
use crate::net::{Port, is_dns_1035_label};
use crate::resources::{GlobalConfiguration, ListenerDeclaration, ObjectRef, Resource};
use getset::{CopyGetters, Getters};
use std::collections::{BTreeMap, BTreeSet};
use std::net::{Ipv4Addr, Ipv6Addr};
use thiserror::Error;
use tracing::{debug, warn};
use typed_builder::TypedBuilder;

/// A malformed listener entry. Entries carrying one of these are left out of
/// the registry; the rest of the document is still evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("spec.listeners[{index}].name: Forbidden: is the name of a built-in listener")]
    ReservedName { index: usize, name: String },

    #[error(
        "spec.listeners[{index}].name: Invalid value: \"{name}\": a DNS-1035 label must consist of lower case alphanumeric characters or '-', start with an alphabetic character, and end with an alphanumeric character"
    )]
    InvalidName { index: usize, name: String },

    #[error("spec.listeners[{index}].port: Forbidden: Listener {name}: port {port} is forbidden")]
    ForbiddenPort { index: usize, name: String, port: u16 },

    #[error(
        "spec.listeners[{index}].port: Invalid value: {port}: must be between 1 and 65535, inclusive"
    )]
    PortOutOfRange { index: usize, name: String, port: i64 },

    #[error(
        "spec.listeners[{index}].protocol: Invalid value: \"{protocol}\": must specify a valid protocol. Accepted values: HTTP,HTTPS,TCP,UDP"
    )]
    UnknownProtocol {
        index: usize,
        name: String,
        protocol: String,
    },

    #[error(
        "spec.listeners[{index}].ssl: Invalid value: {ssl}: Listener {name}: ssl does not match protocol {protocol}"
    )]
    SslMismatch {
        index: usize,
        name: String,
        protocol: ListenerProtocol,
        ssl: bool,
    },

    #[error("spec.listeners[{index}].{family}: Invalid value: \"{address}\": invalid IP address")]
    InvalidAddress {
        index: usize,
        name: String,
        family: &'static str,
        address: String,
    },

    #[error("spec.listeners[{index}].name: Duplicate value: \"{name}\"")]
    DuplicateName { index: usize, name: String },

    #[error(
        "spec.listeners: Duplicate value: \"Listener {name}: Duplicated port/protocol combination {port}/{protocol}\""
    )]
    DuplicatePortProtocol {
        index: usize,
        name: String,
        port: Port,
        protocol: ListenerProtocol,
    },

    #[error(
        "spec.listeners.port: Invalid value: {port}: Listener {name}: Port {port} is used with a different protocol (current: {existing}, new: {protocol})"
    )]
    PortConflict {
        index: usize,
        name: String,
        port: Port,
        existing: ListenerProtocol,
        protocol: ListenerProtocol,
    },
}

impl StructuralError {
    /// Name of the listener entry the error belongs to.
    pub fn listener_name(&self) -> &str {
        match self {
            Self::ReservedName { name, .. }
            | Self::InvalidName { name, .. }
            | Self::ForbiddenPort { name, .. }
            | Self::PortOutOfRange { name, .. }
            | Self::UnknownProtocol { name, .. }
            | Self::SslMismatch { name, .. }
            | Self::InvalidAddress { name, .. }
            | Self::DuplicateName { name, .. }
            | Self::DuplicatePortProtocol { name, .. }
            | Self::PortConflict { name, .. } => name,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::ReservedName { index, .. }
            | Self::InvalidName { index, .. }
            | Self::ForbiddenPort { index, .. }
            | Self::PortOutOfRange { index, .. }
            | Self::UnknownProtocol { index, .. }
            | Self::SslMismatch { index, .. }
            | Self::InvalidAddress { index, .. }
            | Self::DuplicateName { index, .. }
            | Self::DuplicatePortProtocol { index, .. }
            | Self::PortConflict { index, .. } => *index,
        }
    }
}

/// Controller-level constraints applied while building the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters, TypedBuilder)]
pub struct ListenerRules {
    /// Ports the controller itself binds (status, metrics, readiness).
    #[getset(get = "pub")]
    #[builder(default, setter(into))]
    forbidden_ports: BTreeSet<u16>,
}

/// The validated listener set of one GlobalConfiguration generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters, CopyGetters)]
pub struct ListenerRegistry {
    /// The GlobalConfiguration this registry was built from; `None` when
    /// none is deployed.
    #[getset(get = "pub")]
    source: Option<ObjectRef>,

    #[getset(get_copy = "pub")]
    generation: u64,

    listeners: BTreeMap<String, ListenerDefinition>,

    rejected: BTreeMap<String, StructuralError>,
}

impl ListenerRegistry {
    pub fn not_deployed() -> Self {
        Self::default()
    }

    pub fn is_deployed(&self) -> bool {
        self.source.is_some()
    }

    pub fn get(&self, name: &str) -> Option<&ListenerDefinition> {
        self.listeners.get(name)
    }

    /// Why an entry with this name was left out, if it was declared at all.
    pub fn rejection(&self, name: &str) -> Option<&StructuralError> {
        self.rejected.get(name)
    }

    pub fn listeners(&self) -> impl Iterator<Item = &ListenerDefinition> {
        self.listeners.values()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

/// Builds the listener registry, accumulating an error for every malformed
/// entry. The first declaration of a name wins; later duplicates are
/// rejected.
pub fn build_registry(
    global_configuration: Option<&GlobalConfiguration>,
    rules: &ListenerRules,
) -> (ListenerRegistry, Vec<StructuralError>) {
    let Some(global_configuration) = global_configuration else {
        debug!("No GlobalConfiguration deployed, listener registry is empty");
        return (ListenerRegistry::not_deployed(), Vec::new());
    };

    let mut registry = ListenerRegistry {
        source: Some(global_configuration.object_ref()),
        generation: global_configuration.metadata().generation().unwrap_or_default(),
        ..ListenerRegistry::default()
    };
    let mut errors = Vec::new();
    let mut bindings: BTreeMap<BindKey, ListenerProtocol> = BTreeMap::new();

    for (index, declaration) in global_configuration.spec().listeners().iter().enumerate() {
        let listener = match validate_declaration(index, declaration, rules) {
            Ok(listener) => listener,
            Err(entry_errors) => {
                reject(&mut registry, &entry_errors);
                errors.extend(entry_errors);
                continue;
            }
        };

        if registry.listeners.contains_key(listener.name()) {
            errors.push(StructuralError::DuplicateName {
                index,
                name: listener.name().clone(),
            });
            continue;
        }

        let key = BindKey::of(&listener);
        if let Some(&existing) = bindings.get(&key) {
            let error = if existing == listener.protocol() {
                Some(StructuralError::DuplicatePortProtocol {
                    index,
                    name: listener.name().clone(),
                    port: listener.port(),
                    protocol: listener.protocol(),
                })
            } else if existing.is_http() || listener.protocol().is_http() {
                Some(StructuralError::PortConflict {
                    index,
                    name: listener.name().clone(),
                    port: listener.port(),
                    existing,
                    protocol: listener.protocol(),
                })
            } else {
                None
            };

            if let Some(error) = error {
                reject(&mut registry, std::slice::from_ref(&error));
                errors.push(error);
                continue;
            }
        }

        bindings.insert(key, listener.protocol());
        registry.rejected.remove(listener.name());
        registry
            .listeners
            .insert(listener.name().clone(), listener);
    }

    for error in &errors {
        warn!(
            "Listener {} rejected from {}: {}",
            error.listener_name(),
            global_configuration.object_ref(),
            error
        );
    }
    debug!(
        "Built listener registry generation {} with {} listener(s)",
        registry.generation,
        registry.len()
    );

    (registry, errors)
}

fn reject(registry: &mut ListenerRegistry, entry_errors: &[StructuralError]) {
    if let Some(first) = entry_errors.first() {
        let name = first.listener_name();
        if !registry.listeners.contains_key(name) && !registry.rejected.contains_key(name) {
            registry.rejected.insert(name.to_string(), first.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct BindKey {
    ipv4: Option<Ipv4Addr>,
    ipv6: Option<Ipv6Addr>,
    port: Port,
}

impl BindKey {
    fn of(listener: &ListenerDefinition) -> Self {
        Self {
            ipv4: listener.ipv4(),
            ipv6: listener.ipv6(),
            port: listener.port(),
        }
    }
}

fn validate_declaration(
    index: usize,
    declaration: &ListenerDeclaration,
    rules: &ListenerRules,
) -> Result<ListenerDefinition, Vec<StructuralError>> {
    let name = declaration.name().clone();
    let mut errors = Vec::new();

    if name == TLS_PASSTHROUGH_LISTENER_NAME {
        errors.push(StructuralError::ReservedName {
            index,
            name: name.clone(),
        });
    } else if !is_dns_1035_label(&name) {
        errors.push(StructuralError::InvalidName {
            index,
            name: name.clone(),
        });
    }

    let port = match Port::try_from(declaration.port()) {
        Ok(port) if rules.forbidden_ports().contains(&port.get()) => {
            errors.push(StructuralError::ForbiddenPort {
                index,
                name: name.clone(),
                port: port.get(),
            });
            None
        }
        Ok(port) => Some(port),
        Err(_) => {
            errors.push(StructuralError::PortOutOfRange {
                index,
                name: name.clone(),
                port: declaration.port(),
            });
            None
        }
    };

    let protocol = if let Ok(protocol) = declaration.protocol().parse::<ListenerProtocol>() {
        if protocol.requires_ssl() != declaration.ssl() {
            errors.push(StructuralError::SslMismatch {
                index,
                name: name.clone(),
                protocol,
                ssl: declaration.ssl(),
            });
        }
        Some(protocol)
    } else {
        errors.push(StructuralError::UnknownProtocol {
            index,
            name: name.clone(),
            protocol: declaration.protocol().clone(),
        });
        None
    };

    let ipv4 = match declaration.ipv4().as_deref().map(str::parse::<Ipv4Addr>) {
        Some(Ok(address)) => Some(address),
        Some(Err(_)) => {
            errors.push(StructuralError::InvalidAddress {
                index,
                name: name.clone(),
                family: "ipv4",
                address: declaration.ipv4().clone().unwrap_or_default(),
            });
            None
        }
        None => None,
    };

    let ipv6 = match declaration.ipv6().as_deref().map(str::parse::<Ipv6Addr>) {
        Some(Ok(address)) => Some(address),
        Some(Err(_)) => {
            errors.push(StructuralError::InvalidAddress {
                index,
                name: name.clone(),
                family: "ipv6",
                address: declaration.ipv6().clone().unwrap_or_default(),
            });
            None
        }
        None => None,
    };

    match (port, protocol) {
        (Some(port), Some(protocol)) if errors.is_empty() => Ok(ListenerDefinition {
            name,
            protocol,
            port,
            ssl: declaration.ssl(),
            ipv4,
            ipv6,
        }),
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{GlobalConfigurationSpec, ObjectMeta};
    use assertables::{assert_none, assert_some};
    use rstest::{fixture, rstest};

    fn declaration(name: &str, port: i64, protocol: &str, ssl: bool) -> ListenerDeclaration {
        ListenerDeclaration::builder()
            .name(name)
            .port(port)
            .protocol(protocol)
            .ssl(ssl)
            .build()
    }

    fn global_configuration(listeners: Vec<ListenerDeclaration>) -> GlobalConfiguration {
        GlobalConfiguration::builder()
            .metadata(
                ObjectMeta::builder()
                    .name("nginx-configuration")
                    .namespace("nginx-ingress")
                    .generation(3)
                    .build(),
            )
            .spec(GlobalConfigurationSpec::builder().listeners(listeners).build())
            .build()
    }

    #[fixture]
    fn rules() -> ListenerRules {
        ListenerRules::builder()
            .forbidden_ports(BTreeSet::from([9113, 8081]))
            .build()
    }

    #[rstest]
    fn test_no_global_configuration(rules: ListenerRules) {
        let (registry, errors) = build_registry(None, &rules);
        assert!(!registry.is_deployed());
        assert!(registry.is_empty());
        assert!(errors.is_empty());
    }

    #[rstest]
    fn test_deployed_but_empty(rules: ListenerRules) {
        let gc = global_configuration(vec![]);
        let (registry, errors) = build_registry(Some(&gc), &rules);
        assert!(registry.is_deployed());
        assert!(registry.is_empty());
        assert!(errors.is_empty());
        assert_eq!(registry.generation(), 3);
    }

    #[rstest]
    fn test_valid_listeners(rules: ListenerRules) {
        let gc = global_configuration(vec![
            declaration("http-8085", 8085, "HTTP", false),
            declaration("https-8445", 8445, "HTTPS", true),
            declaration("dns-tcp", 5353, "TCP", false),
            declaration("dns-udp", 5353, "UDP", false),
        ]);
        let (registry, errors) = build_registry(Some(&gc), &rules);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(registry.len(), 4);

        let https = assert_some!(registry.get("https-8445"));
        assert_eq!(https.port(), Port::new(8445));
        assert!(https.ssl());
        assert_eq!(https.protocol(), ListenerProtocol::Https);
    }

    #[rstest]
    fn test_duplicate_name_first_wins(rules: ListenerRules) {
        let gc = global_configuration(vec![
            declaration("http-8085", 8085, "HTTP", false),
            declaration("http-8085", 8086, "HTTP", false),
        ]);
        let (registry, errors) = build_registry(Some(&gc), &rules);
        assert_eq!(registry.len(), 1);
        assert_eq!(assert_some!(registry.get("http-8085")).port(), Port::new(8085));
        assert_eq!(
            errors,
            vec![StructuralError::DuplicateName {
                index: 1,
                name: "http-8085".to_string()
            }]
        );
        assert_none!(registry.rejection("http-8085"));
    }

    #[rstest]
    fn test_errors_accumulate_across_entries(rules: ListenerRules) {
        let gc = global_configuration(vec![
            declaration("zero", 0, "HTTP", false),
            declaration("too-big", 70000, "HTTP", false),
            declaration("plain-https", 8443, "HTTPS", false),
            declaration("ssl-http", 8080, "HTTP", true),
            declaration("metrics", 9113, "HTTP", false),
            declaration("ok", 8085, "HTTP", false),
        ]);
        let (registry, errors) = build_registry(Some(&gc), &rules);

        assert_eq!(registry.len(), 1);
        assert_some!(registry.get("ok"));
        let indexes: Vec<usize> = errors.iter().map(StructuralError::index).collect();
        assert_eq!(indexes, vec![0, 1, 2, 3, 4]);
        assert!(matches!(
            assert_some!(registry.rejection("plain-https")),
            StructuralError::SslMismatch { ssl: false, .. }
        ));
    }

    #[rstest]
    fn test_field_errors_accumulate_within_entry(rules: ListenerRules) {
        let gc = global_configuration(vec![declaration("Bad_Name", -1, "SCTP", false)]);
        let (_, errors) = build_registry(Some(&gc), &rules);
        assert_eq!(errors.len(), 3);
        assert_eq!(
            errors[2].to_string(),
            "spec.listeners[0].protocol: Invalid value: \"SCTP\": must specify a valid protocol. Accepted values: HTTP,HTTPS,TCP,UDP"
        );
    }

    #[rstest]
    #[case("tls-passthrough", "spec.listeners[0].name: Forbidden: is the name of a built-in listener")]
    #[case("8085-http", "spec.listeners[0].name: Invalid value: \"8085-http\"")]
    fn test_name_rules(rules: ListenerRules, #[case] name: &str, #[case] expected: &str) {
        let gc = global_configuration(vec![declaration(name, 8085, "HTTP", false)]);
        let (registry, errors) = build_registry(Some(&gc), &rules);
        assert!(registry.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().starts_with(expected), "{}", errors[0]);
    }

    #[rstest]
    fn test_forbidden_port_message(rules: ListenerRules) {
        let gc = global_configuration(vec![declaration("metrics", 9113, "HTTP", false)]);
        let (_, errors) = build_registry(Some(&gc), &rules);
        assert_eq!(
            errors[0].to_string(),
            "spec.listeners[0].port: Forbidden: Listener metrics: port 9113 is forbidden"
        );
    }

    #[rstest]
    fn test_port_protocol_conflicts(rules: ListenerRules) {
        let gc = global_configuration(vec![
            declaration("http-8085", 8085, "HTTP", false),
            declaration("tcp-8085", 8085, "TCP", false),
            declaration("other-http-8085", 8085, "HTTP", false),
            declaration("udp-5353", 5353, "UDP", false),
            declaration("tcp-5353", 5353, "TCP", false),
        ]);
        let (registry, errors) = build_registry(Some(&gc), &rules);

        let names: Vec<&str> = registry.listeners().map(|l| l.name().as_str()).collect();
        assert_eq!(names, vec!["http-8085", "tcp-5353", "udp-5353"]);
        assert!(matches!(errors[0], StructuralError::PortConflict { index: 1, .. }));
        assert!(matches!(errors[1], StructuralError::DuplicatePortProtocol { index: 2, .. }));
    }

    #[rstest]
    fn test_bind_addresses(rules: ListenerRules) {
        let gc = global_configuration(vec![
            declaration("http-8085", 8085, "HTTP", false),
            ListenerDeclaration::builder()
                .name("local-8085")
                .port(8085)
                .protocol("HTTP")
                .ipv4("127.0.0.1")
                .ipv6("::1")
                .build(),
            ListenerDeclaration::builder()
                .name("broken")
                .port(8086)
                .protocol("HTTP")
                .ipv4("300.1.1.1")
                .build(),
        ]);
        let (registry, errors) = build_registry(Some(&gc), &rules);

        let local = assert_some!(registry.get("local-8085"));
        assert_eq!(local.ipv4(), Some(Ipv4Addr::LOCALHOST));
        assert_eq!(local.ipv6(), Some(Ipv6Addr::LOCALHOST));
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].to_string(),
            "spec.listeners[2].ipv4: Invalid value: \"300.1.1.1\": invalid IP address"
        );
    }
}
