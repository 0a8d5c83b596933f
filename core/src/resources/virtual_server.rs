use super::{API_VERSION, FieldError, ObjectMeta, PolicyRef, Resource, ResourceKind, Upstream};
use crate::net::Hostname;
use getset::Getters;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use typed_builder::TypedBuilder;

#[derive(Debug, Clone, PartialEq, Eq, Getters, TypedBuilder, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualServer {
    #[getset(get = "pub")]
    #[builder(default = API_VERSION.to_string(), setter(into))]
    #[serde(default = "default_api_version")]
    api_version: String,

    #[getset(get = "pub")]
    metadata: ObjectMeta,

    #[getset(get = "pub")]
    spec: VirtualServerSpec,
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

impl Resource for VirtualServer {
    const KIND: ResourceKind = ResourceKind::VirtualServer;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Getters, TypedBuilder, Serialize, Deserialize, JsonSchema)]
pub struct VirtualServerSpec {
    #[getset(get = "pub")]
    #[builder(setter(into))]
    host: Hostname,

    #[getset(get = "pub")]
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tls: Option<VirtualServerTls>,

    #[getset(get = "pub")]
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    listener: Option<VirtualServerListener>,

    #[getset(get = "pub")]
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    policies: Vec<PolicyRef>,

    #[getset(get = "pub")]
    #[builder(default)]
    #[serde(default)]
    upstreams: Vec<Upstream>,

    #[getset(get = "pub")]
    #[builder(default)]
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Debug, Clone, PartialEq, Eq, Getters, TypedBuilder, Serialize, Deserialize, JsonSchema)]
pub struct VirtualServerTls {
    #[getset(get = "pub")]
    #[builder(setter(into))]
    secret: String,
}

/// Custom listener names for the `listener.http` and `listener.https`
/// contexts.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Getters, TypedBuilder, Serialize, Deserialize, JsonSchema,
)]
pub struct VirtualServerListener {
    #[getset(get = "pub")]
    #[builder(default, setter(into, strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    http: Option<String>,

    #[getset(get = "pub")]
    #[builder(default, setter(into, strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    https: Option<String>,
}

impl VirtualServerListener {
    pub fn is_declared(&self) -> bool {
        self.http.is_some() || self.https.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Getters, TypedBuilder, Serialize, Deserialize, JsonSchema)]
pub struct Route {
    #[getset(get = "pub")]
    #[builder(setter(into))]
    path: String,

    #[getset(get = "pub")]
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    policies: Vec<PolicyRef>,

    #[getset(get = "pub")]
    action: RouteAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Getters, TypedBuilder, Serialize, Deserialize, JsonSchema)]
pub struct RouteAction {
    /// Name of the upstream that receives the traffic.
    #[getset(get = "pub")]
    #[builder(setter(into))]
    pass: String,
}

/// Checks a VirtualServer document for errors that make it unusable as a
/// whole. Listener and policy references are resolved separately and never
/// reported here.
pub fn validate_virtual_server(virtual_server: &VirtualServer) -> Vec<FieldError> {
    let spec = virtual_server.spec();
    let mut errors = Vec::new();

    if spec.host().as_str().is_empty() {
        errors.push(FieldError::required("spec.host"));
    } else if !spec.host().is_valid() {
        errors.push(FieldError::invalid(
            "spec.host",
            spec.host(),
            "must be a valid DNS hostname",
        ));
    }

    if let Some(tls) = spec.tls() {
        if tls.secret().is_empty() {
            errors.push(FieldError::required("spec.tls.secret"));
        }
    }

    if let Some(listener) = spec.listener() {
        for (context, name) in [("http", listener.http()), ("https", listener.https())] {
            if name.as_deref().is_some_and(str::is_empty) {
                errors.push(FieldError::required(format!("spec.listener.{context}")));
            }
        }
    }

    let mut upstream_names = BTreeSet::new();
    for (index, upstream) in spec.upstreams().iter().enumerate() {
        let path = format!("spec.upstreams[{index}]");
        if !crate::net::is_dns_label(upstream.name()) {
            errors.push(FieldError::invalid(
                format!("{path}.name"),
                upstream.name(),
                "must be a valid DNS label",
            ));
        } else if !upstream_names.insert(upstream.name().as_str()) {
            errors.push(FieldError::duplicate(format!("{path}.name"), upstream.name()));
        }
        if upstream.service().is_empty() {
            errors.push(FieldError::required(format!("{path}.service")));
        }
        if upstream.port().get() == 0 {
            errors.push(FieldError::invalid(
                format!("{path}.port"),
                upstream.port(),
                "must be between 1 and 65535, inclusive",
            ));
        }
    }

    let mut paths = BTreeSet::new();
    for (index, route) in spec.routes().iter().enumerate() {
        let path = format!("spec.routes[{index}]");
        if !route.path().starts_with('/') {
            errors.push(FieldError::invalid(
                format!("{path}.path"),
                route.path(),
                "must start with '/'",
            ));
        } else if !paths.insert(route.path().as_str()) {
            errors.push(FieldError::duplicate(format!("{path}.path"), route.path()));
        }
        if !upstream_names.contains(route.action().pass().as_str()) {
            errors.push(FieldError::not_found(
                format!("{path}.action.pass"),
                route.action().pass(),
            ));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Port;
    use rstest::{fixture, rstest};

    #[fixture]
    fn cafe() -> VirtualServer {
        VirtualServer::builder()
            .metadata(ObjectMeta::builder().name("cafe").namespace("default").build())
            .spec(
                VirtualServerSpec::builder()
                    .host("cafe.example.com")
                    .upstreams(vec![
                        Upstream::builder()
                            .name("tea")
                            .service("tea-svc")
                            .port(Port::new(80))
                            .build(),
                    ])
                    .routes(vec![
                        Route::builder()
                            .path("/tea")
                            .action(RouteAction::builder().pass("tea").build())
                            .build(),
                    ])
                    .build(),
            )
            .build()
    }

    #[rstest]
    fn test_valid_virtual_server(cafe: VirtualServer) {
        assert!(validate_virtual_server(&cafe).is_empty());
        assert_eq!(cafe.object_ref().key(), "default/cafe");
    }

    #[rstest]
    fn test_route_to_unknown_upstream(cafe: VirtualServer) {
        let mut spec = cafe.spec().clone();
        spec.routes = vec![
            Route::builder()
                .path("/coffee")
                .action(RouteAction::builder().pass("coffee").build())
                .build(),
        ];
        let vs = VirtualServer::builder()
            .metadata(cafe.metadata().clone())
            .spec(spec)
            .build();

        let errors = validate_virtual_server(&vs);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].to_string(),
            "spec.routes[0].action.pass: Not found: \"coffee\""
        );
    }

    #[rstest]
    fn test_errors_accumulate(cafe: VirtualServer) {
        let mut spec = cafe.spec().clone();
        spec.host = Hostname::new("bad_host");
        spec.routes.push(spec.routes[0].clone());
        spec.routes.push(
            Route::builder()
                .path("relative")
                .action(RouteAction::builder().pass("tea").build())
                .build(),
        );
        let vs = VirtualServer::builder()
            .metadata(cafe.metadata().clone())
            .spec(spec)
            .build();

        let paths: Vec<String> = validate_virtual_server(&vs)
            .iter()
            .map(|e| e.path().to_string())
            .collect();
        assert_eq!(
            paths,
            vec!["spec.host", "spec.routes[1].path", "spec.routes[2].path"]
        );
    }

    #[test]
    fn test_deserialize_custom_listeners() {
        let yaml = r"
host: cafe.example.com
listener:
  http: http-8085
  https: https-8445
upstreams: []
routes: []
";
        let spec: VirtualServerSpec = assertables::assert_ok!(serde_yaml::from_str(yaml));
        let listener = assertables::assert_some!(spec.listener().as_ref());
        assert_eq!(listener.http().as_deref(), Some("http-8085"));
        assert_eq!(listener.https().as_deref(), Some("https-8445"));
        assert!(listener.is_declared());
    }
}
