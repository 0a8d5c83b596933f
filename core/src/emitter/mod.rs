mod directives;
mod zone_sync;

pub use directives::*;
pub use zone_sync::*;

use crate::listeners::{Binding, ListenerContext, ListenerDefinition, ListenerProtocol};
use crate::net::Port;
use crate::policies::{AccessEffect, Resolution, ResolvedRateLimit};
use crate::resources::{
    ObjectRef, Resource, ResourceKind, TransportServer, Upstream, VirtualServer,
};
use crate::settings::Settings;
use getset::{CopyGetters, Getters};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use typed_builder::TypedBuilder;

pub const SECRETS_DIR: &str = "/etc/nginx/secrets";

/// Rendering switches taken from the controller settings.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters, TypedBuilder)]
pub struct EmitterSettings {
    #[getset(get_copy = "pub")]
    #[builder(default)]
    disable_ipv6: bool,

    #[getset(get_copy = "pub")]
    #[builder(default)]
    proxy_protocol: bool,

    #[getset(get_copy = "pub")]
    #[builder(default = Port::new(crate::settings::DEFAULT_HTTP_PORT))]
    default_http_port: Port,

    #[getset(get_copy = "pub")]
    #[builder(default = Port::new(crate::settings::DEFAULT_HTTPS_PORT))]
    default_https_port: Port,

    #[getset(get = "pub")]
    #[builder(default = crate::settings::DEFAULT_UPSTREAM_ZONE_SIZE.to_string(), setter(into))]
    upstream_zone_size: String,

    /// Rate-limit zones are shared between replicas.
    #[getset(get_copy = "pub")]
    #[builder(default)]
    zone_sync: bool,
}

impl Default for EmitterSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl From<&Settings> for EmitterSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            disable_ipv6: settings.disable_ipv6(),
            proxy_protocol: settings.proxy_protocol(),
            default_http_port: settings.default_http_port(),
            default_https_port: settings.default_https_port(),
            upstream_zone_size: settings.upstream_zone_size().clone(),
            zone_sync: settings.zone_sync().enabled(),
        }
    }
}

/// Rendered configuration for one resource version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Getters, Serialize)]
pub struct CompiledConfig {
    #[getset(get = "pub")]
    file_name: String,

    #[getset(get = "pub")]
    text: String,
}

impl CompiledConfig {
    pub fn new<F: Into<String>, T: Into<String>>(file_name: F, text: T) -> Self {
        Self {
            file_name: file_name.into(),
            text: text.into(),
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.text.contains(needle)
    }

    /// `vs_{namespace}_{name}.conf` and friends.
    pub fn file_name_for(object_ref: &ObjectRef) -> String {
        let prefix = match object_ref.kind() {
            ResourceKind::VirtualServer => "vs",
            ResourceKind::TransportServer => "ts",
            ResourceKind::GlobalConfiguration => "gc",
            ResourceKind::Policy => "pol",
            ResourceKind::ControllerState => "state",
        };
        format!("{}_{}_{}.conf", prefix, object_ref.namespace(), object_ref.name())
    }
}

impl Display for CompiledConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

fn upstream_name(prefix: &str, owner: &ObjectRef, upstream: &str) -> String {
    zone_name([prefix, owner.namespace().as_str(), owner.name().as_str(), upstream])
}

fn write_upstream(
    writer: &mut ConfigWriter,
    name: &str,
    upstream: &Upstream,
    namespace: &str,
    settings: &EmitterSettings,
) {
    writer.block(format_args!("upstream {name}"), |w| {
        w.directive(format_args!("zone {} {};", name, settings.upstream_zone_size));
        w.directive(format_args!(
            "server {}.{}.svc.cluster.local:{} resolve;",
            upstream.service(),
            namespace,
            upstream.port()
        ));
    });
    writer.blank();
}

fn rate_limit_zone(rate_limit: &ResolvedRateLimit, owner: &ObjectRef) -> String {
    zone_name([
        "pol_rl",
        rate_limit.key().namespace().as_str(),
        rate_limit.key().name().as_str(),
        owner.namespace().as_str(),
        owner.name().as_str(),
    ])
}

fn write_limit_req_zone(
    writer: &mut ConfigWriter,
    zone: &str,
    rate_limit: &ResolvedRateLimit,
    settings: &EmitterSettings,
) {
    let policy = rate_limit.policy();
    let sync = if settings.zone_sync { " sync" } else { "" };
    writer.directive(format_args!(
        "limit_req_zone {} zone={}:{} rate={}{};",
        policy.key(),
        zone,
        policy.zone_size(),
        rate_limit.effective_rate(),
        sync
    ));
}

fn write_limit_req(writer: &mut ConfigWriter, zone: &str, rate_limit: &ResolvedRateLimit) {
    let policy = rate_limit.policy();
    let mut limit_req = format!("limit_req zone={zone}");
    if let Some(burst) = policy.burst() {
        limit_req.push_str(&format!(" burst={burst}"));
    }
    if policy.no_delay() {
        limit_req.push_str(" nodelay");
    } else if let Some(delay) = policy.delay() {
        limit_req.push_str(&format!(" delay={delay}"));
    }
    limit_req.push(';');

    writer.directive(limit_req);
    if let Some(level) = policy.log_level() {
        writer.directive(format_args!("limit_req_log_level {level};"));
    }
    writer.directive(format_args!("limit_req_status {};", policy.reject_code()));
    if policy.dry_run() {
        writer.directive("limit_req_dry_run on;");
    }
}

fn write_access_control(writer: &mut ConfigWriter, resolution: &Resolution) {
    let Some(access_control) = resolution.access_control() else {
        return;
    };
    let policy = access_control.policy();
    for source in policy.sources() {
        writer.directive(format_args!("{} {};", policy.effect(), source));
    }
    match policy.effect() {
        AccessEffect::Allow => writer.directive("deny all;"),
        AccessEffect::Deny => writer.directive("allow all;"),
    };
}

fn write_http_listeners(
    writer: &mut ConfigWriter,
    virtual_server: &VirtualServer,
    binding: &Binding,
    settings: &EmitterSettings,
) {
    let write = |writer: &mut ConfigWriter, listener: &ListenerDefinition| {
        Listen::builder()
            .port(listener.port())
            .ssl(listener.ssl())
            .proxy_protocol(settings.proxy_protocol)
            .build()
            .write(writer, listener.ipv4(), listener.ipv6(), settings.disable_ipv6);
    };

    if binding.has_bound() {
        if let Some(listener) = binding.bound_in(ListenerContext::HttpBlock) {
            write(writer, listener);
        }
        if let Some(listener) = binding.bound_in(ListenerContext::HttpsBlock) {
            write(writer, listener);
        }
        return;
    }

    Listen::builder()
        .port(settings.default_http_port)
        .proxy_protocol(settings.proxy_protocol)
        .build()
        .write(writer, None, None, settings.disable_ipv6);
    if virtual_server.spec().tls().is_some() {
        Listen::builder()
            .port(settings.default_https_port)
            .ssl(true)
            .proxy_protocol(settings.proxy_protocol)
            .build()
            .write(writer, None, None, settings.disable_ipv6);
    }
}

/// Renders a VirtualServer. `resolutions` holds one entry per route, in
/// route order. Custom listeners replace the default ones only when at
/// least one of them bound.
pub fn emit_virtual_server(
    virtual_server: &VirtualServer,
    binding: &Binding,
    resolutions: &[Resolution],
    settings: &EmitterSettings,
) -> CompiledConfig {
    let spec = virtual_server.spec();
    debug_assert_eq!(
        spec.routes().len(),
        resolutions.len(),
        "one resolution per route"
    );

    let owner = virtual_server.object_ref();
    let namespace = owner.namespace().as_str();
    let mut writer = ConfigWriter::new();

    let upstreams: BTreeMap<&str, String> = spec
        .upstreams()
        .iter()
        .map(|upstream| {
            (
                upstream.name().as_str(),
                upstream_name("vs", &owner, upstream.name()),
            )
        })
        .collect();
    for upstream in spec.upstreams() {
        if let Some(name) = upstreams.get(upstream.name().as_str()) {
            write_upstream(&mut writer, name, upstream, namespace, settings);
        }
    }

    let zones: BTreeMap<String, &ResolvedRateLimit> = resolutions
        .iter()
        .filter(|resolution| !resolution.is_rejected())
        .filter_map(|resolution| resolution.rate_limit().as_ref())
        .map(|rate_limit| (rate_limit_zone(rate_limit, &owner), rate_limit))
        .collect();
    for (zone, rate_limit) in &zones {
        write_limit_req_zone(&mut writer, zone, rate_limit, settings);
    }
    writer.blank();

    writer.block("server", |w| {
        write_http_listeners(w, virtual_server, binding, settings);
        w.blank();
        w.directive(format_args!("server_name {};", spec.host()));

        if let Some(tls) = spec.tls() {
            w.blank();
            w.directive(format_args!(
                "ssl_certificate {}/{}-{};",
                SECRETS_DIR,
                namespace,
                tls.secret()
            ));
            w.directive(format_args!(
                "ssl_certificate_key {}/{}-{};",
                SECRETS_DIR,
                namespace,
                tls.secret()
            ));
        }
        w.blank();

        for (route, resolution) in spec.routes().iter().zip(resolutions) {
            w.block(format_args!("location {}", route.path()), |w| {
                if resolution.is_rejected() {
                    w.directive("return 500;");
                    return;
                }
                write_access_control(w, resolution);
                if let Some(rate_limit) = resolution.rate_limit() {
                    write_limit_req(w, &rate_limit_zone(rate_limit, &owner), rate_limit);
                }
                match upstreams.get(route.action().pass().as_str()) {
                    Some(upstream) => w.directive(format_args!("proxy_pass http://{upstream};")),
                    None => w.directive("return 502;"),
                };
            });
            w.blank();
        }
    });

    CompiledConfig::new(CompiledConfig::file_name_for(&owner), writer.finish())
}

/// Renders a TransportServer on the listener it bound to.
pub fn emit_transport_server(
    transport_server: &TransportServer,
    listener: &ListenerDefinition,
    settings: &EmitterSettings,
) -> CompiledConfig {
    debug_assert!(
        !listener.protocol().is_http(),
        "transport listener must be TCP or UDP"
    );
    debug_assert_eq!(transport_server.spec().listener().name(), listener.name());

    let spec = transport_server.spec();
    let owner = transport_server.object_ref();
    let namespace = owner.namespace().as_str();
    let mut writer = ConfigWriter::new();

    for upstream in spec.upstreams() {
        let name = upstream_name("ts", &owner, upstream.name());
        write_upstream(&mut writer, &name, upstream, namespace, settings);
    }

    writer.block("server", |w| {
        Listen::builder()
            .port(listener.port())
            .udp(listener.protocol() == ListenerProtocol::Udp)
            .build()
            .write(w, listener.ipv4(), listener.ipv6(), settings.disable_ipv6);
        w.blank();
        w.directive(format_args!(
            "proxy_pass {};",
            upstream_name("ts", &owner, spec.action().pass())
        ));
    });

    CompiledConfig::new(CompiledConfig::file_name_for(&owner), writer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listeners::{
        ListenerReference, ListenerRegistry, ListenerRules, bind, bind_virtual_server,
        build_registry, transport_server_reference,
    };
    use crate::policies::{PolicyReference, PolicyScope, PolicyStore, PolicyKey, resolve};
    use crate::resources::{
        AccessControlSpec, GlobalConfiguration, GlobalConfigurationSpec, ListenerDeclaration,
        ObjectMeta, Policy, PolicySpec, RateLimitSpec, Route, RouteAction, TransportServerAction,
        TransportServerListener, TransportServerSpec, VirtualServerListener, VirtualServerSpec,
        VirtualServerTls,
    };
    use assertables::{assert_contains, assert_not_contains};
    use rstest::{fixture, rstest};

    #[fixture]
    fn registry() -> ListenerRegistry {
        let gc = GlobalConfiguration::builder()
            .metadata(ObjectMeta::builder().name("nginx-configuration").build())
            .spec(
                GlobalConfigurationSpec::builder()
                    .listeners(vec![
                        ListenerDeclaration::builder()
                            .name("http-8085")
                            .port(8085)
                            .protocol("HTTP")
                            .build(),
                        ListenerDeclaration::builder()
                            .name("https-8445")
                            .port(8445)
                            .protocol("HTTPS")
                            .ssl(true)
                            .build(),
                        ListenerDeclaration::builder()
                            .name("dns-udp")
                            .port(5353)
                            .protocol("UDP")
                            .build(),
                    ])
                    .build(),
            )
            .build();
        build_registry(Some(&gc), &ListenerRules::default()).0
    }

    fn cafe(listener: Option<VirtualServerListener>, routes: Vec<Route>) -> VirtualServer {
        let spec = VirtualServerSpec::builder()
            .host("cafe.example.com")
            .tls(VirtualServerTls::builder().secret("cafe-secret").build())
            .upstreams(vec![
                Upstream::builder()
                    .name("tea")
                    .service("tea-svc")
                    .port(Port::new(80))
                    .build(),
            ])
            .routes(routes)
            .build();
        let spec = match listener {
            Some(listener) => VirtualServerSpec::builder()
                .host(spec.host().clone())
                .tls(VirtualServerTls::builder().secret("cafe-secret").build())
                .listener(listener)
                .upstreams(spec.upstreams().clone())
                .routes(spec.routes().clone())
                .build(),
            None => spec,
        };
        VirtualServer::builder()
            .metadata(ObjectMeta::builder().name("cafe").namespace("default").build())
            .spec(spec)
            .build()
    }

    fn tea_route(policies: Vec<crate::resources::PolicyRef>) -> Route {
        Route::builder()
            .path("/tea")
            .policies(policies)
            .action(RouteAction::builder().pass("tea").build())
            .build()
    }

    fn both_listeners() -> VirtualServerListener {
        VirtualServerListener::builder()
            .http("http-8085")
            .https("https-8445")
            .build()
    }

    fn render(
        registry: &ListenerRegistry,
        virtual_server: &VirtualServer,
        resolutions: &[Resolution],
        settings: &EmitterSettings,
    ) -> CompiledConfig {
        let binding = bind_virtual_server(registry, virtual_server.spec());
        emit_virtual_server(virtual_server, &binding, resolutions, settings)
    }

    #[rstest]
    fn test_custom_listeners(registry: ListenerRegistry) {
        let vs = cafe(Some(both_listeners()), vec![tea_route(vec![])]);
        let config = render(&registry, &vs, &[Resolution::default()], &EmitterSettings::default());

        assert_eq!(config.file_name(), "vs_default_cafe.conf");
        for line in [
            "listen 8085;",
            "listen [::]:8085;",
            "listen 8445 ssl;",
            "listen [::]:8445 ssl;",
            "server_name cafe.example.com;",
            "proxy_pass http://vs_default_cafe_tea_ee996d6a;",
            "server tea-svc.default.svc.cluster.local:80 resolve;",
            "zone vs_default_cafe_tea_ee996d6a 256k;",
        ] {
            assert_contains!(config.text(), line);
        }
        assert_not_contains!(config.text(), "listen 80;");
        assert_not_contains!(config.text(), "listen 443 ssl;");
    }

    #[rstest]
    fn test_partial_binding_exposes_bound_listener_only(registry: ListenerRegistry) {
        let listener = VirtualServerListener::builder()
            .http("http-8085")
            .https("https-8446")
            .build();
        let vs = cafe(Some(listener), vec![tea_route(vec![])]);
        let config = render(&registry, &vs, &[Resolution::default()], &EmitterSettings::default());

        assert_contains!(config.text(), "listen 8085;");
        assert_not_contains!(config.text(), "8446");
        assert_not_contains!(config.text(), "listen 443 ssl;");
        assert_not_contains!(config.text(), "listen 80;");
    }

    #[rstest]
    #[case(None)]
    #[case(Some(VirtualServerListener::builder().http("http-9999").https("https-9999").build()))]
    fn test_default_listeners_fallback(
        registry: ListenerRegistry,
        #[case] listener: Option<VirtualServerListener>,
    ) {
        let vs = cafe(listener, vec![tea_route(vec![])]);
        let config = render(&registry, &vs, &[Resolution::default()], &EmitterSettings::default());
        for line in ["listen 80;", "listen [::]:80;", "listen 443 ssl;", "listen [::]:443 ssl;"] {
            assert_contains!(config.text(), line);
        }
    }

    #[rstest]
    fn test_disable_ipv6(registry: ListenerRegistry) {
        let vs = cafe(Some(both_listeners()), vec![tea_route(vec![])]);
        let settings = EmitterSettings::builder().disable_ipv6(true).build();
        let config = render(&registry, &vs, &[Resolution::default()], &settings);
        assert_contains!(config.text(), "listen 8085;");
        assert_not_contains!(config.text(), "[::]");
    }

    #[rstest]
    fn test_proxy_protocol(registry: ListenerRegistry) {
        let vs = cafe(None, vec![tea_route(vec![])]);
        let settings = EmitterSettings::builder().proxy_protocol(true).build();
        let config = render(&registry, &vs, &[Resolution::default()], &settings);
        assert_contains!(config.text(), "listen 80 proxy_protocol;");
        assert_contains!(config.text(), "listen [::]:443 ssl proxy_protocol;");
    }

    fn policies() -> PolicyStore {
        let rate_limit = Policy::builder()
            .metadata(
                ObjectMeta::builder()
                    .name("rate-limit-primary")
                    .namespace("default")
                    .build(),
            )
            .spec(
                PolicySpec::builder()
                    .rate_limit(
                        RateLimitSpec::builder()
                            .rate("10r/s")
                            .key("${binary_remote_addr}")
                            .zone_size("10M")
                            .burst(5)
                            .no_delay(true)
                            .log_level("warn")
                            .reject_code(429)
                            .build(),
                    )
                    .build(),
            )
            .build();
        let access_control = Policy::builder()
            .metadata(
                ObjectMeta::builder()
                    .name("allow-internal")
                    .namespace("default")
                    .build(),
            )
            .spec(
                PolicySpec::builder()
                    .access_control(
                        AccessControlSpec::builder()
                            .allow(vec!["10.0.0.0/8".to_string(), "192.168.1.10".to_string()])
                            .build(),
                    )
                    .build(),
            )
            .build();
        PolicyStore::from_policies([&rate_limit, &access_control])
    }

    fn route_refs(names: &[&str]) -> Vec<PolicyReference> {
        names
            .iter()
            .map(|name| PolicyReference::new(PolicyKey::new("default", *name), PolicyScope::Route))
            .collect()
    }

    #[rstest]
    #[case(false, "limit_req_zone ${binary_remote_addr} zone=pol_rl_default_rate_limit_primary_default_cafe_8c48a4ae:10M rate=10r/s;")]
    #[case(true, "limit_req_zone ${binary_remote_addr} zone=pol_rl_default_rate_limit_primary_default_cafe_8c48a4ae:10M rate=10r/s sync;")]
    fn test_rate_limit_rendering(
        registry: ListenerRegistry,
        #[case] zone_sync: bool,
        #[case] expected_zone: &str,
    ) {
        let vs = cafe(None, vec![tea_route(vec![])]);
        let resolution = resolve(
            &[],
            &route_refs(&["rate-limit-primary", "allow-internal"]),
            &policies(),
            Some(1),
        );
        let settings = EmitterSettings::builder().zone_sync(zone_sync).build();
        let config = render(&registry, &vs, &[resolution], &settings);

        assert_contains!(config.text(), expected_zone);
        for line in [
            "limit_req zone=pol_rl_default_rate_limit_primary_default_cafe_8c48a4ae burst=5 nodelay;",
            "limit_req_log_level warn;",
            "limit_req_status 429;",
            "allow 10.0.0.0/8;",
            "allow 192.168.1.10;",
            "deny all;",
        ] {
            assert_contains!(config.text(), line);
        }
        assert_not_contains!(config.text(), "limit_req_dry_run");
    }

    #[rstest]
    fn test_rejected_route_returns_500(registry: ListenerRegistry) {
        let vs = cafe(None, vec![tea_route(vec![])]);
        let resolution = resolve(&[], &route_refs(&["deleted-policy"]), &policies(), Some(1));
        let config = render(&registry, &vs, &[resolution], &EmitterSettings::default());

        assert_contains!(config.text(), "location /tea {\n        return 500;\n    }");
        assert_not_contains!(config.text(), "proxy_pass");
        assert_not_contains!(config.text(), "limit_req");
    }

    #[rstest]
    fn test_emission_is_deterministic(registry: ListenerRegistry) {
        let vs = cafe(Some(both_listeners()), vec![tea_route(vec![])]);
        let resolution = resolve(&[], &route_refs(&["rate-limit-primary"]), &policies(), Some(2));
        let first = render(&registry, &vs, &[resolution.clone()], &EmitterSettings::default());
        let second = render(&registry, &vs, &[resolution], &EmitterSettings::default());
        assert_eq!(first, second);
        assert_contains!(first.text(), "rate=10r/s;");
    }

    #[rstest]
    fn test_transport_server(registry: ListenerRegistry) {
        let ts = TransportServer::builder()
            .metadata(ObjectMeta::builder().name("dns").namespace("default").build())
            .spec(
                TransportServerSpec::builder()
                    .listener(
                        TransportServerListener::builder()
                            .name("dns-udp")
                            .protocol("UDP")
                            .build(),
                    )
                    .upstreams(vec![
                        Upstream::builder()
                            .name("dns-app")
                            .service("coredns")
                            .port(Port::new(5353))
                            .build(),
                    ])
                    .action(TransportServerAction::builder().pass("dns-app").build())
                    .build(),
            )
            .build();
        let reference: Vec<ListenerReference> =
            transport_server_reference(ts.spec()).into_iter().collect();
        let binding = bind(&registry, &reference);
        let listener = binding.bound().next().map(|(_, listener)| listener.clone());
        let Some(listener) = listener else {
            panic!("dns-udp should bind");
        };

        let config = emit_transport_server(&ts, &listener, &EmitterSettings::default());
        assert_eq!(config.file_name(), "ts_default_dns.conf");
        for line in [
            "upstream ts_default_dns_dns_app_5c187caa {",
            "listen 5353 udp;",
            "listen [::]:5353 udp;",
            "proxy_pass ts_default_dns_dns_app_5c187caa;",
        ] {
            assert_contains!(config.text(), line);
        }
    }
}
