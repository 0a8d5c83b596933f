use super::{CompiledConfig, ConfigWriter, Listen};
use crate::settings::ZoneSyncSettings;

pub const ZONE_SYNC_FILE_NAME: &str = "zone_sync.conf";

/// Renders the stream server that synchronizes shared-memory zones between
/// replicas, discovered through the headless service. `None` when zone sync
/// is disabled.
pub fn emit_zone_sync(settings: &ZoneSyncSettings, disable_ipv6: bool) -> Option<CompiledConfig> {
    if !settings.enabled() {
        return None;
    }

    let mut writer = ConfigWriter::new();
    writer.directive(format_args!(
        "resolver {} valid={};",
        settings.resolver_address(),
        settings.resolver_valid()
    ));
    writer.blank();
    writer.block("server", |w| {
        Listen::builder()
            .port(settings.port())
            .build()
            .write(w, None, None, disable_ipv6);
        w.blank();
        w.directive("zone_sync;");
        w.directive(format_args!(
            "zone_sync_server {}.{}.svc.cluster.local:{} resolve;",
            settings.headless_service(),
            settings.namespace(),
            settings.port()
        ));
    });

    Some(CompiledConfig::new(ZONE_SYNC_FILE_NAME, writer.finish()))
}
