use crate::instrumentation::METER;
use opentelemetry::KeyValue;
use opentelemetry::metrics::Counter;
use std::sync::LazyLock;
use tracing::trace;

static SET_APPLIED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("ingress_signal_set_applied")
        .with_description("Number of times a signal value was replaced")
        .build()
});

static SET_SKIPPED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("ingress_signal_set_skipped")
        .with_description("Number of times a signal value was left unchanged")
        .build()
});

#[inline]
pub fn record_set_applied(name: &'static str) {
    trace!("Set value in signal {}", name);
    SET_APPLIED.add(1, &[KeyValue::new("signal", name)]);
}

#[inline]
pub fn record_set_skipped(name: &'static str) {
    trace!("Skipped setting unchanged value in signal {}", name);
    SET_SKIPPED.add(1, &[KeyValue::new("signal", name)]);
}
