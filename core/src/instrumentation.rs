use crate::resources::ResourceKind;
use crate::status::State;
use opentelemetry::KeyValue;
use opentelemetry::global::meter;
use opentelemetry::metrics::{Counter, Meter};
use std::sync::{LazyLock, Once};

pub(crate) static METER: LazyLock<Meter> = LazyLock::new(|| meter("ingress-core"));

static INIT: Once = Once::new();

/// Installs the global `tracing` subscriber. `RUST_LOG` overrides the
/// default `info` filter. Safe to call more than once.
pub fn init_instrumentation() {
    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_target(false)
            .with_thread_ids(true)
            .with_level(true)
            .finish();

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Failed to set tracing subscriber: {err}");
        }
    });
}

pub(crate) fn record_reconciliation(kind: ResourceKind, state: State) {
    static COUNTER: LazyLock<Counter<u64>> = LazyLock::new(|| {
        METER
            .u64_counter("ingress_reconciliations")
            .with_description("Number of resource reconciliations by kind and resulting state")
            .build()
    });

    let kind: &'static str = kind.into();
    let state: &'static str = state.into();
    COUNTER.add(
        1,
        &[KeyValue::new("kind", kind), KeyValue::new("state", state)],
    );
}
