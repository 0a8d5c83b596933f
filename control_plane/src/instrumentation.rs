use crate::controllers::Outcome;
use opentelemetry::KeyValue;
use opentelemetry::global::meter;
use opentelemetry::metrics::{Counter, Meter};
use std::sync::LazyLock;

pub(crate) static METER: LazyLock<Meter> = LazyLock::new(|| meter("ingress-controller"));

pub(crate) fn record_outcome(outcome: Outcome) {
    static COUNTER: LazyLock<Counter<u64>> = LazyLock::new(|| {
        METER
            .u64_counter("ingress_controller_reconcile_outcomes")
            .with_description("Number of reconcile attempts by outcome")
            .build()
    });

    let outcome: &'static str = outcome.into();
    COUNTER.add(1, &[KeyValue::new("outcome", outcome)]);
}
