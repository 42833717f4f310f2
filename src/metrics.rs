// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{Encoder, Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Countdown gate --------
pub static GATES_REQUESTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gates_requested_total", "gated actions requested (label: kind)"),
        &["kind"],
    )
    .unwrap()
});

pub static GATES_SUPERSEDED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gates_superseded_total", "pending actions replaced by a newer request"),
        &["kind"],
    )
    .unwrap()
});

pub static GATES_FIRED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(Opts::new("gates_fired_total", "gated actions executed"), &["kind"]).unwrap()
});

pub static GATES_CANCELLED: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("gates_cancelled_total", "pending actions cancelled").unwrap());

pub static GATE_TICKS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("gate_ticks_total", "countdown seconds elapsed").unwrap());

// -------- Ledger --------
pub static LEDGERS_GENERATED: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("ledgers_generated_total", "ledger regenerations").unwrap());

pub static LEDGER_RECORDS: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("ledger_records", "records in the current ledger").unwrap());

pub static LEDGER_FINAL_BALANCE: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("ledger_final_balance", "closing balance of the last record").unwrap());

pub static UNLOCKS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("notes_unlocked_total", "record indices unlocked").unwrap());

pub static ANNOTATIONS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("annotation_edits_total", "annotation edits applied").unwrap());

// -------- Persistence --------
pub static STORE_WRITE_ERRORS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("store_write_errors_total", "failed store writes").unwrap());

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(GATES_REQUESTED.clone())),
        REGISTRY.register(Box::new(GATES_SUPERSEDED.clone())),
        REGISTRY.register(Box::new(GATES_FIRED.clone())),
        REGISTRY.register(Box::new(GATES_CANCELLED.clone())),
        REGISTRY.register(Box::new(GATE_TICKS.clone())),
        REGISTRY.register(Box::new(LEDGERS_GENERATED.clone())),
        REGISTRY.register(Box::new(LEDGER_RECORDS.clone())),
        REGISTRY.register(Box::new(LEDGER_FINAL_BALANCE.clone())),
        REGISTRY.register(Box::new(UNLOCKS.clone())),
        REGISTRY.register(Box::new(ANNOTATIONS.clone())),
        REGISTRY.register(Box::new(STORE_WRITE_ERRORS.clone())),
    ] {
        let _ = m;
    }
}

// Encode all metrics in Prometheus text format
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_includes_registered_families() {
        init();
        GATE_TICKS.inc();
        GATES_FIRED.with_label_values(&["calculate"]).inc();
        let text = encode_metrics();
        assert!(text.contains("gate_ticks_total"));
        assert!(text.contains("gates_fired_total{kind=\"calculate\"}"));
    }
}
