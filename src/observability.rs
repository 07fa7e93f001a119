use std::net::SocketAddr;

// ── Store writes ────────────────────────────────────────────────

/// Counter: create/update/delete calls to the store. Labels: op, status.
pub const REMOTE_WRITES_TOTAL: &str = "chairtime_remote_writes_total";

/// Histogram: store write latency in seconds. Labels: op.
pub const REMOTE_WRITE_DURATION_SECONDS: &str = "chairtime_remote_write_duration_seconds";

/// Counter: full reloads triggered by a failed update or delete.
pub const RELOADS_TOTAL: &str = "chairtime_reloads_total";

/// Counter: store documents that failed strict decoding.
pub const MALFORMED_DOCUMENTS_TOTAL: &str = "chairtime_malformed_documents_total";

// ── Local edit state ────────────────────────────────────────────

/// Gauge: pending ledger entries.
pub const LEDGER_PENDING: &str = "chairtime_ledger_pending";

/// Counter: external calendar sync failures. Labels: op.
pub const SYNC_FAILURES_TOTAL: &str = "chairtime_sync_failures_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), String> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install Prometheus metrics exporter: {e}"))?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Record one store write and its latency.
pub fn record_write(op: &'static str, ok: bool, started: std::time::Instant) {
    let status = if ok { "ok" } else { "error" };
    metrics::counter!(REMOTE_WRITES_TOTAL, "op" => op, "status" => status).increment(1);
    metrics::histogram!(REMOTE_WRITE_DURATION_SECONDS, "op" => op)
        .record(started.elapsed().as_secs_f64());
}
