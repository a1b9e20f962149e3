use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total batches submitted. Labels: status.
pub const BATCHES_TOTAL: &str = "rollcall_batches_total";

/// Histogram: batch latency in seconds.
pub const BATCH_DURATION_SECONDS: &str = "rollcall_batch_duration_seconds";

/// Counter: seats granted (direct enrollments, not promotions).
pub const ENROLLMENTS_TOTAL: &str = "rollcall_enrollments_total";

/// Counter: waitlist entries created. Labels: reason.
pub const WAITLISTED_TOTAL: &str = "rollcall_waitlisted_total";

/// Counter: cancellations applied.
pub const CANCELLATIONS_TOTAL: &str = "rollcall_cancellations_total";

/// Counter: waitlist promotions applied.
pub const PROMOTIONS_TOTAL: &str = "rollcall_promotions_total";

/// Counter: per-person rejections inside batches. Labels: reason.
pub const REJECTIONS_TOTAL: &str = "rollcall_rejections_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Counter: post-batch invariant failures (enrolled > capacity). Should be 0.
pub const CAPACITY_BREACHES_TOTAL: &str = "rollcall_capacity_breaches_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "rollcall_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "rollcall_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
