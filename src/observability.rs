use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::engine::EngineError;

// ── Request metrics ─────────────────────────────────────────────

/// Counter: reservation requests. Labels: outcome (`ok` or an error kind).
pub const RESERVATION_REQUESTS_TOTAL: &str = "chalet_reservation_requests_total";

/// Counter: lifecycle transitions attempted. Labels: action, outcome.
pub const TRANSITIONS_TOTAL: &str = "chalet_transitions_total";

/// Counter: calendar replaces. Labels: scope (`all` or `year`).
pub const SCHEDULE_REPLACEMENTS_TOTAL: &str = "chalet_schedule_replacements_total";

// ── State metrics ───────────────────────────────────────────────

/// Gauge: current calendar snapshot version.
pub const CALENDAR_VERSION: &str = "chalet_calendar_version";

/// Gauge: non-terminal reservations in the book.
pub const RESERVATIONS_ACTIVE: &str = "chalet_reservations_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "chalet_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "chalet_wal_flush_batch_size";

/// Counter: completed WAL compactions.
pub const WAL_COMPACTIONS_TOTAL: &str = "chalet_wal_compactions_total";

/// Install the Prometheus exporter on `port`. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Outcome label for a request result.
pub fn outcome_label<T>(result: &Result<T, EngineError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    }
}
