use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::sql::{Command, SqlError};

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "roombook_queries_total";

/// Command label for statements the SQL parser rejected.
pub const PARSE_ERROR_LABEL: &str = "parse_error";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "roombook_query_duration_seconds";

/// Counter: admission attempts. Labels: outcome
/// (admitted, invalid, invalid_interval, past_start, overlap).
pub const ADMISSIONS_TOTAL: &str = "roombook_admissions_total";

/// Counter: cancellation attempts. Labels: outcome (cancelled, not_found).
pub const CANCELLATIONS_TOTAL: &str = "roombook_cancellations_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: reservations currently held across all rooms.
pub const RESERVATIONS_ACTIVE: &str = "roombook_reservations_active";

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "roombook_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "roombook_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "roombook_connections_rejected_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertReservation { .. } => "insert_reservation",
        Command::DeleteReservation { .. } => "delete_reservation",
        Command::SelectReservations { .. } => "select_reservations",
    }
}

/// Label for a parse outcome; rejected statements get [`PARSE_ERROR_LABEL`].
pub fn statement_label(parsed: &Result<Command, SqlError>) -> &'static str {
    match parsed {
        Ok(cmd) => command_label(cmd),
        Err(_) => PARSE_ERROR_LABEL,
    }
}
