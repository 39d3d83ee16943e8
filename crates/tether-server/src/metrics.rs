//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render the `/metrics` endpoint. Fails if a
/// recorder is already installed in this process.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// WebSocket connections opened total (counter, labels: listener).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter, labels: listener).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// WebSocket connection duration seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Routed envelopes total (counter, labels: mode).
pub const RELAY_ENVELOPES_TOTAL: &str = "relay_envelopes_total";
/// Rejected frames and upgrades total (counter, labels: reason).
pub const RELAY_REJECTED_TOTAL: &str = "relay_rejected_total";
/// Per-recipient send failures total (counter).
pub const RELAY_SEND_FAILURES_TOTAL: &str = "relay_send_failures_total";
/// Outstanding correlation entries (gauge).
pub const RELAY_CORRELATIONS_PENDING: &str = "relay_correlations_pending";
/// Correlation entries dropped by the expiry sweeper (counter).
pub const RELAY_CORRELATIONS_EXPIRED_TOTAL: &str = "relay_correlations_expired_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_from_local_recorder() {
        // Build a recorder + handle (no global install to avoid test conflicts).
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = render(&handle);
        assert!(output.is_empty() || output.contains('#') || output.contains('\n'));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_CONNECTION_DURATION_SECONDS,
            RELAY_ENVELOPES_TOTAL,
            RELAY_REJECTED_TOTAL,
            RELAY_SEND_FAILURES_TOTAL,
            RELAY_CORRELATIONS_PENDING,
            RELAY_CORRELATIONS_EXPIRED_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name not snake_case: {name}"
            );
        }
    }

    #[test]
    fn metric_constants_are_unique() {
        let mut names = vec![
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_CONNECTION_DURATION_SECONDS,
            RELAY_ENVELOPES_TOTAL,
            RELAY_REJECTED_TOTAL,
            RELAY_SEND_FAILURES_TOTAL,
            RELAY_CORRELATIONS_PENDING,
            RELAY_CORRELATIONS_EXPIRED_TOTAL,
        ];
        let len = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), len);
    }
}
