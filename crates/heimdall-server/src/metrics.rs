//! Prometheus recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder.
///
/// Call once per process, before anything records. A second call fails
/// because a recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render the Prometheus text exposition.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// Action invocations that resolved to a registered action (counter, labels: action).
pub const ACTION_REQUESTS_TOTAL: &str = "heimdall_action_requests_total";
/// Failed dispatches (counter, labels: action, error_type).
pub const ACTION_ERRORS_TOTAL: &str = "heimdall_action_errors_total";
/// Handler run time (histogram, labels: action).
pub const ACTION_DURATION_SECONDS: &str = "heimdall_action_duration_seconds";
/// Streams opened (counter).
pub const STREAMS_TOTAL: &str = "heimdall_streams_total";
/// Open streams (gauge).
pub const STREAMS_ACTIVE: &str = "heimdall_streams_active";
/// Messages written to streams (counter).
pub const STREAM_MESSAGES_SENT: &str = "heimdall_stream_messages_sent_total";
/// Messages dropped at delivery because they had expired (counter).
pub const STREAM_MESSAGES_EXPIRED: &str = "heimdall_stream_messages_expired_total";
