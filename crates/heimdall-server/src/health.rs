//! `/health` endpoint.

use std::time::Instant;

use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"`, or `"shutting_down"` once shutdown has begun.
    pub status: String,
    /// Seconds since the server was built.
    pub uptime_secs: u64,
    /// Topics with at least one subscriber.
    pub topics: usize,
    /// Open subscriptions across all topics.
    pub subscribers: usize,
    /// Registered actions.
    pub actions: usize,
}

/// Snapshot of live counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthCounters {
    /// See [`HealthResponse::topics`].
    pub topics: usize,
    /// See [`HealthResponse::subscribers`].
    pub subscribers: usize,
    /// See [`HealthResponse::actions`].
    pub actions: usize,
    /// Whether shutdown has begun.
    pub shutting_down: bool,
}

/// Build a health response.
pub fn health_check(start_time: Instant, counters: HealthCounters) -> HealthResponse {
    HealthResponse {
        status: if counters.shutting_down { "shutting_down" } else { "ok" }.into(),
        uptime_secs: start_time.elapsed().as_secs(),
        topics: counters.topics,
        subscribers: counters.subscribers,
        actions: counters.actions,
    }
}
