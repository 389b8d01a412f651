//! `GET {base}/v1/bifrost/token` and `GET {base}/v1/bifrost`

use std::time::Duration;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::header::CACHE_CONTROL;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::sse::Sse;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, error, warn};

use super::pump::{frames, run_stream};
use crate::actions::ProblemDetails;
use crate::security::endpoints::no_cache;
use crate::server::AppState;

/// Frames buffered between the pump task and the response body.
const STREAM_CHANNEL_CAPACITY: usize = 16;

/// Query string of the token endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    /// Topic the token will be scoped to.
    pub topic: Option<String>,
}

/// Body of the token endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    /// Opaque subscribe token.
    pub token: String,
    /// Seconds until the token stops validating.
    pub expires_in_seconds: u64,
}

/// Query string of the stream endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    /// Topic to subscribe to.
    pub topic: Option<String>,
    /// Subscribe token from the token endpoint.
    pub st: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn problem(status: StatusCode, title: &str, detail: &str) -> Response {
    ProblemDetails::new(status, title, Some(detail.to_string())).into_response()
}

/// Issue a subscribe token for one topic.
pub async fn token(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Response {
    if let Err(e) = state.antiforgery.validate(&headers) {
        debug!(error = %e, "token request failed anti-forgery validation");
        return problem(
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            "anti-forgery validation failed",
        );
    }
    let Some(topic) = non_blank(query.topic) else {
        return problem(StatusCode::BAD_REQUEST, "Bad Request", "topic is required");
    };

    match state.tokens.create(&topic, None) {
        Ok(issued) => {
            let mut resp = Json(TokenResponse {
                token: issued.token,
                expires_in_seconds: issued.expires_in.as_secs(),
            })
            .into_response();
            no_cache(resp.headers_mut());
            resp
        }
        Err(e) => {
            error!(error = %e, topic, "failed to issue subscribe token");
            ProblemDetails::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Subscribe token could not be issued",
                None,
            )
            .into_response()
        }
    }
}

/// Open an event stream for one topic.
pub async fn stream(State(state): State<AppState>, Query(query): Query<StreamQuery>) -> Response {
    let Some(topic) = non_blank(query.topic) else {
        return problem(StatusCode::BAD_REQUEST, "Bad Request", "topic is required");
    };
    let valid = query
        .st
        .as_deref()
        .is_some_and(|st| state.tokens.validate(&topic, st));
    if !valid {
        debug!(topic, "rejected stream with missing or invalid token");
        return problem(
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            "missing or invalid subscribe token",
        );
    }

    let subscription = match state.bifrost.subscribe(&topic) {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(error = %e, topic, "subscribe failed");
            return problem(StatusCode::BAD_REQUEST, "Bad Request", &e.to_string());
        }
    };
    debug!(topic, subscription = %subscription.id(), "stream opened");

    let heartbeat = Duration::from_millis(state.settings.bifrost.heartbeat_interval_ms);
    let cancel = state.shutdown.token().child_token();
    let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
    let _ = tokio::spawn(run_stream(subscription, tx, heartbeat, cancel.clone()));

    // The guard lives as long as the body; dropping the body cancels the pump.
    let guard = cancel.drop_guard();
    let events = frames(rx).map(move |frame| {
        let _ = &guard;
        frame
    });

    (
        [
            (CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (HeaderName::from_static("x-accel-buffering"), HeaderValue::from_static("no")),
        ],
        Sse::new(events),
    )
        .into_response()
}
