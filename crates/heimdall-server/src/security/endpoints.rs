//! `GET {base}/v1/csrf`

use axum::Json;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, PRAGMA, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::actions::ProblemDetails;
use crate::server::AppState;

/// Body of the csrf endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrfResponse {
    /// Token to send back in the anti-forgery header.
    pub request_token: String,
}

/// Mark a response as never cacheable.
pub(crate) fn no_cache(headers: &mut HeaderMap) {
    let _ = headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store"));
    let _ = headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
}

/// Issue a request token (and the cookie it is bound to, if new).
pub async fn csrf(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match state.antiforgery.issue(&headers) {
        Ok(issued) => {
            let mut resp = Json(CsrfResponse {
                request_token: issued.request_token,
            })
            .into_response();
            no_cache(resp.headers_mut());
            if let Some(cookie) = issued.set_cookie {
                let _ = resp.headers_mut().append(SET_COOKIE, cookie);
            }
            resp
        }
        Err(e) => {
            error!(error = %e, "failed to issue anti-forgery token");
            ProblemDetails::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Anti-forgery token could not be issued",
                None,
            )
            .into_response()
        }
    }
}
