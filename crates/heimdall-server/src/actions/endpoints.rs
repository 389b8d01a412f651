//! `POST {base}/v1/content/actions`

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Query, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use heimdall_core::constants::ACTION_HEADER;
use serde::Deserialize;

use super::context::{ConnectionInfo, Identity};
use super::dispatcher::ActionRequest;
use super::errors::ActionError;
use crate::server::AppState;

/// Query string accepted by the actions endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ActionQuery {
    /// Action identifier, used when the header is absent.
    pub action: Option<String>,
}

fn action_id(headers: &HeaderMap, query: ActionQuery) -> Option<String> {
    headers
        .get(ACTION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or(query.action)
}

fn body_error(limit: usize, err: axum::Error) -> ActionError {
    if err
        .into_inner()
        .downcast_ref::<http_body_util::LengthLimitError>()
        .is_some()
    {
        ActionError::PayloadTooLarge(limit)
    } else {
        ActionError::BadRequest("failed to read request body".into())
    }
}

/// Invoke an action and return its HTML.
pub async fn invoke(
    State(state): State<AppState>,
    Query(query): Query<ActionQuery>,
    request: Request,
) -> Response {
    let detailed = state.dispatcher.options().detailed_errors;
    let (parts, body) = request.into_parts();

    if let Err(e) = state.dispatcher.authorize(&parts.headers) {
        return e.to_problem(detailed).into_response();
    }

    let limit = state.settings.server.max_body_bytes;
    let body = match axum::body::to_bytes(body, limit).await {
        Ok(body) => body,
        Err(e) => return body_error(limit, e).to_problem(detailed).into_response(),
    };

    // Cancelled when this future is dropped (client gone) or the server stops.
    let cancel = state.shutdown.token().child_token();
    let _guard = cancel.clone().drop_guard();

    let request = ActionRequest {
        action: action_id(&parts.headers, query),
        body,
        identity: parts
            .extensions
            .get::<Identity>()
            .cloned()
            .unwrap_or_default(),
        cancel,
        connection: Arc::new(ConnectionInfo {
            remote_addr: parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
        }),
    };

    match state.dispatcher.dispatch(request).await {
        Ok(Some(html)) => (
            StatusCode::OK,
            [(
                CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            )],
            html.into_string(),
        )
            .into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.to_problem(detailed).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_wins_over_query() {
        let mut h = HeaderMap::new();
        let _ = h.insert(ACTION_HEADER, HeaderValue::from_static(" Home.Title "));
        let q = ActionQuery {
            action: Some("Other".into()),
        };
        assert_eq!(action_id(&h, q).as_deref(), Some("Home.Title"));
    }

    #[test]
    fn query_is_fallback() {
        let q = ActionQuery {
            action: Some("Home.Title".into()),
        };
        assert_eq!(action_id(&HeaderMap::new(), q).as_deref(), Some("Home.Title"));
        assert_eq!(action_id(&HeaderMap::new(), ActionQuery::default()), None);
    }
}
