//! Action error taxonomy and problem responses.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// Why a dispatch did not produce content.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// Anti-forgery proof missing or invalid.
    #[error("anti-forgery validation failed: {0}")]
    Unauthorized(String),
    /// The request itself is malformed (e.g. no action identifier).
    #[error("{0}")]
    BadRequest(String),
    /// No action is registered under the identifier.
    #[error("action '{0}' not found")]
    NotFound(String),
    /// The body could not be bound to the handler's payload type.
    #[error("invalid action payload: {0}")]
    Binding(String),
    /// The body exceeded the configured limit.
    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),
    /// The handler returned an error, panicked or timed out.
    #[error("action invocation failed: {0:#}")]
    HandlerFault(anyhow::Error),
    /// The action asked for something the server was not built with.
    #[error("action misconfigured: {0}")]
    Configuration(String),
}

impl ActionError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) | Self::Binding(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::HandlerFault(_) | Self::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code, used as a metrics label.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Binding(_) => "binding",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::HandlerFault(_) => "handler_fault",
            Self::Configuration(_) => "configuration",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "Anti-forgery validation failed",
            Self::BadRequest(_) => "Bad request",
            Self::NotFound(_) => "Action not found",
            Self::Binding(_) => "Invalid action payload",
            Self::PayloadTooLarge(_) => "Payload too large",
            Self::HandlerFault(_) | Self::Configuration(_) => "Heimdall action invocation failed",
        }
    }

    /// True for server-side failures whose details may leak internals.
    pub fn is_server_fault(&self) -> bool {
        self.status().is_server_error()
    }

    /// Render as a problem document. Server-fault detail is included only
    /// when `detailed` is set; client errors always carry theirs.
    pub fn to_problem(&self, detailed: bool) -> ProblemDetails {
        let detail = (!self.is_server_fault() || detailed).then(|| self.to_string());
        ProblemDetails::new(self.status(), self.title(), detail)
    }
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        self.to_problem(false).into_response()
    }
}

/// `application/problem+json` body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short human-readable summary.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Occurrence-specific explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProblemDetails {
    /// Build a problem with `type: about:blank`.
    pub fn new(status: StatusCode, title: &str, detail: Option<String>) -> Self {
        Self {
            kind: "about:blank".into(),
            title: title.into(),
            status: status.as_u16(),
            detail,
        }
    }
}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut resp = (status, Json(self)).into_response();
        let _ = resp.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        resp
    }
}

/// Startup-time registration failures. Any of these should abort startup.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// Two actions share an identifier.
    #[error("action '{0}' is already registered")]
    Duplicate(String),
    /// Identifier is empty or has surrounding whitespace.
    #[error("invalid action identifier {0:?}")]
    InvalidId(String),
    /// A handler declared more than one body-bound parameter.
    #[error("action '{id}' declares {count} payload parameters; at most one is allowed")]
    AmbiguousPayload {
        /// Offending action.
        id: String,
        /// Number of payload parameters declared.
        count: usize,
    },
    /// A handler needs a service the server was not given.
    #[error("action '{id}' requires service `{service}`, which is not registered")]
    MissingService {
        /// Offending action.
        id: String,
        /// Type name of the missing service.
        service: &'static str,
    },
}
