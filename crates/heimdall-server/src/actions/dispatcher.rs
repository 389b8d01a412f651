//! Action dispatch pipeline.
//!
//! Every request goes through the same steps, in order: anti-forgery check,
//! identifier check, lookup, parameter binding, invocation. A failure at any
//! step short-circuits the rest; in particular a request without a valid
//! anti-forgery proof never reaches lookup.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::http::HeaderMap;
use futures::FutureExt;
use heimdall_settings::ActionSettings;
use metrics::{counter, histogram};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info_span, warn};

use super::context::{ConnectionInfo, Identity, RequestContext, ServiceMap};
use super::errors::ActionError;
use super::handler::ActionOutput;
use super::registry::ActionRegistry;
use crate::metrics::{ACTION_DURATION_SECONDS, ACTION_ERRORS_TOTAL, ACTION_REQUESTS_TOTAL};
use crate::security::Antiforgery;

/// Dispatcher tuning.
#[derive(Clone, Debug)]
pub struct DispatchOptions {
    /// Expose handler-fault detail to clients.
    pub detailed_errors: bool,
    /// Upper bound on one invocation.
    pub handler_timeout: Duration,
    /// Invocations slower than this are logged at warn.
    pub slow_threshold: Duration,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self::from(&ActionSettings::default())
    }
}

impl From<&ActionSettings> for DispatchOptions {
    fn from(s: &ActionSettings) -> Self {
        Self {
            detailed_errors: s.enable_detailed_errors,
            handler_timeout: Duration::from_millis(s.handler_timeout_ms),
            slow_threshold: Duration::from_millis(s.slow_action_ms),
        }
    }
}

/// One invocation request, already lifted off the transport.
#[derive(Clone, Debug)]
pub struct ActionRequest {
    /// Action identifier, if the client sent one.
    pub action: Option<String>,
    /// Raw JSON body (may be empty).
    pub body: Bytes,
    /// Caller identity.
    pub identity: Identity,
    /// Cancelled when the client disconnects or the server stops.
    pub cancel: CancellationToken,
    /// Transport details; its headers carry the anti-forgery proof.
    pub connection: Arc<ConnectionInfo>,
}

/// Resolves, binds and invokes actions.
pub struct ActionDispatcher {
    registry: Arc<ActionRegistry>,
    services: Arc<ServiceMap>,
    antiforgery: Arc<Antiforgery>,
    options: DispatchOptions,
}

impl ActionDispatcher {
    /// Create a dispatcher.
    pub fn new(
        registry: Arc<ActionRegistry>,
        services: Arc<ServiceMap>,
        antiforgery: Arc<Antiforgery>,
        options: DispatchOptions,
    ) -> Self {
        Self {
            registry,
            services,
            antiforgery,
            options,
        }
    }

    /// Dispatcher options.
    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// The registry actions are resolved from.
    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    /// First pipeline step on its own, so transports can run it before
    /// reading the body.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), ActionError> {
        self.antiforgery.validate(headers).map_err(|e| {
            counter!(ACTION_ERRORS_TOTAL, "action" => "unknown", "error_type" => "unauthorized")
                .increment(1);
            debug!(error = %e, "action rejected by anti-forgery check");
            ActionError::Unauthorized(e.to_string())
        })
    }

    /// Run one request through the pipeline.
    pub async fn dispatch(&self, request: ActionRequest) -> Result<ActionOutput, ActionError> {
        self.authorize(&request.connection.headers)?;

        let Some(id) = request
            .action
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        else {
            counter!(ACTION_ERRORS_TOTAL, "action" => "unknown", "error_type" => "bad_request")
                .increment(1);
            return Err(ActionError::BadRequest("missing action identifier".into()));
        };

        let Some(action) = self.registry.get(id) else {
            counter!(ACTION_ERRORS_TOTAL, "action" => "unknown", "error_type" => "not_found")
                .increment(1);
            debug!(action = id, "unknown action");
            return Err(ActionError::NotFound(id.to_string()));
        };

        let id = action.descriptor().id.clone();
        counter!(ACTION_REQUESTS_TOTAL, "action" => id.clone()).increment(1);

        let ctx = RequestContext {
            action: id.clone(),
            cancel: request.cancel,
            identity: request.identity,
            services: Arc::clone(&self.services),
            connection: request.connection,
        };

        let span = info_span!("action", action = %id);
        let start = Instant::now();
        let outcome = tokio::time::timeout(
            self.options.handler_timeout,
            AssertUnwindSafe(action.invoke(ctx, request.body)).catch_unwind(),
        )
        .instrument(span.clone())
        .await;

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => {
                let msg = panic_message(&panic);
                Err(ActionError::HandlerFault(anyhow::anyhow!(
                    "action '{id}' panicked: {msg}"
                )))
            }
            Err(_elapsed) => Err(ActionError::HandlerFault(anyhow::anyhow!(
                "action '{id}' timed out after {:?}",
                self.options.handler_timeout
            ))),
        };

        let duration = start.elapsed();
        histogram!(ACTION_DURATION_SECONDS, "action" => id.clone()).record(duration.as_secs_f64());
        if duration >= self.options.slow_threshold {
            warn!(parent: &span, duration_secs = duration.as_secs_f64(), "slow action");
        }

        if let Err(err) = &result {
            counter!(ACTION_ERRORS_TOTAL, "action" => id.clone(), "error_type" => err.code())
                .increment(1);
            if err.is_server_fault() {
                error!(parent: &span, error = %err, "action failed");
            } else {
                debug!(parent: &span, error = %err, "action rejected");
            }
        }

        result
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
        .to_string()
}
