//! Action dispatch.
//!
//! Actions are registered explicitly at startup. A handler is an ordinary
//! function or closure whose argument types say what it needs: ambient
//! values from the request ([`Connection`], [`Identity`], a
//! [`CancellationToken`](tokio_util::sync::CancellationToken), a
//! [`Service`]) and at most one [`Payload`] deserialized from the JSON body.
//! Its return type must render to HTML (see [`IntoActionResult`]).

mod context;
mod dispatcher;
pub mod endpoints;
mod errors;
mod handler;
mod params;
mod registry;

pub use context::{ConnectionInfo, Identity, RequestContext, ServiceMap};
pub use dispatcher::{ActionDispatcher, ActionRequest, DispatchOptions};
pub use errors::{ActionError, ProblemDetails, RegistrationError};
pub use handler::{ActionHandler, ActionOutput, BoxFuture, IntoActionResult, SyncActionHandler};
pub use params::{ActionParam, Connection, ParamKind, Payload, Service};
pub use registry::{ActionDescriptor, ActionRegistry};
