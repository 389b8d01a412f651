//! Action parameters.
//!
//! Each handler argument type implements [`ActionParam`], which says whether
//! it is ambient (bound from the [`RequestContext`]) or the payload (bound
//! from the JSON body). Registration reads [`ActionParam::kind`] for every
//! argument so that shape errors surface at startup.

use std::any::{TypeId, type_name};
use std::ops::Deref;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::context::{ConnectionInfo, Identity, RequestContext};
use super::errors::ActionError;

/// What a parameter is bound from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    /// Request-scoped value (connection, identity, cancellation).
    Ambient,
    /// Shared service looked up by type.
    Service {
        /// Service type id.
        id: TypeId,
        /// Service type name, for diagnostics.
        name: &'static str,
    },
    /// The JSON request body.
    Payload {
        /// Payload type name, for diagnostics.
        name: &'static str,
    },
}

/// A value a handler can take as an argument.
pub trait ActionParam: Sized + Send + 'static {
    /// Binding source.
    fn kind() -> ParamKind;

    /// Produce the value for one invocation.
    fn bind(ctx: &RequestContext, body: &[u8]) -> Result<Self, ActionError>;
}

impl ActionParam for CancellationToken {
    fn kind() -> ParamKind {
        ParamKind::Ambient
    }

    fn bind(ctx: &RequestContext, _body: &[u8]) -> Result<Self, ActionError> {
        Ok(ctx.cancel.clone())
    }
}

impl ActionParam for Identity {
    fn kind() -> ParamKind {
        ParamKind::Ambient
    }

    fn bind(ctx: &RequestContext, _body: &[u8]) -> Result<Self, ActionError> {
        Ok(ctx.identity.clone())
    }
}

/// Transport details of the current request.
#[derive(Clone, Debug)]
pub struct Connection(pub Arc<ConnectionInfo>);

impl Deref for Connection {
    type Target = ConnectionInfo;

    fn deref(&self) -> &ConnectionInfo {
        &self.0
    }
}

impl ActionParam for Connection {
    fn kind() -> ParamKind {
        ParamKind::Ambient
    }

    fn bind(ctx: &RequestContext, _body: &[u8]) -> Result<Self, ActionError> {
        Ok(Self(Arc::clone(&ctx.connection)))
    }
}

/// A shared service of type `T` from the server's [`ServiceMap`](super::ServiceMap).
#[derive(Debug)]
pub struct Service<T>(pub Arc<T>);

impl<T> Clone for Service<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Deref for Service<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Send + Sync + 'static> ActionParam for Service<T> {
    fn kind() -> ParamKind {
        ParamKind::Service {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    fn bind(ctx: &RequestContext, _body: &[u8]) -> Result<Self, ActionError> {
        ctx.services.get::<T>().map(Self).ok_or_else(|| {
            ActionError::Configuration(format!("service `{}` is not registered", type_name::<T>()))
        })
    }
}

/// The request body, deserialized from JSON.
///
/// An empty body binds only when `T` can be built from `{}` (for example a
/// struct whose fields all have defaults); otherwise it is a binding error.
#[derive(Clone, Debug)]
pub struct Payload<T>(pub T);

impl<T> Deref for Payload<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: DeserializeOwned + Send + 'static> ActionParam for Payload<T> {
    fn kind() -> ParamKind {
        ParamKind::Payload {
            name: type_name::<T>(),
        }
    }

    fn bind(_ctx: &RequestContext, body: &[u8]) -> Result<Self, ActionError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return serde_json::from_slice(b"{}")
                .map(Self)
                .map_err(|_| ActionError::Binding("request body is required".into()));
        }
        serde_json::from_slice(body)
            .map(Self)
            .map_err(|e| ActionError::Binding(e.to_string()))
    }
}
