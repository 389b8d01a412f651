//! Action registry.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use axum::body::Bytes;
use tracing::debug;

use super::context::{RequestContext, ServiceMap};
use super::errors::{ActionError, RegistrationError};
use super::handler::{ActionHandler, ActionOutput, BoxFuture, SyncActionHandler};
use super::params::ParamKind;

trait Invoke: Send + Sync {
    fn invoke(&self, ctx: RequestContext, body: Bytes) -> BoxFuture<Result<ActionOutput, ActionError>>;
}

struct AsyncInvoker<H, Args> {
    handler: H,
    _args: PhantomData<fn() -> Args>,
}

impl<H: ActionHandler<Args>, Args: 'static> Invoke for AsyncInvoker<H, Args> {
    fn invoke(&self, ctx: RequestContext, body: Bytes) -> BoxFuture<Result<ActionOutput, ActionError>> {
        self.handler.call(ctx, body)
    }
}

struct SyncInvoker<H, Args> {
    handler: H,
    _args: PhantomData<fn() -> Args>,
}

impl<H: SyncActionHandler<Args>, Args: 'static> Invoke for SyncInvoker<H, Args> {
    fn invoke(&self, ctx: RequestContext, body: Bytes) -> BoxFuture<Result<ActionOutput, ActionError>> {
        self.handler.call(ctx, body)
    }
}

/// Public description of a registered action.
#[derive(Clone, Debug)]
pub struct ActionDescriptor {
    /// Identifier.
    pub id: String,
    /// Declared parameters, in order.
    pub params: Vec<ParamKind>,
    /// Whether the handler is asynchronous.
    pub is_async: bool,
}

impl ActionDescriptor {
    /// True when the action reads the request body.
    pub fn has_payload(&self) -> bool {
        self.params
            .iter()
            .any(|p| matches!(p, ParamKind::Payload { .. }))
    }
}

pub(crate) struct Action {
    descriptor: ActionDescriptor,
    invoker: Box<dyn Invoke>,
}

impl Action {
    pub(crate) fn descriptor(&self) -> &ActionDescriptor {
        &self.descriptor
    }

    pub(crate) fn invoke(
        &self,
        ctx: RequestContext,
        body: Bytes,
    ) -> BoxFuture<Result<ActionOutput, ActionError>> {
        self.invoker.invoke(ctx, body)
    }
}

/// Identifier → action table, built once at startup and read-only afterwards.
#[derive(Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<Action>>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.ids())
            .finish()
    }
}

impl ActionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asynchronous handler under `id`.
    pub fn register<H, Args>(
        &mut self,
        id: impl Into<String>,
        handler: H,
    ) -> Result<&mut Self, RegistrationError>
    where
        H: ActionHandler<Args>,
        Args: 'static,
    {
        let invoker = AsyncInvoker {
            handler,
            _args: PhantomData,
        };
        self.insert(id.into(), H::params(), true, Box::new(invoker))
    }

    /// Register a synchronous handler under `id`.
    pub fn register_sync<H, Args>(
        &mut self,
        id: impl Into<String>,
        handler: H,
    ) -> Result<&mut Self, RegistrationError>
    where
        H: SyncActionHandler<Args>,
        Args: 'static,
    {
        let invoker = SyncInvoker {
            handler,
            _args: PhantomData,
        };
        self.insert(id.into(), H::params(), false, Box::new(invoker))
    }

    fn insert(
        &mut self,
        id: String,
        params: Vec<ParamKind>,
        is_async: bool,
        invoker: Box<dyn Invoke>,
    ) -> Result<&mut Self, RegistrationError> {
        if id.is_empty() || id.trim() != id {
            return Err(RegistrationError::InvalidId(id));
        }
        if self.actions.contains_key(&id) {
            return Err(RegistrationError::Duplicate(id));
        }
        let payloads = params
            .iter()
            .filter(|p| matches!(p, ParamKind::Payload { .. }))
            .count();
        if payloads > 1 {
            return Err(RegistrationError::AmbiguousPayload { id, count: payloads });
        }

        debug!(action = %id, params = params.len(), is_async, "registered action");
        let action = Action {
            descriptor: ActionDescriptor {
                id: id.clone(),
                params,
                is_async,
            },
            invoker,
        };
        let _ = self.actions.insert(id, Arc::new(action));
        Ok(self)
    }

    /// Check that every service an action asks for is present in `services`.
    pub fn validate_services(&self, services: &ServiceMap) -> Result<(), RegistrationError> {
        for id in self.ids() {
            let Some(action) = self.actions.get(&id) else {
                continue;
            };
            for param in &action.descriptor.params {
                if let ParamKind::Service { id: type_id, name } = param {
                    if !services.contains(*type_id) {
                        return Err(RegistrationError::MissingService {
                            id: id.clone(),
                            service: *name,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn get(&self, id: &str) -> Option<Arc<Action>> {
        self.actions.get(id).cloned()
    }

    /// Describe one action.
    pub fn describe(&self, id: &str) -> Option<ActionDescriptor> {
        self.actions.get(id).map(|a| a.descriptor.clone())
    }

    /// True when `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.actions.contains_key(id)
    }

    /// All identifiers, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.actions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
