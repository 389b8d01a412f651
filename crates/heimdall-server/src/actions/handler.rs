//! Handler traits, implemented for plain functions and closures.

use std::future::Future;
use std::pin::Pin;

use axum::body::Bytes;
use heimdall_core::Html;

use super::context::RequestContext;
use super::errors::ActionError;
use super::params::{ActionParam, ParamKind};

/// Boxed, sendable future.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// What an action produced: markup, or nothing (204).
pub type ActionOutput = Option<Html>;

/// Return types an action may declare.
///
/// `Html` renders with 200, `Option::None` and `()` produce 204, and a
/// `Result` error becomes a handler fault.
pub trait IntoActionResult {
    /// Convert to the dispatcher's result.
    fn into_action_result(self) -> Result<ActionOutput, ActionError>;
}

impl IntoActionResult for Html {
    fn into_action_result(self) -> Result<ActionOutput, ActionError> {
        Ok(Some(self))
    }
}

impl IntoActionResult for Option<Html> {
    fn into_action_result(self) -> Result<ActionOutput, ActionError> {
        Ok(self)
    }
}

impl IntoActionResult for () {
    fn into_action_result(self) -> Result<ActionOutput, ActionError> {
        Ok(None)
    }
}

impl<T, E> IntoActionResult for Result<T, E>
where
    T: IntoActionResult,
    E: Into<anyhow::Error>,
{
    fn into_action_result(self) -> Result<ActionOutput, ActionError> {
        match self {
            Ok(value) => value.into_action_result(),
            Err(e) => Err(ActionError::HandlerFault(e.into())),
        }
    }
}

/// An asynchronous action: `Fn(params...) -> impl Future<Output = R>`.
pub trait ActionHandler<Args>: Clone + Send + Sync + 'static {
    /// Parameter kinds, in declaration order.
    fn params() -> Vec<ParamKind>;

    /// Bind parameters and run.
    fn call(&self, ctx: RequestContext, body: Bytes) -> BoxFuture<Result<ActionOutput, ActionError>>;
}

/// A synchronous action: `Fn(params...) -> R`. Runs inline on the request task.
pub trait SyncActionHandler<Args>: Clone + Send + Sync + 'static {
    /// Parameter kinds, in declaration order.
    fn params() -> Vec<ParamKind>;

    /// Bind parameters and run.
    fn call(&self, ctx: RequestContext, body: Bytes) -> BoxFuture<Result<ActionOutput, ActionError>>;
}

macro_rules! impl_handlers {
    ($($p:ident),*) => {
        #[allow(non_snake_case, unused_variables)]
        impl<F, Fut, R, $($p,)*> ActionHandler<($($p,)*)> for F
        where
            F: Fn($($p),*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            R: IntoActionResult,
            $($p: ActionParam,)*
        {
            fn params() -> Vec<ParamKind> {
                vec![$(<$p as ActionParam>::kind()),*]
            }

            fn call(&self, ctx: RequestContext, body: Bytes) -> BoxFuture<Result<ActionOutput, ActionError>> {
                let f = self.clone();
                Box::pin(async move {
                    $(let $p = <$p as ActionParam>::bind(&ctx, &body)?;)*
                    f($($p),*).await.into_action_result()
                })
            }
        }

        #[allow(non_snake_case, unused_variables)]
        impl<F, R, $($p,)*> SyncActionHandler<($($p,)*)> for F
        where
            F: Fn($($p),*) -> R + Clone + Send + Sync + 'static,
            R: IntoActionResult,
            $($p: ActionParam,)*
        {
            fn params() -> Vec<ParamKind> {
                vec![$(<$p as ActionParam>::kind()),*]
            }

            fn call(&self, ctx: RequestContext, body: Bytes) -> BoxFuture<Result<ActionOutput, ActionError>> {
                let f = self.clone();
                Box::pin(async move {
                    $(let $p = <$p as ActionParam>::bind(&ctx, &body)?;)*
                    f($($p),*).into_action_result()
                })
            }
        }
    };
}

impl_handlers!();
impl_handlers!(P1);
impl_handlers!(P1, P2);
impl_handlers!(P1, P2, P3);
impl_handlers!(P1, P2, P3, P4);
impl_handlers!(P1, P2, P3, P4, P5);
impl_handlers!(P1, P2, P3, P4, P5, P6);
