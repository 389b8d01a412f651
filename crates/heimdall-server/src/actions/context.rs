//! Per-request context handed to every action invocation.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderMap, Method, Uri};
use tokio_util::sync::CancellationToken;

/// Type-keyed set of shared services available to actions via
/// [`Service<T>`](super::Service).
#[derive(Clone, Default)]
pub struct ServiceMap {
    entries: HashMap<TypeId, (&'static str, Arc<dyn Any + Send + Sync>)>,
}

impl fmt::Debug for ServiceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.entries.values().map(|(name, _)| *name).collect();
        names.sort_unstable();
        f.debug_struct("ServiceMap").field("services", &names).finish()
    }
}

impl ServiceMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a service.
    pub fn insert<T: Send + Sync + 'static>(&mut self, service: T) -> &mut Self {
        self.insert_arc(Arc::new(service))
    }

    /// Add (or replace) an already-shared service.
    pub fn insert_arc<T: Send + Sync + 'static>(&mut self, service: Arc<T>) -> &mut Self {
        let _ = self
            .entries
            .insert(TypeId::of::<T>(), (type_name::<T>(), service));
        self
    }

    /// Look up a service by type.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let (_, service) = self.entries.get(&TypeId::of::<T>())?;
        Arc::clone(service).downcast::<T>().ok()
    }

    /// True when a service with this type id is present.
    pub fn contains(&self, id: TypeId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of services.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no services are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Who is calling. Hosts attach one to the request extensions from their
/// own authentication middleware; without one the caller is anonymous.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    /// Authenticated subject, if any.
    pub subject: Option<String>,
    /// Additional claims.
    pub claims: HashMap<String, String>,
}

impl Identity {
    /// An unauthenticated caller.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// An authenticated caller.
    pub fn user(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            claims: HashMap::new(),
        }
    }

    /// Add a claim.
    #[must_use]
    pub fn with_claim(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.claims.insert(key.into(), value.into());
        self
    }

    /// True when a subject is present.
    pub fn is_authenticated(&self) -> bool {
        self.subject.is_some()
    }
}

/// Transport-level facts about the request.
#[derive(Clone, Debug)]
pub struct ConnectionInfo {
    /// Peer address when the listener records it.
    pub remote_addr: Option<SocketAddr>,
    /// HTTP method.
    pub method: Method,
    /// Request URI.
    pub uri: Uri,
    /// Request headers.
    pub headers: HeaderMap,
}

impl Default for ConnectionInfo {
    fn default() -> Self {
        Self {
            remote_addr: None,
            method: Method::POST,
            uri: Uri::from_static("/"),
            headers: HeaderMap::new(),
        }
    }
}

/// Everything an action's ambient parameters are bound from.
#[derive(Clone, Debug)]
pub struct RequestContext {
    /// Identifier of the action being invoked.
    pub action: String,
    /// Fires when the client goes away or the server shuts down.
    pub cancel: CancellationToken,
    /// Caller identity.
    pub identity: Identity,
    /// Shared services.
    pub services: Arc<ServiceMap>,
    /// Transport details.
    pub connection: Arc<ConnectionInfo>,
}
