//! # heimdall-server
//!
//! HTTP surface for Heimdall, built on Axum:
//!
//! - **Actions**: `POST {base}/v1/content/actions` resolves a registered
//!   action, binds its parameters and returns the HTML it renders
//! - **Anti-forgery**: `GET {base}/v1/csrf` issues the request token every
//!   state-changing call must present
//! - **Bifrost**: `GET {base}/v1/bifrost/token` mints subscribe tokens and
//!   `GET {base}/v1/bifrost` streams a topic as server-sent events
//! - **Ops**: `/health`, `/metrics`, graceful shutdown

#![deny(unsafe_code)]

pub mod actions;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod security;
pub mod server;
pub mod shutdown;
pub mod stream;

pub use actions::{
    ActionError, ActionRegistry, Connection, Identity, Payload, RegistrationError, Service,
    ServiceMap,
};
pub use errors::ServerError;
pub use server::{AppState, HeimdallServer, HeimdallServerBuilder};
