//! # heimdall-core
//!
//! Shared vocabulary for the Heimdall crates:
//!
//! - **Branded IDs**: `SubscriptionId`, `MessageId` as newtypes for type safety
//! - **HTML content**: [`Html`] fragments and the [`IntoHtml`] rendering trait
//! - **Sealed envelopes**: [`seal::Sealer`], an AEAD envelope with embedded expiry
//! - **Wire constants**: header names, event names and route paths
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` subscriber

#![deny(unsafe_code)]

pub mod constants;
pub mod html;
pub mod ids;
pub mod logging;
pub mod seal;

pub use html::{Html, IntoHtml};
pub use ids::{MessageId, SubscriptionId};
pub use seal::{SealError, Sealer};
