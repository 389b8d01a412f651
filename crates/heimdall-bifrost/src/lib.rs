//! # heimdall-bifrost
//!
//! In-process topic broker that pushes pre-rendered HTML to streaming clients.
//!
//! - [`Bifrost`]: topic → subscriber-set map; publish fans a message into
//!   every live subscriber's queue and never blocks
//! - [`Subscription`]: one subscriber's bounded evict-oldest queue plus an
//!   idempotent unsubscribe handle (also run on drop)
//! - [`SubscribeTokenService`]: short-lived topic-scoped tokens that gate
//!   opening a stream
//!
//! Delivery is best-effort: a slow subscriber loses its oldest buffered
//! messages, never anyone else's, and nothing is persisted.

#![deny(unsafe_code)]

mod broker;
mod content;
mod errors;
mod message;
mod queue;
mod token;

pub use broker::{Bifrost, BifrostConfig, PublishReport, Subscription, Unsubscribe};
pub use content::BifrostContent;
pub use errors::{BifrostError, Result};
pub use message::Message;
pub use token::{IssuedToken, SUBSCRIBE_TOKEN_PURPOSE, SubscribeTokenService};

/// Metric names recorded by the broker.
pub mod metric_names {
    /// Counter: messages accepted by `publish` (per publish, not per subscriber).
    pub const MESSAGES_PUBLISHED: &str = "bifrost_messages_published_total";
    /// Counter: per-subscriber deliveries.
    pub const MESSAGES_DELIVERED: &str = "bifrost_messages_delivered_total";
    /// Counter: messages evicted from full subscriber queues.
    pub const MESSAGES_EVICTED: &str = "bifrost_messages_evicted_total";
    /// Gauge: live subscriptions across all topics.
    pub const ACTIVE_SUBSCRIPTIONS: &str = "bifrost_active_subscriptions";
}
