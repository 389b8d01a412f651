//! Publishable bundles.

use std::time::Duration;

use heimdall_core::{Html, IntoHtml};

/// A topic, its rendered content and an optional TTL, ready for
/// [`crate::Bifrost::publish_content`]. Handlers build these when the
/// publish happens somewhere other than where the markup is rendered.
#[derive(Clone, Debug)]
pub struct BifrostContent {
    /// Destination topic.
    pub topic: String,
    /// Rendered markup.
    pub html: Html,
    /// Message lifetime; `None` uses the broker's floor.
    pub ttl: Option<Duration>,
}

impl BifrostContent {
    /// Render `content` for `topic`.
    pub fn new(topic: impl Into<String>, content: impl IntoHtml) -> Self {
        Self {
            topic: topic.into(),
            html: content.into_html(),
            ttl: None,
        }
    }

    /// Set the message lifetime.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}
