//! Published messages.

use std::time::Duration;

use chrono::{DateTime, Utc};
use heimdall_core::{Html, MessageId};

/// One published HTML payload, shared by every subscriber queue it lands in.
#[derive(Clone, Debug)]
pub struct Message {
    /// Topic as given by the publisher.
    pub topic: String,
    /// Unique id, sent to clients as the SSE `id:` field.
    pub id: MessageId,
    /// Rendered markup.
    pub html: Html,
    /// When the message was published.
    pub created_at: DateTime<Utc>,
    /// After this instant the message is discarded instead of delivered.
    pub expires_at: DateTime<Utc>,
}

impl Message {
    pub(crate) fn new(topic: &str, html: Html, ttl: Duration) -> Self {
        let created_at = Utc::now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| created_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            topic: topic.to_string(),
            id: MessageId::new(),
            html,
            created_at,
            expires_at,
        }
    }

    /// True once `now` has reached the expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// True once the expiry has passed.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_created_plus_ttl() {
        let m = Message::new("t", Html::raw("x"), Duration::from_secs(5));
        assert_eq!((m.expires_at - m.created_at).num_seconds(), 5);
        assert!(!m.is_expired());
        assert!(m.is_expired_at(m.expires_at));
    }

    #[test]
    fn huge_ttl_saturates() {
        let m = Message::new("t", Html::raw("x"), Duration::MAX);
        assert_eq!(m.expires_at, DateTime::<Utc>::MAX_UTC);
    }
}
