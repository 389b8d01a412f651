//! Per-connection delivery loop.
//!
//! One task per open stream owns the [`Subscription`] and feeds a bounded
//! channel that the HTTP response drains through [`frames`]. Expiry is
//! checked on both sides of that channel. The loop ends on server shutdown,
//! when the response body is dropped (client gone), or when the
//! subscription is closed; the subscription is dropped, and therefore
//! unsubscribed, exactly once on the way out.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::Event;
use heimdall_bifrost::{Message, Subscription};
use heimdall_core::constants::{CONNECTED_EVENT, HEARTBEAT_COMMENT, MESSAGE_EVENT};
use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::metrics::{STREAMS_ACTIVE, STREAMS_TOTAL, STREAM_MESSAGES_EXPIRED, STREAM_MESSAGES_SENT};

/// One frame destined for the client.
#[derive(Clone, Debug)]
pub enum StreamEvent {
    /// Sent once, right after subscribing.
    Connected {
        /// Topic as requested.
        topic: String,
    },
    /// Idle keep-alive comment.
    Heartbeat,
    /// A published message.
    Message(Arc<Message>),
}

impl StreamEvent {
    /// Render as an SSE frame.
    pub fn into_sse(self) -> Event {
        match self {
            Self::Connected { topic } => Event::default()
                .event(CONNECTED_EVENT)
                .data(format!("topic:{}", single_line(&topic))),
            Self::Heartbeat => Event::default().comment(HEARTBEAT_COMMENT),
            Self::Message(message) => Event::default()
                .event(MESSAGE_EVENT)
                .id(message.id.as_str())
                .data(normalize_newlines(message.html.as_str())),
        }
    }

    /// Render as an SSE frame unless this is a message that expired while
    /// buffered.
    pub fn into_live_sse(self) -> Option<Event> {
        if let Self::Message(message) = &self {
            if message.is_expired() {
                counter!(STREAM_MESSAGES_EXPIRED).increment(1);
                trace!(message = %message.id, "dropping message that expired in flight");
                return None;
            }
            counter!(STREAM_MESSAGES_SENT).increment(1);
        }
        Some(self.into_sse())
    }
}

/// Response body frames for the events a [`run_stream`] task produces.
pub fn frames(
    rx: mpsc::Receiver<StreamEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    ReceiverStream::new(rx).filter_map(|event| event.into_live_sse().map(Ok))
}

/// CR and CRLF would end an SSE line early; fold them to LF so each line
/// becomes its own `data:` field.
fn normalize_newlines(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n")
}

fn single_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

/// Why a stream ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Server shutdown or explicit cancellation.
    Cancelled,
    /// The response body was dropped.
    Disconnected,
    /// The subscription was closed under the stream.
    Closed,
}

/// Drive one stream until it ends, then unsubscribe.
pub async fn run_stream(
    subscription: Subscription,
    tx: mpsc::Sender<StreamEvent>,
    heartbeat: Duration,
    cancel: CancellationToken,
) -> StreamOutcome {
    counter!(STREAMS_TOTAL).increment(1);
    gauge!(STREAMS_ACTIVE).increment(1.0);

    let outcome = pump(&subscription, &tx, heartbeat, &cancel).await;

    debug!(
        topic = subscription.topic(),
        subscription = %subscription.id(),
        ?outcome,
        "stream closed"
    );
    drop(subscription);
    gauge!(STREAMS_ACTIVE).decrement(1.0);
    outcome
}

async fn pump(
    subscription: &Subscription,
    tx: &mpsc::Sender<StreamEvent>,
    heartbeat: Duration,
    cancel: &CancellationToken,
) -> StreamOutcome {
    let connected = StreamEvent::Connected {
        topic: subscription.topic().to_string(),
    };
    if let Err(outcome) = emit(tx, connected, cancel).await {
        return outcome;
    }

    let heartbeat = heartbeat.max(Duration::from_millis(1));
    let mut ticker = time::interval_at(Instant::now() + heartbeat, heartbeat);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return StreamOutcome::Cancelled,
            () = tx.closed() => return StreamOutcome::Disconnected,
            _ = ticker.tick() => {
                trace!(topic = subscription.topic(), "heartbeat");
                if let Err(outcome) = emit(tx, StreamEvent::Heartbeat, cancel).await {
                    return outcome;
                }
            }
            next = subscription.recv() => {
                let Some(message) = next else {
                    return StreamOutcome::Closed;
                };
                if message.is_expired() {
                    counter!(STREAM_MESSAGES_EXPIRED).increment(1);
                    trace!(message = %message.id, "dropping expired message");
                    continue;
                }
                if let Err(outcome) = emit(tx, StreamEvent::Message(message), cancel).await {
                    return outcome;
                }
                ticker.reset();
            }
        }
    }
}

async fn emit(
    tx: &mpsc::Sender<StreamEvent>,
    event: StreamEvent,
    cancel: &CancellationToken,
) -> Result<(), StreamOutcome> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(StreamOutcome::Cancelled),
        sent = tx.send(event) => sent.map_err(|_| StreamOutcome::Disconnected),
    }
}
