//! Bounded single-consumer delivery queue with evict-oldest overflow.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::message::Message;

/// Result of offering a message to a queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Offer {
    /// Appended with room to spare.
    Queued,
    /// Appended after dropping the oldest entry.
    Evicted,
    /// Queue is closed; message discarded.
    Closed,
}

struct State {
    items: VecDeque<Arc<Message>>,
    closed: bool,
}

/// Push never blocks; `recv` suspends until an item arrives or the queue closes.
pub(crate) struct DeliveryQueue {
    state: Mutex<State>,
    capacity: usize,
    notify: Notify,
}

impl DeliveryQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity.min(64)),
                closed: false,
            }),
            capacity,
            notify: Notify::new(),
        }
    }

    pub(crate) fn offer(&self, message: Arc<Message>) -> Offer {
        let outcome = {
            let mut state = self.state.lock();
            if state.closed {
                return Offer::Closed;
            }
            let evicted = if state.items.len() >= self.capacity {
                let _ = state.items.pop_front();
                true
            } else {
                false
            };
            state.items.push_back(message);
            if evicted { Offer::Evicted } else { Offer::Queued }
        };
        // Stores a permit when the consumer is not currently waiting.
        self.notify.notify_one();
        outcome
    }

    pub(crate) async fn recv(&self) -> Option<Arc<Message>> {
        loop {
            {
                let mut state = self.state.lock();
                if state.closed {
                    return None;
                }
                if let Some(message) = state.items.pop_front() {
                    return Some(message);
                }
            }
            self.notify.notified().await;
        }
    }

    pub(crate) fn try_recv(&self) -> Option<Arc<Message>> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }
        state.items.pop_front()
    }

    /// Close and discard anything still buffered. Idempotent.
    pub(crate) fn close(&self) {
        {
            let mut state = self.state.lock();
            state.closed = true;
            state.items.clear();
        }
        self.notify.notify_one();
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
