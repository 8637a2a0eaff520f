/// Event bus for pub/sub messaging
///
/// Every UI surface that cares about the session (volume widget, splash,
/// pack modal) subscribes here and sees the same event stream.
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;

use super::events::Event;

/// Subscriber ID for tracking subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(usize);

struct Subscriber {
    id: SubscriberId,
    sender: Sender<Event>,
}

#[derive(Default)]
struct Subscribers {
    list: Vec<Subscriber>,
    next_id: usize,
}

/// Event bus broadcasting session events to subscribers
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<RwLock<Subscribers>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events, returns a receiver and subscription ID
    pub fn subscribe(&self) -> (Receiver<Event>, SubscriberId) {
        let (tx, rx) = unbounded();

        let mut inner = self.inner.write();
        let id = SubscriberId(inner.next_id);
        inner.next_id += 1;
        inner.list.push(Subscriber { id, sender: tx });

        (rx, id)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.inner.write().list.retain(|s| s.id != id);
    }

    /// Publish an event to all subscribers.
    ///
    /// Subscribers whose receiver was dropped are removed. Returns the
    /// number of subscribers reached.
    pub fn publish(&self, event: Event) -> usize {
        let mut closed = Vec::new();
        let mut delivered = 0;

        for subscriber in self.inner.read().list.iter() {
            match subscriber.sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Disconnected(_)) => closed.push(subscriber.id),
                Err(TrySendError::Full(_)) => {}
            }
        }

        if !closed.is_empty() {
            self.inner.write().list.retain(|s| !closed.contains(&s.id));
            tracing::debug!("Removed {} closed event subscribers", closed.len());
        }

        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.read().list.len()
    }

    pub fn clear(&self) {
        self.inner.write().list.clear();
    }
}
