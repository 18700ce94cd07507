//! Subscription manager for broadcasting child events.

use crate::error::{MirrorError, Result};
use crate::types::{Item, Key};
use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use super::types::{
    ChildEventKind, DropReason, QueryEvent, SubscriptionConfig, SubscriptionHandle,
    SubscriptionId,
};

/// Internal subscription state.
struct Subscription {
    config: SubscriptionConfig,
    sender: Sender<QueryEvent>,
    /// Whether replay is complete.
    caught_up: bool,
}

impl Subscription {
    /// Try to send an event. Returns false if buffer is full (subscriber will be dropped).
    fn try_send(&self, event: QueryEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(crossbeam_channel::TrySendError::Full(_)) => false,
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => false,
        }
    }

    fn wants(&self, kind: ChildEventKind) -> bool {
        self.caught_up && self.config.filter.matches(kind)
    }
}

/// Manages subscriptions and broadcasts events.
pub struct SubscriptionManager {
    /// Active subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
}

impl SubscriptionManager {
    /// Create a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a new subscription.
    ///
    /// The subscription is not yet "caught up": live broadcasts skip it until
    /// `mark_caught_up` is called.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size);

        let subscription = Subscription {
            config,
            sender,
            caught_up: false,
        };

        self.subscriptions.write().insert(id, subscription);
        debug!(subscription = id.0, "subscribed");

        SubscriptionHandle { id, receiver }
    }

    /// Unsubscribe and clean up. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.drop_subscription(id, DropReason::Unsubscribed);
    }

    /// Remove a subscription, telling it why (best effort).
    pub fn drop_subscription(&self, id: SubscriptionId, reason: DropReason) {
        let mut subs = self.subscriptions.write();
        if let Some(sub) = subs.remove(&id) {
            debug!(subscription = id.0, ?reason, "subscription dropped");
            let _ = sub.sender.try_send(QueryEvent::Dropped { reason });
        }
    }

    /// Mark a subscription as caught up (finished replay).
    pub fn mark_caught_up(&self, id: SubscriptionId) -> Result<()> {
        let mut subs = self.subscriptions.write();
        if let Some(sub) = subs.get_mut(&id) {
            sub.caught_up = true;
            if !sub.try_send(QueryEvent::CaughtUp) {
                subs.remove(&id);
                warn!(subscription = id.0, "dropped before catching up");
                return Err(MirrorError::SubscriptionDropped(DropReason::BufferOverflow));
            }
        }
        Ok(())
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    // --- Broadcasting ---

    pub fn broadcast_child_added(&self, item: &Item, previous_key: Option<&Key>) {
        let event = QueryEvent::ChildAdded {
            item: item.clone(),
            previous_key: previous_key.cloned(),
        };
        self.broadcast(event);
    }

    pub fn broadcast_child_changed(&self, item: &Item, previous_key: Option<&Key>) {
        let event = QueryEvent::ChildChanged {
            item: item.clone(),
            previous_key: previous_key.cloned(),
        };
        self.broadcast(event);
    }

    pub fn broadcast_child_removed(&self, item: &Item) {
        let event = QueryEvent::ChildRemoved { item: item.clone() };
        self.broadcast(event);
    }

    pub fn broadcast_child_moved(&self, item: &Item, previous_key: Option<&Key>) {
        let event = QueryEvent::ChildMoved {
            item: item.clone(),
            previous_key: previous_key.cloned(),
        };
        self.broadcast(event);
    }

    /// Internal broadcast helper. Drops subscribers that fail to receive.
    fn broadcast(&self, event: QueryEvent) {
        let Some(kind) = event.kind() else {
            return;
        };
        let mut to_remove = Vec::new();

        {
            let subs = self.subscriptions.read();
            for (id, sub) in subs.iter() {
                if sub.wants(kind) && !sub.try_send(event.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.subscriptions.write();
            for id in to_remove {
                if let Some(sub) = subs.remove(&id) {
                    warn!(subscription = id.0, ?kind, "slow subscriber dropped");
                    // Buffer is usually still full here; the closed channel tells the rest.
                    let _ = sub.sender.try_send(QueryEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }

    // --- Replay Helpers ---

    /// Send an event directly to a subscription (for replay).
    /// Returns false if the subscription is gone or its buffer is full.
    pub fn send_to(&self, id: SubscriptionId, event: QueryEvent) -> bool {
        let subs = self.subscriptions.read();
        if let Some(sub) = subs.get(&id) {
            sub.try_send(event)
        } else {
            false
        }
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}
