//! Subscription types for child event delivery.

use crate::types::{Item, Key};
use serde::{Deserialize, Serialize};

/// The four structural changes a remote ordered collection reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildEventKind {
    Added,
    Changed,
    Removed,
    Moved,
}

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events before dropping subscriber.
    /// Default: 1000
    pub buffer_size: usize,

    /// Which child events to deliver.
    pub filter: SubscriptionFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            filter: SubscriptionFilter::all(),
        }
    }
}

/// Filter criteria for subscriptions.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionFilter {
    pub include_added: bool,
    pub include_changed: bool,
    pub include_removed: bool,
    pub include_moved: bool,
}

impl SubscriptionFilter {
    /// Subscribe to every child event kind.
    pub fn all() -> Self {
        Self {
            include_added: true,
            include_changed: true,
            include_removed: true,
            include_moved: true,
        }
    }

    /// Subscribe to the given kinds only.
    pub fn only(kinds: &[ChildEventKind]) -> Self {
        let mut filter = Self::default();
        for kind in kinds {
            match kind {
                ChildEventKind::Added => filter.include_added = true,
                ChildEventKind::Changed => filter.include_changed = true,
                ChildEventKind::Removed => filter.include_removed = true,
                ChildEventKind::Moved => filter.include_moved = true,
            }
        }
        filter
    }

    pub fn matches(&self, kind: ChildEventKind) -> bool {
        match kind {
            ChildEventKind::Added => self.include_added,
            ChildEventKind::Changed => self.include_changed,
            ChildEventKind::Removed => self.include_removed,
            ChildEventKind::Moved => self.include_moved,
        }
    }
}

/// Events delivered to a subscription.
///
/// `previous_key` names the sibling the item now follows; `None` means the
/// item is first.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryEvent {
    // --- Child Events ---
    ChildAdded {
        item: Item,
        previous_key: Option<Key>,
    },

    /// Payload changed in place. `previous_key` is informational only.
    ChildChanged {
        item: Item,
        previous_key: Option<Key>,
    },

    ChildRemoved {
        item: Item,
    },

    ChildMoved {
        item: Item,
        previous_key: Option<Key>,
    },

    // --- Lifecycle Events ---
    /// Finished replaying existing children, now streaming live.
    CaughtUp,

    /// Subscription was dropped.
    Dropped {
        reason: DropReason,
    },
}

impl QueryEvent {
    /// Kind of child event, or `None` for lifecycle events.
    pub fn kind(&self) -> Option<ChildEventKind> {
        match self {
            QueryEvent::ChildAdded { .. } => Some(ChildEventKind::Added),
            QueryEvent::ChildChanged { .. } => Some(ChildEventKind::Changed),
            QueryEvent::ChildRemoved { .. } => Some(ChildEventKind::Removed),
            QueryEvent::ChildMoved { .. } => Some(ChildEventKind::Moved),
            QueryEvent::CaughtUp | QueryEvent::Dropped { .. } => None,
        }
    }
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// The source went away.
    Disconnected,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to manage a subscription.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<QueryEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<QueryEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<QueryEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<QueryEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// A remote ordered-collection query that delivers child events.
pub trait ChildEventSource: Send + Sync {
    /// Register a subscription. Existing children may be replayed as
    /// `ChildAdded` before `CaughtUp`.
    fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle;

    /// Release a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);

    /// Path of the collection this query is scoped to.
    fn collection(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceRef;

    #[test]
    fn test_filter_only() {
        let filter = SubscriptionFilter::only(&[ChildEventKind::Added, ChildEventKind::Moved]);
        assert!(filter.matches(ChildEventKind::Added));
        assert!(filter.matches(ChildEventKind::Moved));
        assert!(!filter.matches(ChildEventKind::Changed));
        assert!(!filter.matches(ChildEventKind::Removed));
    }

    #[test]
    fn test_event_serde_tag() {
        let event = QueryEvent::ChildRemoved {
            item: Item::raw(SourceRef::new("todos", "a"), vec![]),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "child_removed");
        assert_eq!(value["item"]["source"]["key"], "a");

        let back: QueryEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back.kind(), Some(ChildEventKind::Removed));
    }
}
