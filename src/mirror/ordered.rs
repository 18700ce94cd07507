//! The ordered mirror itself.

use crate::error::{MirrorError, Result};
use crate::subscriptions::{
    ChildEventSource, DropReason, QueryEvent, SubscriptionConfig, SubscriptionFilter,
    SubscriptionHandle,
};
use crate::types::{Item, Key, Slot, SourceRef};
use crossbeam_channel::{RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

use super::observer::MirrorObserver;

/// How a moved child is repositioned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MoveStrategy {
    /// Remove the old occurrence, then insert after the new previous sibling.
    #[default]
    Relocate,

    /// Insert a copy after the new previous sibling and leave the old
    /// occurrence in place. Breaks key uniqueness; later lookups resolve to
    /// the first occurrence.
    Duplicate,
}

/// Mirror configuration.
#[derive(Clone, Debug)]
pub struct MirrorConfig {
    /// Subscription buffer size (events).
    pub buffer_size: usize,

    /// How `ChildMoved` events are applied.
    pub move_strategy: MoveStrategy,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            move_strategy: MoveStrategy::Relocate,
        }
    }
}

/// Lifecycle of a mirror.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MirrorState {
    /// Accepting events.
    Live,
    /// Diverged from its source; reads still work, events are rejected.
    Faulted,
    /// Torn down; the subscription is released.
    Detached,
}

/// A change applied to the mirror, as reported to the observer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MirrorChange {
    Added { key: Key, index: usize },
    Changed { key: Key, index: usize },
    Removed { key: Key, index: usize },
    Moved { key: Key, from: usize, to: usize },
}

/// Local ordered copy of a remote collection.
///
/// Not thread-safe: events must be applied one at a time.
pub struct OrderedMirror {
    /// Source of child events.
    query: Arc<dyn ChildEventSource>,

    /// Live subscription (None once torn down).
    subscription: Option<SubscriptionHandle>,

    /// The mirrored sequence.
    items: Vec<Item>,

    observer: Option<Box<dyn MirrorObserver>>,

    config: MirrorConfig,

    state: MirrorState,

    /// Whether the source finished replaying existing children.
    caught_up: bool,
}

impl OrderedMirror {
    /// Subscribe to `query` with the default configuration.
    pub fn new(query: Arc<dyn ChildEventSource>) -> Self {
        Self::with_config(query, MirrorConfig::default())
    }

    /// Subscribe to `query` for all four child event kinds.
    pub fn with_config(query: Arc<dyn ChildEventSource>, config: MirrorConfig) -> Self {
        let subscription = query.subscribe(SubscriptionConfig {
            buffer_size: config.buffer_size,
            filter: SubscriptionFilter::all(),
        });
        debug!(
            collection = query.collection(),
            subscription = subscription.id.0,
            "mirror attached"
        );

        Self {
            query,
            subscription: Some(subscription),
            items: Vec::new(),
            observer: None,
            config,
            state: MirrorState::Live,
            caught_up: false,
        }
    }

    /// Release the subscription. Safe to call more than once.
    ///
    /// Applied items stay readable; no further events are processed.
    pub fn teardown(&mut self) {
        if let Some(handle) = self.subscription.take() {
            self.query.unsubscribe(handle.id);
            debug!(
                collection = self.query.collection(),
                subscription = handle.id.0,
                count = self.items.len(),
                "mirror detached"
            );
        }
        self.state = MirrorState::Detached;
    }

    // --- Observer ---

    /// Attach an observer, returning the one it replaces.
    pub fn set_observer(
        &mut self,
        observer: impl MirrorObserver + 'static,
    ) -> Option<Box<dyn MirrorObserver>> {
        self.observer.replace(Box::new(observer))
    }

    pub fn clear_observer(&mut self) -> Option<Box<dyn MirrorObserver>> {
        self.observer.take()
    }

    // --- Reads ---

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= count()`.
    pub fn item_at(&self, index: usize) -> &Item {
        &self.items[index]
    }

    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    /// Like `item_at`, but reports out-of-range access as an error.
    pub fn try_item_at(&self, index: usize) -> Result<&Item> {
        self.items.get(index).ok_or(MirrorError::IndexOutOfRange {
            index,
            len: self.items.len(),
        })
    }

    /// Locator of the remote entry behind the item at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= count()`.
    pub fn source_ref(&self, index: usize) -> &SourceRef {
        &self.items[index].source
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    pub fn keys(&self) -> Vec<Key> {
        self.items.iter().map(|i| i.key().clone()).collect()
    }

    /// Position of the first item with `key`.
    pub fn index_of(&self, key: &Key) -> Option<usize> {
        self.items.iter().position(|i| i.key() == key)
    }

    pub fn state(&self) -> MirrorState {
        self.state
    }

    pub fn is_caught_up(&self) -> bool {
        self.caught_up
    }

    // --- Event Pumping ---

    /// Apply every event already queued on the subscription.
    ///
    /// Returns the number of child changes applied. Stops at the first
    /// failure; events after it stay queued.
    pub fn process_pending(&mut self) -> Result<usize> {
        let mut applied = 0;
        while let Some(event) = self.next_event(None)? {
            if self.apply(event)?.is_some() {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Wait up to `timeout` for one event and apply it.
    ///
    /// Returns `None` on timeout, after teardown, or for lifecycle events.
    pub fn process_next(&mut self, timeout: Duration) -> Result<Option<MirrorChange>> {
        match self.next_event(Some(timeout))? {
            Some(event) => self.apply(event),
            None => Ok(None),
        }
    }

    fn next_event(&mut self, timeout: Option<Duration>) -> Result<Option<QueryEvent>> {
        match self.state {
            MirrorState::Live => {}
            MirrorState::Detached => return Ok(None),
            MirrorState::Faulted => return Err(MirrorError::Desynchronized),
        }
        let Some(handle) = self.subscription.as_ref() else {
            return Ok(None);
        };

        let received = match timeout {
            None => match handle.try_recv() {
                Ok(event) => Some(event),
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => None,
            },
            Some(timeout) => match handle.recv_timeout(timeout) {
                Ok(event) => Some(event),
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => None,
            },
        };

        match received {
            Some(event) => Ok(Some(event)),
            None => {
                warn!(collection = self.query.collection(), "event source disconnected");
                self.state = MirrorState::Faulted;
                Err(MirrorError::SubscriptionDropped(DropReason::Disconnected))
            }
        }
    }

    // --- Event Handling ---

    /// Apply one event from the source.
    ///
    /// Child events yield the change reported to the observer; lifecycle
    /// events yield `None`.
    pub fn apply(&mut self, event: QueryEvent) -> Result<Option<MirrorChange>> {
        match event {
            QueryEvent::ChildAdded { item, previous_key } => {
                self.child_added(item, previous_key.as_ref()).map(Some)
            }
            QueryEvent::ChildChanged { item, .. } => self.child_changed(item).map(Some),
            QueryEvent::ChildRemoved { item } => self.child_removed(item).map(Some),
            QueryEvent::ChildMoved { item, previous_key } => {
                self.child_moved(item, previous_key.as_ref()).map(Some)
            }
            QueryEvent::CaughtUp => {
                self.ensure_live()?;
                self.caught_up = true;
                debug!(count = self.items.len(), "mirror caught up");
                Ok(None)
            }
            QueryEvent::Dropped { reason } => {
                self.ensure_live()?;
                warn!(?reason, "mirror subscription dropped");
                self.state = MirrorState::Faulted;
                Err(MirrorError::SubscriptionDropped(reason))
            }
        }
    }

    /// Insert `item` immediately after `previous_key` (`None` = first).
    pub fn child_added(&mut self, item: Item, previous_key: Option<&Key>) -> Result<MirrorChange> {
        self.ensure_live()?;
        let result = self.insert_added(item, previous_key);
        self.settle(result)
    }

    /// Replace the stored item with the same key, keeping its position.
    pub fn child_changed(&mut self, item: Item) -> Result<MirrorChange> {
        self.ensure_live()?;
        let result = self.replace_changed(item);
        self.settle(result)
    }

    /// Delete the stored item with the same key.
    pub fn child_removed(&mut self, item: Item) -> Result<MirrorChange> {
        self.ensure_live()?;
        let result = self.delete_removed(item);
        self.settle(result)
    }

    /// Reposition `item` immediately after `previous_key` (`None` = first).
    pub fn child_moved(&mut self, item: Item, previous_key: Option<&Key>) -> Result<MirrorChange> {
        self.ensure_live()?;
        let result = self.reposition_moved(item, previous_key);
        self.settle(result)
    }

    fn insert_added(&mut self, item: Item, previous_key: Option<&Key>) -> Result<MirrorChange> {
        let slot = self.locate(previous_key)?;
        if self.index_of(item.key()).is_some() {
            error!(key = %item.key(), "added key already mirrored");
            return Err(MirrorError::DuplicateKey(item.key().clone()));
        }

        let index = slot.insertion_index();
        let key = item.key().clone();
        trace!(key = %key, index, "child added");
        self.items.insert(index, item);

        if let Some(observer) = self.observer.as_mut() {
            observer.child_added(&self.items[index], index);
        }
        Ok(MirrorChange::Added { key, index })
    }

    fn replace_changed(&mut self, item: Item) -> Result<MirrorChange> {
        let index = self.require(item.key())?;

        let key = item.key().clone();
        trace!(key = %key, index, "child changed");
        self.items[index] = item;

        if let Some(observer) = self.observer.as_mut() {
            observer.child_changed(&self.items[index], index);
        }
        Ok(MirrorChange::Changed { key, index })
    }

    fn delete_removed(&mut self, item: Item) -> Result<MirrorChange> {
        let index = self.require(item.key())?;

        trace!(key = %item.key(), index, "child removed");
        self.items.remove(index);

        if let Some(observer) = self.observer.as_mut() {
            observer.child_removed(&item, index);
        }
        Ok(MirrorChange::Removed {
            key: item.key().clone(),
            index,
        })
    }

    fn reposition_moved(&mut self, item: Item, previous_key: Option<&Key>) -> Result<MirrorChange> {
        let slot = self.locate(previous_key)?;
        let from = self.require(item.key())?;

        let to = match self.config.move_strategy {
            MoveStrategy::Relocate => {
                if previous_key == Some(item.key()) {
                    error!(key = %item.key(), "moved child follows itself");
                    return Err(MirrorError::InvalidMove(item.key().clone()));
                }
                // Resolve the slot against the sequence without the old occurrence.
                let to = match slot {
                    Slot::At(previous) if previous > from => previous,
                    slot => slot.insertion_index(),
                };
                self.items.remove(from);
                to
            }
            MoveStrategy::Duplicate => slot.insertion_index(),
        };

        let key = item.key().clone();
        trace!(key = %key, from, to, "child moved");
        self.items.insert(to, item);

        if let Some(observer) = self.observer.as_mut() {
            observer.child_moved(&self.items[to], from, to);
        }
        Ok(MirrorChange::Moved { key, from, to })
    }

    // --- Identity Lookup ---

    /// Resolve a sibling key to a slot. `None` is the front of the sequence.
    fn locate(&self, key: Option<&Key>) -> Result<Slot> {
        match key {
            None => Ok(Slot::Front),
            Some(key) => self.require(key).map(Slot::At),
        }
    }

    fn require(&self, key: &Key) -> Result<usize> {
        self.index_of(key).ok_or_else(|| {
            error!(key = %key, count = self.items.len(), "key not found in mirror");
            MirrorError::KeyNotFound {
                key: key.clone(),
                snapshot: self.keys(),
            }
        })
    }

    fn ensure_live(&self) -> Result<()> {
        match self.state {
            MirrorState::Live => Ok(()),
            MirrorState::Faulted => Err(MirrorError::Desynchronized),
            MirrorState::Detached => Err(MirrorError::Detached),
        }
    }

    /// Fault the mirror if `result` says it diverged from its source.
    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_fatal() {
                self.state = MirrorState::Faulted;
            }
        }
        result
    }
}

impl Drop for OrderedMirror {
    fn drop(&mut self) {
        self.teardown();
    }
}
