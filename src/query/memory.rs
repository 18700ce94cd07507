//! In-memory ordered collection that emits canonical child events.

use crate::error::{MirrorError, Result};
use crate::subscriptions::{
    ChildEventSource, QueryEvent, SubscriptionConfig, SubscriptionHandle,
    SubscriptionId, SubscriptionManager,
};
use crate::types::{Item, Key};
use parking_lot::RwLock;
use tracing::{debug, trace};

/// An ordered collection held in memory.
///
/// Every mutation emits exactly one child event to caught-up subscribers,
/// carrying the key of the sibling the child now follows. Mutations hold the
/// collection lock while broadcasting, so subscribers observe events in the
/// same order the collection applied them.
pub struct MemoryQuery {
    collection: String,
    children: RwLock<Vec<Item>>,
    subscriptions: SubscriptionManager,
}

impl MemoryQuery {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            children: RwLock::new(Vec::new()),
            subscriptions: SubscriptionManager::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.children.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.read().is_empty()
    }

    /// Keys in collection order.
    pub fn keys(&self) -> Vec<Key> {
        self.children.read().iter().map(|c| c.key().clone()).collect()
    }

    pub fn get(&self, key: &Key) -> Option<Item> {
        self.children.read().iter().find(|c| c.key() == key).cloned()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.subscription_count()
    }

    // --- Mutations ---

    /// Insert a child immediately after `previous` (`None` = first).
    pub fn insert_after(&self, item: Item, previous: Option<&Key>) -> Result<()> {
        let mut children = self.children.write();
        self.insert_locked(&mut children, item, previous)
    }

    /// Append a child at the end.
    pub fn push(&self, item: Item) -> Result<()> {
        let mut children = self.children.write();
        let last = children.last().map(|c| c.key().clone());
        self.insert_locked(&mut children, item, last.as_ref())
    }

    fn insert_locked(
        &self,
        children: &mut Vec<Item>,
        item: Item,
        previous: Option<&Key>,
    ) -> Result<()> {
        if position(children, item.key()).is_some() {
            return Err(MirrorError::DuplicateKey(item.key().clone()));
        }
        let index = match previous {
            None => 0,
            Some(key) => require(children, key)? + 1,
        };

        trace!(key = %item.key(), index, "child added");
        self.subscriptions.broadcast_child_added(&item, previous);
        children.insert(index, item);
        Ok(())
    }

    /// Replace a child's payload in place.
    pub fn update(&self, item: Item) -> Result<()> {
        let mut children = self.children.write();
        let index = require(&children, item.key())?;
        let previous = preceding_key(&children, index);

        trace!(key = %item.key(), index, "child changed");
        self.subscriptions
            .broadcast_child_changed(&item, previous.as_ref());
        children[index] = item;
        Ok(())
    }

    /// Remove a child, returning it.
    pub fn remove(&self, key: &Key) -> Result<Item> {
        let mut children = self.children.write();
        let index = require(&children, key)?;
        let item = children.remove(index);

        trace!(key = %key, index, "child removed");
        self.subscriptions.broadcast_child_removed(&item);
        Ok(item)
    }

    /// Reposition a child immediately after `previous` (`None` = first).
    pub fn move_after(&self, key: &Key, previous: Option<&Key>) -> Result<()> {
        if previous == Some(key) {
            return Err(MirrorError::InvalidMove(key.clone()));
        }

        let mut children = self.children.write();
        let from = require(&children, key)?;
        if let Some(previous) = previous {
            require(&children, previous)?;
        }

        let item = children.remove(from);
        let to = match previous {
            None => 0,
            // Present before the removal and distinct from `key`, so still present.
            Some(previous) => position(&children, previous).map_or(0, |i| i + 1),
        };

        trace!(key = %key, from, to, "child moved");
        self.subscriptions.broadcast_child_moved(&item, previous);
        children.insert(to, item);
        Ok(())
    }
}

impl ChildEventSource for MemoryQuery {
    /// Replays existing children as `ChildAdded`, then sends `CaughtUp`.
    ///
    /// The channel gets room for the whole replay on top of `buffer_size`,
    /// so `buffer_size` only bounds how far live delivery may lag.
    fn subscribe(&self, mut config: SubscriptionConfig) -> SubscriptionHandle {
        // Held for the whole replay so no live mutation interleaves.
        let children = self.children.read();
        config.buffer_size = config.buffer_size.saturating_add(children.len() + 1);
        let handle = self.subscriptions.subscribe(config);

        let mut previous: Option<&Key> = None;
        for child in children.iter() {
            self.subscriptions.send_to(
                handle.id,
                QueryEvent::ChildAdded {
                    item: child.clone(),
                    previous_key: previous.cloned(),
                },
            );
            previous = Some(child.key());
        }

        // Cannot overflow: the replay headroom covers CaughtUp.
        let _ = self.subscriptions.mark_caught_up(handle.id);
        debug!(collection = %self.collection, replayed = children.len(), "query subscribed");
        handle
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.unsubscribe(id);
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}

fn position(children: &[Item], key: &Key) -> Option<usize> {
    children.iter().position(|c| c.key() == key)
}

fn require(children: &[Item], key: &Key) -> Result<usize> {
    position(children, key).ok_or_else(|| MirrorError::KeyNotFound {
        key: key.clone(),
        snapshot: children.iter().map(|c| c.key().clone()).collect(),
    })
}

fn preceding_key(children: &[Item], index: usize) -> Option<Key> {
    index
        .checked_sub(1)
        .map(|i| children[i].key().clone())
}
