//! Subscription system for child events of a remote ordered collection.
//!
//! A query delivers four kinds of child events:
//! - Added, with the key of the sibling the new child follows
//! - Changed, payload replaced in place
//! - Removed
//! - Moved, with the key of the sibling the child now follows
//!
//! Subscriptions support:
//! - Filtering by event kind
//! - Replay of existing children before live delivery
//! - Bounded buffers with slow-subscriber dropping
//!
//! # Example
//!
//! ```ignore
//! let manager = SubscriptionManager::new();
//! let handle = manager.subscribe(SubscriptionConfig::default());
//! manager.mark_caught_up(handle.id)?;
//!
//! loop {
//!     match handle.recv() {
//!         Ok(QueryEvent::ChildAdded { item, previous_key }) => println!("{item:?} after {previous_key:?}"),
//!         Ok(QueryEvent::Dropped { reason }) => break,
//!         Ok(_) => {}
//!         Err(_) => break,
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    ChildEventKind, ChildEventSource, DropReason, QueryEvent, SubscriptionConfig,
    SubscriptionFilter, SubscriptionHandle, SubscriptionId,
};
