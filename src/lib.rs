//! # Ordered Mirror
//!
//! A locally materialized, strictly ordered mirror of a remote ordered
//! collection, kept consistent by a stream of child events.
//!
//! ## Core Concepts
//!
//! - **Items**: Snapshots of remote members, identified by key, with opaque payloads
//! - **Queries**: Sources of child events (added, changed, removed, moved)
//! - **Mirror**: The local sequence, updated in place as events arrive
//! - **Observer**: Told about each change together with the affected index
//!
//! ## Example
//!
//! ```ignore
//! use ordered_mirror::{Item, MemoryQuery, OrderedMirror, SourceRef};
//!
//! let query = Arc::new(MemoryQuery::new("todos"));
//! let mut mirror = OrderedMirror::new(query.clone());
//!
//! query.push(Item::json(SourceRef::new("todos", "t1"), &json!({"title": "milk"}))?)?;
//! mirror.process_pending()?;
//!
//! assert_eq!(mirror.count(), 1);
//! assert_eq!(mirror.source_ref(0).path(), "todos/t1");
//! ```

pub mod error;
pub mod mirror;
pub mod query;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use error::{MirrorError, Result};
pub use mirror::{MirrorChange, MirrorConfig, MirrorObserver, MirrorState, MoveStrategy, OrderedMirror};
pub use query::MemoryQuery;
pub use subscriptions::{
    ChildEventKind, ChildEventSource, DropReason, QueryEvent, SubscriptionConfig,
    SubscriptionFilter, SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
pub use types::*;
