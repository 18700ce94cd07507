//! Ordered mirror of a remote collection.
//!
//! The mirror subscribes once to a query and keeps a local sequence in the
//! same order as the remote collection. Each child event is applied in
//! place and reported to at most one observer:
//!
//! - Added: inserted right after its previous sibling
//! - Changed: replaced at its current position
//! - Removed: deleted at its current position
//! - Moved: repositioned right after its new previous sibling
//!
//! Lookups are by key, scanning the sequence in order. A key that should be
//! known but is not means the mirror has diverged from its source; the
//! failing event is rejected without touching the sequence and the mirror
//! stops accepting events.

mod observer;
mod ordered;

pub use observer::MirrorObserver;
pub use ordered::{MirrorChange, MirrorConfig, MirrorState, MoveStrategy, OrderedMirror};
