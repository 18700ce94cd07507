//! Observer notified of each structural change to a mirror.

use crate::types::Item;

/// Receives one callback per applied child event.
///
/// Called synchronously, after the sequence has been updated, on the thread
/// that applied the event. Indices refer to the updated sequence, except for
/// `child_removed` and the `from` of `child_moved`, which refer to the
/// position before the change.
pub trait MirrorObserver {
    fn child_added(&mut self, _item: &Item, _index: usize) {}

    fn child_changed(&mut self, _item: &Item, _index: usize) {}

    fn child_removed(&mut self, _item: &Item, _index: usize) {}

    fn child_moved(&mut self, _item: &Item, _from: usize, _to: usize) {}
}
