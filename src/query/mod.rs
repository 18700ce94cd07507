//! Reference implementation of a remote ordered-collection query.

mod memory;

pub use memory::MemoryQuery;
