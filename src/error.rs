//! Error types for the ordered mirror.

use crate::subscriptions::DropReason;
use crate::types::Key;
use thiserror::Error;

/// Main error type for mirror operations.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// An event referenced a key that is not in the local sequence.
    /// `snapshot` is the key order at the time of the failed lookup.
    #[error("Key not found: {key} (mirror holds {snapshot:?})")]
    KeyNotFound { key: Key, snapshot: Vec<Key> },

    #[error("Index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Key already present: {0}")]
    DuplicateKey(Key),

    #[error("Invalid move: {0} cannot follow itself")]
    InvalidMove(Key),

    #[error("Subscription dropped: {0:?}")]
    SubscriptionDropped(DropReason),

    #[error("Mirror is desynchronized from its source")]
    Desynchronized,

    #[error("Mirror has been torn down")]
    Detached,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl MirrorError {
    /// Whether this error means the local sequence can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MirrorError::KeyNotFound { .. }
                | MirrorError::DuplicateKey(_)
                | MirrorError::InvalidMove(_)
                | MirrorError::SubscriptionDropped(_)
        )
    }
}

impl From<serde_json::Error> for MirrorError {
    fn from(e: serde_json::Error) -> Self {
        MirrorError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for MirrorError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        MirrorError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for MirrorError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        MirrorError::Deserialization(e.to_string())
    }
}

/// Result type for mirror operations.
pub type Result<T> = std::result::Result<T, MirrorError>;
