//! Core types for the ordered mirror.

use crate::error::{MirrorError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of one collection member.
///
/// Unique among the members present at any instant. Keys may be removed and
/// reused upstream, so they are not unique across time.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(pub String);

impl Key {
    pub fn new(key: impl Into<String>) -> Self {
        Key(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key(s)
    }
}

/// Locator of one entry in the remote collection.
///
/// Usable to re-issue reads or writes against that specific remote entry.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    collection: String,
    key: Key,
}

impl SourceRef {
    pub fn new(collection: impl Into<String>, key: impl Into<Key>) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
        }
    }

    /// Path of the collection the entry lives in.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Full path of the entry (`<collection>/<key>`).
    pub fn path(&self) -> String {
        format!("{}/{}", self.collection.trim_end_matches('/'), self.key)
    }
}

impl fmt::Debug for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceRef({})", self.path())
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// Payload encoding format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadEncoding {
    #[default]
    Json,
    MessagePack,
    Raw,
}

/// Snapshot of one remote collection member as last observed.
///
/// The payload is opaque to the mirror.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Where the member lives upstream. Carries the key.
    pub source: SourceRef,

    /// Application-defined payload.
    pub payload: Vec<u8>,

    /// Payload encoding.
    pub encoding: PayloadEncoding,
}

impl Item {
    /// Create an item with a JSON payload.
    pub fn json(source: SourceRef, payload: &impl Serialize) -> Result<Self> {
        Ok(Self {
            source,
            payload: serde_json::to_vec(payload)?,
            encoding: PayloadEncoding::Json,
        })
    }

    /// Create an item with a MessagePack payload.
    pub fn msgpack(source: SourceRef, payload: &impl Serialize) -> Result<Self> {
        Ok(Self {
            source,
            payload: rmp_serde::to_vec_named(payload)?,
            encoding: PayloadEncoding::MessagePack,
        })
    }

    /// Create an item with raw bytes.
    pub fn raw(source: SourceRef, payload: Vec<u8>) -> Self {
        Self {
            source,
            payload,
            encoding: PayloadEncoding::Raw,
        }
    }

    pub fn key(&self) -> &Key {
        self.source.key()
    }

    /// Deserialize the payload according to its encoding.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        match self.encoding {
            PayloadEncoding::Json => serde_json::from_slice(&self.payload)
                .map_err(|e| MirrorError::Deserialization(e.to_string())),
            PayloadEncoding::MessagePack => Ok(rmp_serde::from_slice(&self.payload)?),
            PayloadEncoding::Raw => Err(MirrorError::Deserialization(format!(
                "raw payload of {} cannot be decoded",
                self.source
            ))),
        }
    }
}

/// Result of an identity lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    /// Before index 0 ("no predecessor").
    Front,
    /// Position of a present item.
    At(usize),
}

impl Slot {
    /// Index immediately after this slot.
    pub fn insertion_index(self) -> usize {
        match self {
            Slot::Front => 0,
            Slot::At(index) => index + 1,
        }
    }
}
