#![forbid(unsafe_code)]

//! Stable identity for domain objects.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a domain object (entity, asset, script host) that commands
/// target and notifications refer to.
///
/// Identity is the only thing the history engine knows about domain objects:
/// merge keys and coalesced notifications compare `ObjectId`s, never the
/// objects themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// Create an object ID from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for ObjectId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}
