#![forbid(unsafe_code)]

//! GPU-side resources owned by scene entities.
//!
//! Meshes are allocated from a [`ResourcePool`] and referenced by
//! [`MeshHandle`]. An entity that leaves the scene for good (its removal can
//! no longer be undone) must give its meshes back; the pool records every
//! release so leaks and double frees show up in tests.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// Handle of an allocated mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeshHandle(u64);

impl MeshHandle {
    /// Raw handle value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MeshHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mesh:{}", self.0)
    }
}

/// Allocator for mesh handles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePool {
    next: u64,
    /// Live handles and the asset each was loaded from.
    live: BTreeMap<MeshHandle, String>,
    /// Handles released so far, in release order.
    #[serde(default)]
    released: Vec<MeshHandle>,
}

impl ResourcePool {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a mesh for `asset`.
    pub fn allocate(&mut self, asset: impl Into<String>) -> MeshHandle {
        self.next += 1;
        let handle = MeshHandle(self.next);
        let asset = asset.into();
        trace!(%handle, asset = asset.as_str(), "mesh allocated");
        self.live.insert(handle, asset);
        handle
    }

    /// Release a mesh. Returns `false` if it was not live.
    pub fn release(&mut self, handle: MeshHandle) -> bool {
        if self.live.remove(&handle).is_none() {
            warn!(%handle, "release of a mesh that is not live");
            return false;
        }
        trace!(%handle, "mesh released");
        self.released.push(handle);
        true
    }

    /// Whether `handle` is allocated and not yet released.
    #[must_use]
    pub fn is_live(&self, handle: MeshHandle) -> bool {
        self.live.contains_key(&handle)
    }

    /// Asset a live handle was loaded from.
    #[must_use]
    pub fn asset(&self, handle: MeshHandle) -> Option<&str> {
        self.live.get(&handle).map(String::as_str)
    }

    /// Live handles in allocation order.
    pub fn live(&self) -> impl Iterator<Item = MeshHandle> + '_ {
        self.live.keys().copied()
    }

    /// Number of live handles.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Every release so far, in order.
    #[must_use]
    pub fn released(&self) -> &[MeshHandle] {
        &self.released
    }

    /// How many times `handle` was released.
    #[must_use]
    pub fn release_count(&self, handle: MeshHandle) -> usize {
        self.released.iter().filter(|&&h| h == handle).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_release() {
        let mut pool = ResourcePool::new();
        let a = pool.allocate("cube.obj");
        let b = pool.allocate("sphere.obj");
        assert_ne!(a, b);
        assert_eq!(pool.live_count(), 2);
        assert_eq!(pool.live().collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(pool.asset(a), Some("cube.obj"));

        assert!(pool.release(a));
        assert!(!pool.is_live(a));
        assert_eq!(pool.released(), &[a]);
    }

    #[test]
    fn double_release_is_refused() {
        let mut pool = ResourcePool::new();
        let a = pool.allocate("cube.obj");
        assert!(pool.release(a));
        assert!(!pool.release(a));
        assert_eq!(pool.release_count(a), 1);
    }

    #[test]
    fn display() {
        let mut pool = ResourcePool::new();
        assert_eq!(pool.allocate("x").to_string(), "mesh:1");
    }
}
