// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::Asset;
use std::{
    ops::Deref,
    sync::{Arc, Weak},
};

/// A thread-safe, reference-counted handle to an extracted asset.
///
/// This acts as a smart pointer, providing shared ownership of an asset's data.
/// Cloning a handle is cheap, as it only increments the reference count
/// and does not duplicate the underlying asset data.
///
/// The bundle that produced the asset watches these handles through a weak
/// reference: as long as one clone is alive, the bundle is considered in use.
#[derive(Debug)]
pub struct AssetHandle<T: Asset>(Arc<T>);

impl<T: Asset> AssetHandle<T> {
    /// Creates a new `AssetHandle` that takes ownership of the asset data.
    pub fn new(asset: T) -> Self {
        Self(Arc::new(asset))
    }

    /// Wraps an already shared asset.
    pub fn from_arc(asset: Arc<T>) -> Self {
        Self(asset)
    }

    /// Returns the shared pointer backing this handle.
    pub fn as_arc(&self) -> &Arc<T> {
        &self.0
    }

    /// Creates a weak reference that does not keep the asset alive.
    pub fn downgrade(&self) -> Weak<T> {
        Arc::downgrade(&self.0)
    }

    /// Returns `true` if both handles point to the same asset instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live handles to this asset.
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl<T: Asset> Clone for AssetHandle<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Asset> Deref for AssetHandle<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Sprite(u32);
    impl Asset for Sprite {}

    #[test]
    fn test_clone_shares_instance() {
        let handle = AssetHandle::new(Sprite(7));
        let clone = handle.clone();

        assert!(handle.ptr_eq(&clone));
        assert_eq!(handle.strong_count(), 2);
        assert_eq!(*clone, Sprite(7));
    }

    #[test]
    fn test_weak_outlives_handles_but_not_asset() {
        let handle = AssetHandle::new(Sprite(1));
        let weak = handle.downgrade();
        assert!(weak.upgrade().is_some());

        drop(handle);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_from_arc_keeps_pointer() {
        let shared = Arc::new(Sprite(3));
        let handle = AssetHandle::from_arc(shared.clone());
        assert!(Arc::ptr_eq(handle.as_arc(), &shared));
    }
}
