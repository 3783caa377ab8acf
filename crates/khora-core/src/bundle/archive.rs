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

use anyhow::Result;
use std::{
    any::{Any, TypeId},
    fmt,
    path::Path,
    sync::Arc,
};

/// A type-erased value produced by a [`BundleArchive`].
///
/// The archive hands over ownership; the caller decides how the value is
/// shared and tracked.
pub type ExtractedAsset = Box<dyn Any + Send + Sync>;

/// Describes the Rust type an extraction request expects.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetType {
    id: TypeId,
    name: &'static str,
}

impl AssetType {
    /// Returns the descriptor for `T`.
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The `TypeId` of the requested type.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The fully qualified type name, for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if this descriptor names `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl fmt::Debug for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// One opened content archive.
///
/// Implementations are called from a blocking worker thread, never from the
/// thread that owns the bundle cache, so every method may perform I/O.
pub trait BundleArchive: Send + Sync {
    /// Returns `true` if the archive carries scenes rather than assets.
    fn is_scene_bundle(&self) -> bool;

    /// Paths of the scenes stored in a scene archive. Empty for asset archives.
    fn scene_paths(&self) -> Vec<String>;

    /// Extracts the asset called `name` as an instance of `asset_type`.
    ///
    /// Returns `Ok(None)` if the archive has no asset of that name and type.
    /// The returned box must hold a value whose `TypeId` is `asset_type.id()`.
    fn load_asset(&self, name: &str, asset_type: AssetType) -> Result<Option<ExtractedAsset>>;

    /// Extracts every asset of `asset_type`, paired with its name.
    fn load_all_assets(&self, asset_type: AssetType) -> Result<Vec<(String, ExtractedAsset)>>;

    /// Releases the archive. When `destroy_contained_objects` is set, every
    /// object the archive still owns is released as well.
    fn unload(&self, destroy_contained_objects: bool);
}

/// Opens bundle files into [`BundleArchive`]s.
///
/// `open` blocks; callers run it on a worker thread.
pub trait ArchiveOpener: Send + Sync + 'static {
    /// Reads and decodes the archive stored at `path`.
    fn open(&self, path: &Path) -> Result<Arc<dyn BundleArchive>>;
}

impl<F> ArchiveOpener for F
where
    F: Fn(&Path) -> Result<Arc<dyn BundleArchive>> + Send + Sync + 'static,
{
    fn open(&self, path: &Path) -> Result<Arc<dyn BundleArchive>> {
        self(path)
    }
}
