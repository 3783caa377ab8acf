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

//! Provides the foundational traits and primitive types for Khora's asset system.
//!
//! This module defines the "common language" for every value that can be
//! extracted from a content bundle. It has no knowledge of how bundles are
//! found, opened or cached; that policy lives in `khora-io`.
//!
//! The key components are:
//! - The [`Asset`] trait: A marker for all types that can be treated as assets.
//! - The [`AssetHandle`]: the shared, reference-counted result of an extraction.

mod handle;

pub use handle::*;

/// A marker trait for types that can be managed by the asset system.
///
/// This trait's primary purpose is to categorize a type, making it eligible for
/// use within the engine's asset infrastructure (e.g., in an `AssetHandle<T>`).
///
/// The supertraits enforce critical safety guarantees:
/// - `Send` + `Sync`: The asset type can be safely shared and sent between threads.
///   This is essential for background extraction.
/// - `'static`: The asset type does not contain any non-static references, ensuring
///   it can be stored for the lifetime of the application.
///
/// # Examples
///
/// ```
/// use khora_core::asset::Asset;
///
/// // A simple struct representing a texture.
/// struct Texture {
///     // ... fields
/// }
///
/// // By implementing Asset, `Texture` can now be extracted from bundles.
/// impl Asset for Texture {}
/// ```
pub trait Asset: Send + Sync + 'static {}
