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

//! Contracts for packaged content archives ("bundles").
//!
//! A bundle is an opaque container produced by an external build step. Khora
//! never reads its binary layout directly: an [`ArchiveOpener`] turns a file
//! into a [`BundleArchive`], and the archive answers typed extraction
//! requests. Caching, override resolution and eviction are implemented on
//! top of these traits by `khora-io`.

mod archive;
mod reachability;

pub use archive::*;
pub use reachability::*;
