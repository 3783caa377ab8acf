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

//! # Khora IO
//!
//! Discovery, loading, caching and eviction of content bundles drawn from
//! several overlapping content directories.
//!
//! The entry point is [`BundleService`]. It owns a [`DirectoryRegistry`] of
//! content roots, a [`BundleCache`] of [`BundleContainer`]s and an
//! [`AutoUnloadScheduler`] that periodically disposes the bundles nothing
//! refers to anymore. Every operation is meant to be called from the thread
//! that created the service; calls from other threads are rejected.

#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod container;
pub mod error;
pub mod registry;
pub mod scheduler;
pub mod service;

pub use cache::BundleCache;
pub use config::{BundleCacheConfig, DirectoryConfig};
pub use container::{BundleContainer, ContainerKind, ContainerState};
pub use error::{BundleError, Result};
pub use registry::{BundleFile, DirectoryEntry, DirectoryRegistry};
pub use scheduler::{AutoUnloadScheduler, SchedulerSettings};
pub use service::{BundleService, CacheStatus};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks `mutex`, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
