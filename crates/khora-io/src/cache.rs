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

//! Name-keyed storage for in-flight and loaded bundles.

use crate::container::{BundleContainer, ContainerState};
use std::{collections::HashMap, sync::Arc};

/// Maps bundle names to their containers.
///
/// A name is inserted the moment its load starts, so a second request for
/// the same name always finds the pending container instead of opening the
/// file again.
#[derive(Default, Debug)]
pub struct BundleCache {
    containers: HashMap<String, Arc<BundleContainer>>,
}

impl BundleCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the container cached under `name`, loaded or not.
    pub fn get(&self, name: &str) -> Option<Arc<BundleContainer>> {
        self.containers.get(name).cloned()
    }

    /// Returns `true` if a container is cached under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.containers.contains_key(name)
    }

    /// Number of resident containers.
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    /// Returns `true` if nothing is resident.
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Number of containers whose open has not finished yet.
    pub fn loading_count(&self) -> usize {
        self.containers
            .values()
            .filter(|container| container.state() == ContainerState::Loading)
            .count()
    }

    pub(crate) fn insert(&mut self, container: Arc<BundleContainer>) {
        self.containers.insert(container.name().to_owned(), container);
    }

    /// Removes `container`, unless its name has already been taken by a newer one.
    pub(crate) fn remove(&mut self, container: &Arc<BundleContainer>) -> bool {
        match self.containers.get(container.name()) {
            Some(cached) if Arc::ptr_eq(cached, container) => {
                self.containers.remove(container.name());
                true
            }
            _ => false,
        }
    }

    /// Runs `observe` on every container.
    pub(crate) fn for_each(&self, mut observe: impl FnMut(&Arc<BundleContainer>)) {
        self.containers.values().for_each(|container| observe(container));
    }

    /// First sweep phase: pushes every unused container into `unused`.
    pub(crate) fn collect_unused(&self, unused: &mut Vec<Arc<BundleContainer>>) {
        unused.extend(
            self.containers
                .values()
                .filter(|container| !container.is_used())
                .cloned(),
        );
    }

    /// Empties the cache, handing every container to the caller.
    pub(crate) fn drain(&mut self) -> Vec<Arc<BundleContainer>> {
        self.containers.drain().map(|(_, container)| container).collect()
    }
}
