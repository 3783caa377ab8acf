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

//! The public face of the bundle subsystem.

use crate::{
    cache::BundleCache,
    config::BundleCacheConfig,
    container::BundleContainer,
    error::{BundleError, Result},
    lock,
    registry::{DirectoryEntry, DirectoryRegistry},
    scheduler::AutoUnloadScheduler,
};
use khora_core::{
    asset::{Asset, AssetHandle},
    bundle::ArchiveOpener,
    event::{SceneEvent, SceneEventHub},
    ThreadAffinity,
};
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};
use tokio::runtime::Handle;

/// A snapshot of the cache, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatus {
    /// Containers currently cached, loading or not.
    pub resident: usize,
    /// Containers whose open has not finished.
    pub loading: usize,
    /// Loads started since the service was created.
    pub loads_started: u64,
    /// Containers disposed since the service was created.
    pub disposals: u64,
}

/// Discovers, loads, caches and evicts content bundles.
///
/// One service is created per process (or per test) on the thread that will
/// drive it. Every operation checks that it is called from that thread and
/// returns its failure sentinel otherwise, without touching any state.
/// Async operations must be awaited on that thread as well, for instance
/// through `Runtime::block_on` or a current-thread runtime.
///
/// No error escapes the public surface: failures are logged and reported as
/// `None`, an empty `Vec` or `false`.
pub struct BundleService {
    affinity: ThreadAffinity,
    runtime: Handle,
    opener: Arc<dyn ArchiveOpener>,
    scenes: Arc<SceneEventHub>,
    registry: Mutex<DirectoryRegistry>,
    cache: Mutex<BundleCache>,
    /// Sweep scratch, cleared on every pass.
    unload_queue: Mutex<Vec<Arc<BundleContainer>>>,
    scheduler: AutoUnloadScheduler,
    loads_started: AtomicU64,
    disposals: AtomicU64,
}

impl BundleService {
    /// Creates a service with the default configuration on the current tokio runtime.
    pub fn new(opener: impl ArchiveOpener) -> Result<Self> {
        Self::from_config(BundleCacheConfig::default(), opener)
    }

    /// Creates a service on the current tokio runtime and registers every
    /// directory listed in `config`.
    pub fn from_config(config: BundleCacheConfig, opener: impl ArchiveOpener) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| BundleError::Configuration {
            path: PathBuf::new(),
            reason: format!("bundle service needs a tokio runtime: {e}"),
        })?;
        Self::with_runtime(config, opener, runtime)
    }

    /// Creates a service whose background work runs on `runtime`.
    pub fn with_runtime(
        config: BundleCacheConfig,
        opener: impl ArchiveOpener,
        runtime: Handle,
    ) -> Result<Self> {
        config.validate()?;

        let mut registry = DirectoryRegistry::new();
        for directory in &config.directories {
            registry.register(&directory.path, directory.priority)?;
        }

        log::info!(
            "BundleService: initialized with {} content directories (auto unload {}, every {}s)",
            registry.len(),
            if config.auto_unload_enabled { "on" } else { "off" },
            config.auto_unload_period_secs,
        );

        let affinity = ThreadAffinity::current();
        log::debug!("BundleService: bound to thread {:?}", affinity.owner());

        Ok(Self {
            affinity,
            runtime,
            opener: Arc::new(opener),
            scenes: Arc::new(SceneEventHub::new()),
            registry: Mutex::new(registry),
            cache: Mutex::new(BundleCache::new()),
            unload_queue: Mutex::new(Vec::new()),
            scheduler: AutoUnloadScheduler::new(
                config.auto_unload_enabled,
                config.auto_unload_period_secs,
            ),
            loads_started: AtomicU64::new(0),
            disposals: AtomicU64::new(0),
        })
    }

    /// Registers a content directory, creating it if needed.
    ///
    /// Returns `false` if the directory could not be prepared or is already
    /// registered.
    pub fn register_directory(&self, path: impl AsRef<Path>, priority: i32) -> bool {
        if !self.affinity.is_current() {
            return false;
        }
        match lock(&self.registry).register(path, priority) {
            Ok(added) => added,
            Err(e) => {
                e.report();
                false
            }
        }
    }

    /// Registered content directories, highest priority first.
    pub fn directories(&self) -> Vec<DirectoryEntry> {
        if !self.affinity.is_current() {
            return Vec::new();
        }
        lock(&self.registry).entries().to_vec()
    }

    /// Returns the container of `name`, starting its load if it is not cached.
    ///
    /// Repeated calls share the pending container: a bundle is never opened
    /// twice while it is resident.
    pub fn get_or_load(&self, name: &str) -> Option<Arc<BundleContainer>> {
        if !self.affinity.is_current() {
            return None;
        }
        self.try_get_or_load(name).map_err(|e| e.report()).ok()
    }

    /// Starts loading `name` without extracting anything.
    pub fn preload(&self, name: &str) -> bool {
        self.get_or_load(name).is_some()
    }

    /// Returns `true` if `name` is resident.
    pub fn is_cached(&self, name: &str) -> bool {
        self.affinity.is_current() && lock(&self.cache).contains(name)
    }

    /// Loads `asset_name` of type `T` from the bundle `bundle_name`.
    pub async fn load_asset<T: Asset>(
        &self,
        bundle_name: &str,
        asset_name: &str,
    ) -> Option<AssetHandle<T>> {
        let container = self.get_or_load(bundle_name)?;
        container
            .extract_asset::<T>(asset_name)
            .await
            .map_err(|e| e.report())
            .ok()
    }

    /// Loads `asset_name` from every bundle stored in `folder`, across all
    /// content directories.
    ///
    /// Bundles that lack the asset are skipped. The result may be empty.
    pub async fn load_assets<T: Asset>(
        &self,
        folder: &str,
        asset_name: &str,
    ) -> Vec<AssetHandle<T>> {
        if !self.affinity.is_current() {
            return Vec::new();
        }

        let files = lock(&self.registry).resolve_union(folder);
        if files.is_empty() {
            log::warn!("BundleService: no bundles found in folder '{folder}'");
            return Vec::new();
        }

        // Start every load before waiting on the first one.
        let containers: Vec<_> = files
            .iter()
            .filter_map(|file| self.get_or_load(&file.name))
            .collect();

        let mut handles = Vec::with_capacity(containers.len());
        for container in containers {
            match container.extract_asset::<T>(asset_name).await {
                Ok(handle) => handles.push(handle),
                Err(BundleError::AssetMissing { bundle, .. }) => {
                    log::debug!("BundleService: '{bundle}' does not provide '{asset_name}'")
                }
                Err(e) => e.report(),
            }
        }
        handles
    }

    /// Loads every asset of type `T` stored in the bundle `bundle_name`.
    pub async fn load_all_assets<T: Asset>(&self, bundle_name: &str) -> Vec<AssetHandle<T>> {
        let Some(container) = self.get_or_load(bundle_name) else {
            return Vec::new();
        };
        container
            .extract_all_assets::<T>()
            .await
            .unwrap_or_else(|e| {
                e.report();
                Vec::new()
            })
    }

    /// Loads the scene bundle `bundle_name` and returns the path of its scene.
    pub async fn load_scene(&self, bundle_name: &str) -> Option<String> {
        let container = self.get_or_load(bundle_name)?;
        container
            .extract_scene_path()
            .await
            .map_err(|e| e.report())
            .ok()
    }

    /// Disposes `name` right away, whether it is still in use or not.
    pub fn unload_bundle(&self, name: &str) -> bool {
        if !self.affinity.is_current() {
            return false;
        }
        let Some(container) = lock(&self.cache).get(name) else {
            return false;
        };
        self.dispose_container(&container);
        true
    }

    /// Disposes every bundle that is no longer in use.
    ///
    /// Returns the number of bundles disposed.
    pub fn unload_unused_bundles(&self) -> usize {
        if !self.affinity.is_current() {
            return 0;
        }
        self.process_events();

        let mut queue = lock(&self.unload_queue);
        queue.clear();
        lock(&self.cache).collect_unused(&mut queue);

        let mut disposed = 0;
        for container in queue.drain(..) {
            // Something may have started using it since it was collected.
            if container.is_used() {
                log::debug!("BundleService: '{}' is back in use, keeping it", container.name());
                continue;
            }
            self.dispose_container(&container);
            disposed += 1;
        }

        if disposed > 0 {
            log::info!("BundleService: unloaded {disposed} unused bundles");
        }
        disposed
    }

    /// Whether unused bundles are swept periodically.
    pub fn auto_unload_enabled(&self) -> bool {
        self.scheduler.is_enabled()
    }

    /// Turns the periodic sweep on or off. Turning it on sweeps once right away.
    pub fn set_auto_unload_enabled(&self, enabled: bool) -> bool {
        if !self.affinity.is_current() {
            return false;
        }
        if self.scheduler.set_enabled(enabled) {
            log::info!("BundleService: auto unload enabled");
            self.unload_unused_bundles();
        }
        true
    }

    /// Delay between two periodic sweeps, in seconds.
    pub fn auto_unload_period_secs(&self) -> f32 {
        self.scheduler.period_secs()
    }

    /// Changes the delay between two periodic sweeps.
    ///
    /// Returns `false` if the value is below the minimum period or not finite.
    pub fn set_auto_unload_period_secs(&self, period_secs: f32) -> bool {
        if !self.affinity.is_current() {
            return false;
        }
        self.scheduler
            .set_period_secs(period_secs)
            .map_err(|e| e.report())
            .is_ok()
    }

    /// Runs the periodic sweep until [`shutdown`](Self::shutdown).
    ///
    /// Poll this future on the service's thread, next to the rest of the
    /// frame work. While auto unload is disabled the loop only waits.
    pub async fn run_auto_unload(&self) {
        if !self.affinity.is_current() {
            return;
        }
        self.scheduler
            .run(|| {
                self.unload_unused_bundles();
            })
            .await;
    }

    /// Returns a sender through which scene managers report unloaded scenes.
    ///
    /// The sender may be used from any thread; notifications are applied on
    /// the next sweep, scene load or [`process_events`](Self::process_events).
    pub fn scene_events(&self) -> flume::Sender<SceneEvent> {
        self.scenes.sender()
    }

    /// Applies pending scene notifications to the cached scene bundles.
    ///
    /// Returns the number of notifications processed.
    pub fn process_events(&self) -> usize {
        if !self.affinity.is_current() {
            return 0;
        }
        lock(&self.cache).for_each(|container| container.observe_load());
        self.scenes.dispatch_pending()
    }

    /// A snapshot of the cache.
    pub fn status(&self) -> CacheStatus {
        if !self.affinity.is_current() {
            return CacheStatus::default();
        }
        let cache = lock(&self.cache);
        CacheStatus {
            resident: cache.len(),
            loading: cache.loading_count(),
            loads_started: self.loads_started.load(Ordering::Relaxed),
            disposals: self.disposals.load(Ordering::Relaxed),
        }
    }

    /// Stops the scheduler and disposes every resident bundle, used or not.
    pub fn shutdown(&self) {
        if !self.affinity.is_current() {
            return;
        }
        self.teardown();
    }

    fn try_get_or_load(&self, name: &str) -> Result<Arc<BundleContainer>> {
        if let Some(container) = lock(&self.cache).get(name) {
            return Ok(container);
        }

        let path = lock(&self.registry)
            .resolve_override(name)
            .ok_or_else(|| BundleError::ResolutionMiss {
                name: name.to_owned(),
            })?;

        log::debug!("BundleService: loading '{name}' from '{}'", path.display());
        let container = BundleContainer::open(
            name.to_owned(),
            path,
            self.opener.clone(),
            self.scenes.clone(),
            &self.runtime,
        );
        lock(&self.cache).insert(container.clone());
        self.loads_started.fetch_add(1, Ordering::Relaxed);
        Ok(container)
    }

    fn dispose_container(&self, container: &Arc<BundleContainer>) {
        lock(&self.cache).remove(container);
        container.dispose();
        self.disposals.fetch_add(1, Ordering::Relaxed);
    }

    fn teardown(&self) {
        self.scheduler.stop();
        let containers = lock(&self.cache).drain();
        if containers.is_empty() {
            return;
        }

        let count = containers.len();
        for container in containers {
            container.dispose();
            self.disposals.fetch_add(1, Ordering::Relaxed);
        }
        log::info!("BundleService: shutdown disposed {count} bundles");
    }
}

impl Drop for BundleService {
    fn drop(&mut self) {
        self.teardown();
    }
}
