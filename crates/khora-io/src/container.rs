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

//! One bundle's lifecycle: asynchronous open, typed extraction, usage
//! tracking and disposal.
//!
//! ```text
//! Loading ──open completes──▶ Loaded (assets | scene) ──dispose──▶ Disposed
//!    │                                                             ▲
//!    └──────open fails──────▶ Failed ─────────dispose──────────────┘
//! ```

use crate::error::{BundleError, Result};
use crate::lock;
use khora_core::{
    asset::{Asset, AssetHandle},
    bundle::{ArchiveOpener, AssetType, BundleArchive, ReachabilityProbe, WeakProbe},
    event::{SceneEventHub, SceneSubscription},
};
use std::{
    any::Any,
    fmt,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, OnceLock, Weak,
    },
};
use tokio::runtime::Handle;

type SharedAsset = Arc<dyn Any + Send + Sync>;

/// Where a container is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    /// The archive is being opened on a worker thread.
    Loading,
    /// The archive is open and serving extractions.
    Loaded,
    /// The open finished without producing an archive.
    Failed,
    /// Terminal. The archive and everything it produced have been released.
    Disposed,
}

/// What a loaded container serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Typed assets, extracted by name.
    Assets,
    /// A scene, identified by its path.
    Scene,
}

/// The archive as it was when the open finished.
struct OpenedArchive {
    archive: Arc<dyn BundleArchive>,
    kind: ContainerKind,
    scene_path: Option<String>,
}

type LoadOutcome = std::result::Result<OpenedArchive, String>;

/// An extracted value the container keeps an eye on, without owning it.
struct TrackedAsset {
    name: String,
    asset_type: AssetType,
    handle: Weak<dyn Any + Send + Sync>,
}

struct SceneTracking {
    path: String,
    subscription: SceneSubscription,
}

#[derive(Default)]
struct Lifecycle {
    observed: bool,
    disposed: bool,
    scene: Option<SceneTracking>,
    live_references: Vec<TrackedAsset>,
}

/// Counts an extraction as usage for as long as it is in flight.
struct PendingExtraction<'a>(&'a AtomicUsize);

impl<'a> PendingExtraction<'a> {
    fn begin(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for PendingExtraction<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A cached bundle.
///
/// Containers are created by the [`BundleService`](crate::BundleService)
/// already in flight, and shared through `Arc` so that concurrent requests for
/// the same bundle observe the same instance.
pub struct BundleContainer {
    name: String,
    source_path: PathBuf,
    outcome: Arc<OnceLock<LoadOutcome>>,
    /// Disconnected once the open has finished, successfully or not.
    done: flume::Receiver<()>,
    lifecycle: Mutex<Lifecycle>,
    pending_extractions: AtomicUsize,
    scenes: Arc<SceneEventHub>,
    runtime: Handle,
    probe: WeakProbe,
}

impl BundleContainer {
    /// Builds the container, then starts opening `source_path` on the
    /// runtime's blocking pool.
    pub(crate) fn open(
        name: String,
        source_path: PathBuf,
        opener: Arc<dyn ArchiveOpener>,
        scenes: Arc<SceneEventHub>,
        runtime: &Handle,
    ) -> Arc<Self> {
        let (done_tx, done) = flume::bounded::<()>(0);
        let outcome = Arc::new(OnceLock::new());

        let container = Arc::new(Self {
            name,
            source_path,
            outcome: outcome.clone(),
            done,
            lifecycle: Mutex::new(Lifecycle::default()),
            pending_extractions: AtomicUsize::new(0),
            scenes,
            runtime: runtime.clone(),
            probe: WeakProbe,
        });

        let name = container.name.clone();
        let path = container.source_path.clone();
        runtime.spawn_blocking(move || {
            let result = opener
                .open(&path)
                .map(inspect_archive)
                .map_err(|e| format!("{e:#}"));
            match &result {
                Ok(opened) => log::debug!("BundleContainer: opened '{name}' ({:?})", opened.kind),
                Err(reason) => log::error!("BundleContainer: failed to open '{name}': {reason}"),
            }
            let _ = outcome.set(result);
            drop(done_tx);
        });

        container
    }

    /// The bundle name this container is cached under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The file the bundle was opened from.
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ContainerState {
        if self.lock().disposed {
            return ContainerState::Disposed;
        }
        match self.outcome.get() {
            Some(Ok(_)) => ContainerState::Loaded,
            Some(Err(_)) => ContainerState::Failed,
            None if self.done.is_disconnected() => ContainerState::Failed,
            None => ContainerState::Loading,
        }
    }

    /// What the bundle serves, once it is loaded.
    pub fn kind(&self) -> Option<ContainerKind> {
        match self.outcome.get() {
            Some(Ok(opened)) => Some(opened.kind),
            _ => None,
        }
    }

    /// Waits for the open to finish and returns the resulting state.
    pub async fn wait_loaded(&self) -> ContainerState {
        if !self.is_load_finished() {
            // Nothing is ever sent: the channel only disconnects.
            let _ = self.done.recv_async().await;
        }
        self.observe_load();
        self.state()
    }

    /// Returns `true` while the bundle must stay resident.
    ///
    /// A loading bundle is always in use, since nothing has had a chance
    /// to reference its contents yet. A scene bundle is in use until its
    /// scene is reported unloaded. An asset bundle is in use while any value
    /// extracted from it is still referenced, or an extraction is in flight.
    pub fn is_used(&self) -> bool {
        if !self.is_load_finished() || self.pending_extractions.load(Ordering::Acquire) > 0 {
            return true;
        }
        self.observe_load();

        let mut lifecycle = self.lock();
        if lifecycle.disposed {
            return false;
        }
        match self.outcome.get() {
            Some(Ok(opened)) => match opened.kind {
                ContainerKind::Scene => lifecycle
                    .scene
                    .as_ref()
                    .is_some_and(|scene| !scene.subscription.has_been_unloaded()),
                ContainerKind::Assets => {
                    let probe = self.probe;
                    lifecycle
                        .live_references
                        .retain(|tracked| is_alive(&probe, &tracked.handle));
                    !lifecycle.live_references.is_empty()
                }
            },
            _ => false,
        }
    }

    /// Number of extracted values that are still referenced.
    pub fn live_reference_count(&self) -> usize {
        let probe = self.probe;
        self.lock()
            .live_references
            .iter()
            .filter(|tracked| is_alive(&probe, &tracked.handle))
            .count()
    }

    /// Runs the bookkeeping due once the open has completed: a scene bundle
    /// subscribes to the unload notification of its scene.
    pub(crate) fn observe_load(&self) {
        let Some(Ok(opened)) = self.outcome.get() else {
            return;
        };
        let mut lifecycle = self.lock();
        if lifecycle.observed || lifecycle.disposed {
            return;
        }
        lifecycle.observed = true;

        if let Some(path) = &opened.scene_path {
            lifecycle.scene = Some(SceneTracking {
                path: path.clone(),
                subscription: self.scenes.subscribe(path.clone()),
            });
        }
    }

    /// Extracts `asset` as a `T`.
    ///
    /// While a previous extraction of the same asset is still referenced,
    /// the same shared instance is returned.
    pub(crate) async fn extract_asset<T: Asset>(&self, asset: &str) -> Result<AssetHandle<T>> {
        let _pending = PendingExtraction::begin(&self.pending_extractions);
        let opened = self.loaded_archive().await?;
        self.expect_kind(opened, ContainerKind::Assets)?;

        if let Some(handle) = self.find_live::<T>(asset) {
            return Ok(handle);
        }

        let asset_type = AssetType::of::<T>();
        let archive = opened.archive.clone();
        let name = asset.to_owned();
        let extracted = self
            .runtime
            .spawn_blocking(move || archive.load_asset(&name, asset_type))
            .await
            .map_err(|e| self.extraction_error(e))?
            .map_err(|e| self.extraction_error(format!("{e:#}")))?;

        let Some(value) = extracted else {
            return Err(BundleError::AssetMissing {
                bundle: self.name.clone(),
                asset: asset.to_owned(),
                type_name: asset_type.name(),
            });
        };
        let value = value.downcast::<T>().map_err(|_| {
            self.extraction_error(format!("archive returned another type than {asset_type:?}"))
        })?;
        self.track(asset, *value)
    }

    /// Extracts every asset of type `T`.
    pub(crate) async fn extract_all_assets<T: Asset>(&self) -> Result<Vec<AssetHandle<T>>> {
        let _pending = PendingExtraction::begin(&self.pending_extractions);
        let opened = self.loaded_archive().await?;
        self.expect_kind(opened, ContainerKind::Assets)?;

        let asset_type = AssetType::of::<T>();
        let archive = opened.archive.clone();
        let extracted = self
            .runtime
            .spawn_blocking(move || archive.load_all_assets(asset_type))
            .await
            .map_err(|e| self.extraction_error(e))?
            .map_err(|e| self.extraction_error(format!("{e:#}")))?;

        let mut handles = Vec::with_capacity(extracted.len());
        for (name, value) in extracted {
            match value.downcast::<T>() {
                Ok(value) => handles.push(self.track(&name, *value)?),
                Err(_) => log::warn!(
                    "BundleContainer: '{}' returned '{name}' not as {asset_type:?}",
                    self.name
                ),
            }
        }
        Ok(handles)
    }

    /// Returns the path of the bundle's scene and marks it as in use again.
    pub(crate) async fn extract_scene_path(&self) -> Result<String> {
        let opened = self.loaded_archive().await?;
        self.expect_kind(opened, ContainerKind::Scene)?;

        // An unload reported before this extraction must not outlive it.
        self.scenes.dispatch_pending();

        let lifecycle = self.lock();
        if lifecycle.disposed {
            return Err(self.disposed_error());
        }
        match &lifecycle.scene {
            Some(scene) => {
                scene.subscription.reset();
                Ok(scene.path.clone())
            }
            None => Err(self.extraction_error("scene bundle contains no scene")),
        }
    }

    /// Releases the archive and everything it produced.
    ///
    /// Must only be called once loading has finished. If it has not, the
    /// violation is logged and the calling thread blocks until it has.
    pub(crate) fn dispose(&self) {
        if !self.is_load_finished() {
            BundleError::LifecycleViolation {
                bundle: self.name.clone(),
            }
            .report();
            let _ = self.done.recv();
        }

        let mut lifecycle = self.lock();
        if lifecycle.disposed {
            return;
        }
        lifecycle.disposed = true;
        if let Some(scene) = lifecycle.scene.take() {
            self.scenes.unsubscribe(&scene.subscription);
        }
        let released = lifecycle.live_references.len();
        lifecycle.live_references.clear();
        drop(lifecycle);

        if let Some(Ok(opened)) = self.outcome.get() {
            opened.archive.unload(true);
        }
        log::debug!(
            "BundleContainer: disposed '{}' from '{}' ({released} tracked objects)",
            self.name,
            self.source_path.display()
        );
    }

    fn is_load_finished(&self) -> bool {
        self.outcome.get().is_some() || self.done.is_disconnected()
    }

    async fn loaded_archive(&self) -> Result<&OpenedArchive> {
        self.wait_loaded().await;
        if self.lock().disposed {
            return Err(self.disposed_error());
        }
        match self.outcome.get() {
            Some(Ok(opened)) => Ok(opened),
            Some(Err(reason)) => Err(BundleError::OpenFailed {
                bundle: self.name.clone(),
                reason: reason.clone(),
            }),
            None => Err(BundleError::OpenFailed {
                bundle: self.name.clone(),
                reason: "load task ended without a result".to_string(),
            }),
        }
    }

    fn expect_kind(&self, opened: &OpenedArchive, kind: ContainerKind) -> Result<()> {
        if opened.kind == kind {
            return Ok(());
        }
        Err(BundleError::TypeMismatch {
            bundle: self.name.clone(),
            expected: match kind {
                ContainerKind::Assets => "an asset",
                ContainerKind::Scene => "a scene",
            },
        })
    }

    fn find_live<T: Asset>(&self, asset_name: &str) -> Option<AssetHandle<T>> {
        find_live(&self.lock(), asset_name)
    }

    fn track<T: Asset>(&self, asset_name: &str, value: T) -> Result<AssetHandle<T>> {
        let mut lifecycle = self.lock();
        if lifecycle.disposed {
            return Err(self.disposed_error());
        }
        // A concurrent extraction of the same asset may have finished first.
        if let Some(existing) = find_live(&lifecycle, asset_name) {
            return Ok(existing);
        }

        let handle = AssetHandle::new(value);
        let shared: SharedAsset = handle.as_arc().clone();
        lifecycle.live_references.push(TrackedAsset {
            name: asset_name.to_owned(),
            asset_type: AssetType::of::<T>(),
            handle: <WeakProbe as ReachabilityProbe<dyn Any + Send + Sync>>::track(
                &self.probe,
                &shared,
            ),
        });
        Ok(handle)
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        lock(&self.lifecycle)
    }

    fn extraction_error(&self, reason: impl fmt::Display) -> BundleError {
        BundleError::Extraction {
            bundle: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    fn disposed_error(&self) -> BundleError {
        BundleError::Disposed {
            bundle: self.name.clone(),
        }
    }
}

impl fmt::Debug for BundleContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleContainer")
            .field("name", &self.name)
            .field("source_path", &self.source_path)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn inspect_archive(archive: Arc<dyn BundleArchive>) -> OpenedArchive {
    if !archive.is_scene_bundle() {
        return OpenedArchive {
            archive,
            kind: ContainerKind::Assets,
            scene_path: None,
        };
    }

    let mut paths = archive.scene_paths().into_iter();
    let scene_path = paths.next();
    if paths.next().is_some() {
        log::warn!("BundleContainer: scene bundle holds several scenes, serving the first one");
    }
    OpenedArchive {
        archive,
        kind: ContainerKind::Scene,
        scene_path,
    }
}

fn is_alive(probe: &WeakProbe, handle: &Weak<dyn Any + Send + Sync>) -> bool {
    <WeakProbe as ReachabilityProbe<dyn Any + Send + Sync>>::is_alive(probe, handle)
}

fn find_live<T: Asset>(lifecycle: &Lifecycle, asset_name: &str) -> Option<AssetHandle<T>> {
    lifecycle
        .live_references
        .iter()
        .filter(|tracked| tracked.name == asset_name && tracked.asset_type.is::<T>())
        .find_map(|tracked| tracked.handle.upgrade())
        .and_then(|shared| shared.downcast::<T>().ok())
        .map(AssetHandle::from_arc)
}
