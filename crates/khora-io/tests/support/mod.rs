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

//! Shared fixtures: a tiny text bundle format, an opener that can be held
//! back, and temporary content directories.

#![allow(dead_code)]

use anyhow::{bail, Context, Result};
use khora_core::asset::Asset;
use khora_core::bundle::{ArchiveOpener, AssetType, BundleArchive, ExtractedAsset};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tempfile::TempDir;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestTexture {
    pub id: u32,
    pub origin: PathBuf,
}
impl Asset for TestTexture {}

#[derive(Debug, Clone, PartialEq)]
pub struct TestSound {
    pub id: u32,
}
impl Asset for TestSound {}

/// Bundle contents, one entry per line:
/// `scene <path>`, `texture <name> <id>` or `sound <name> <id>`.
pub struct TestArchive {
    origin: PathBuf,
    scene: Option<String>,
    textures: Vec<(String, u32)>,
    sounds: Vec<(String, u32)>,
    unloads: Arc<AtomicUsize>,
    extraction_gate: Option<flume::Receiver<()>>,
}

impl TestArchive {
    fn parse(origin: &Path, text: &str, opener: &TestOpener) -> Result<Self> {
        let mut archive = Self {
            origin: origin.to_path_buf(),
            scene: None,
            textures: Vec::new(),
            sounds: Vec::new(),
            unloads: opener.unloads.clone(),
            extraction_gate: opener.extraction_gate.clone(),
        };
        for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
            let fields: Vec<_> = line.split_whitespace().collect();
            match fields.as_slice() {
                ["scene", path] => archive.scene = Some(path.to_string()),
                ["texture", name, id] => archive
                    .textures
                    .push((name.to_string(), id.parse().context("texture id")?)),
                ["sound", name, id] => archive
                    .sounds
                    .push((name.to_string(), id.parse().context("sound id")?)),
                _ => bail!("unrecognized bundle line '{line}'"),
            }
        }
        Ok(archive)
    }

    fn extract(&self, id: u32, asset_type: AssetType) -> Option<ExtractedAsset> {
        if asset_type.is::<TestTexture>() {
            Some(Box::new(TestTexture {
                id,
                origin: self.origin.clone(),
            }))
        } else if asset_type.is::<TestSound>() {
            Some(Box::new(TestSound { id }))
        } else {
            None
        }
    }

    fn entries(&self, asset_type: AssetType) -> &[(String, u32)] {
        if asset_type.is::<TestTexture>() {
            &self.textures
        } else if asset_type.is::<TestSound>() {
            &self.sounds
        } else {
            &[]
        }
    }
}

impl BundleArchive for TestArchive {
    fn is_scene_bundle(&self) -> bool {
        self.scene.is_some()
    }

    fn scene_paths(&self) -> Vec<String> {
        self.scene.iter().cloned().collect()
    }

    fn load_asset(&self, name: &str, asset_type: AssetType) -> Result<Option<ExtractedAsset>> {
        if let Some(gate) = &self.extraction_gate {
            let _ = gate.recv();
        }
        Ok(self
            .entries(asset_type)
            .iter()
            .find(|(entry, _)| entry == name)
            .and_then(|(_, id)| self.extract(*id, asset_type)))
    }

    fn load_all_assets(&self, asset_type: AssetType) -> Result<Vec<(String, ExtractedAsset)>> {
        Ok(self
            .entries(asset_type)
            .iter()
            .filter_map(|(entry, id)| {
                self.extract(*id, asset_type)
                    .map(|asset| (entry.clone(), asset))
            })
            .collect())
    }

    fn unload(&self, _destroy_contained_objects: bool) {
        self.unloads.fetch_add(1, Ordering::SeqCst);
    }
}

/// Opens [`TestArchive`]s and counts what happens to them.
#[derive(Clone, Default)]
pub struct TestOpener {
    opens: Arc<AtomicUsize>,
    unloads: Arc<AtomicUsize>,
    gate: Option<flume::Receiver<()>>,
    extraction_gate: Option<flume::Receiver<()>>,
}

impl TestOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every open blocks until the sender paired with `gate` is dropped.
    pub fn gated(gate: flume::Receiver<()>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    /// Every single-asset extraction blocks until the sender paired with
    /// `gate` is dropped.
    pub fn with_extraction_gate(self, gate: flume::Receiver<()>) -> Self {
        Self {
            extraction_gate: Some(gate),
            ..self
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn unloads(&self) -> usize {
        self.unloads.load(Ordering::SeqCst)
    }
}

impl ArchiveOpener for TestOpener {
    fn open(&self, path: &Path) -> Result<Arc<dyn BundleArchive>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading bundle '{}'", path.display()))?;
        Ok(Arc::new(TestArchive::parse(path, &text, self)?))
    }
}

/// A temporary tree of content directories.
pub struct ContentFixture {
    root: TempDir,
}

impl ContentFixture {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    pub fn dir(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    /// Writes the bundle `bundle` (a relative name) into the directory `dir`.
    pub fn write_bundle(&self, dir: &str, bundle: &str, contents: &str) -> PathBuf {
        let path = self.dir(dir).join(bundle);
        fs::create_dir_all(path.parent().expect("bundle has a parent"))
            .expect("Failed to create bundle directory");
        fs::write(&path, contents).expect("Failed to write bundle");
        path
    }
}
