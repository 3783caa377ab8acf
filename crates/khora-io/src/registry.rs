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

//! The ordered list of content roots and the two bundle search policies.
//!
//! [`resolve_override`](DirectoryRegistry::resolve_override) answers "which
//! single bundle wins when names collide": the highest-priority directory
//! replaces same-named bundles below it. [`resolve_union`](DirectoryRegistry::resolve_union)
//! answers "which bundles contribute to this folder": every directory adds
//! its own bundles next to the shipped ones.

use crate::error::{BundleError, Result};
use std::{
    cmp::Reverse,
    collections::HashSet,
    fs,
    path::{Component, Path, PathBuf},
};
use walkdir::WalkDir;

/// A registered content root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    path: PathBuf,
    priority: i32,
}

impl DirectoryEntry {
    /// Absolute, canonical path of the directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Priority of the directory. Higher wins.
    pub fn priority(&self) -> i32 {
        self.priority
    }
}

/// A bundle file found by union collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleFile {
    /// Bundle name, relative to its content root with `/` separators.
    pub name: String,
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Priority of the directory the file was found in.
    pub priority: i32,
}

/// Content roots sorted by descending priority.
///
/// Entries with equal priority keep their registration order.
#[derive(Debug, Default)]
pub struct DirectoryRegistry {
    entries: Vec<DirectoryEntry>,
}

impl DirectoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `path` as a content root, creating it if needed.
    ///
    /// Returns `Ok(false)` without changing anything if the directory is
    /// already registered, whatever its priority.
    pub fn register(&mut self, path: impl AsRef<Path>, priority: i32) -> Result<bool> {
        let path = path.as_ref();
        let configuration_error = |e: std::io::Error| BundleError::Configuration {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        fs::create_dir_all(path).map_err(configuration_error)?;
        let absolute = fs::canonicalize(path).map_err(configuration_error)?;

        if self.entries.iter().any(|entry| entry.path == absolute) {
            log::debug!(
                "DirectoryRegistry: '{}' is already registered",
                absolute.display()
            );
            return Ok(false);
        }

        log::info!(
            "DirectoryRegistry: registered '{}' (priority {priority})",
            absolute.display()
        );
        self.entries.push(DirectoryEntry {
            path: absolute,
            priority,
        });
        self.entries.sort_by_key(|entry| Reverse(entry.priority));
        Ok(true)
    }

    /// Registered roots, highest priority first.
    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    /// Number of registered roots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no root is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds the bundle called `name` in the highest-priority root that has it.
    pub fn resolve_override(&self, name: &str) -> Option<PathBuf> {
        let relative = relative_name(name)?;
        self.entries
            .iter()
            .map(|entry| entry.path.join(relative))
            .find(|candidate| is_bundle_file(candidate))
    }

    /// Collects the bundles stored in `folder` across every root.
    ///
    /// A bundle name present in several roots is reported once, from the
    /// highest-priority root, since the cache keys containers by name.
    pub fn resolve_union(&self, folder: &str) -> Vec<BundleFile> {
        let folder = folder.trim_matches('/');
        let relative = if folder.is_empty() {
            Some(Path::new(""))
        } else {
            relative_name(folder)
        };
        let Some(relative) = relative else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut files = Vec::new();
        for entry in &self.entries {
            let dir = entry.path.join(relative);
            if !dir.is_dir() {
                continue;
            }

            let walker = WalkDir::new(&dir)
                .min_depth(1)
                .max_depth(1)
                .follow_links(true)
                .sort_by_file_name();
            for item in walker {
                let item = match item {
                    Ok(item) => item,
                    Err(e) => {
                        log::warn!("DirectoryRegistry: skipping '{}': {e}", dir.display());
                        continue;
                    }
                };
                if !item.file_type().is_file() || item.path().extension().is_some() {
                    continue;
                }
                let Some(file_name) = item.file_name().to_str() else {
                    log::warn!(
                        "DirectoryRegistry: skipping non UTF-8 bundle name '{}'",
                        item.path().display()
                    );
                    continue;
                };

                let name = if folder.is_empty() {
                    file_name.to_string()
                } else {
                    format!("{folder}/{file_name}")
                };
                if seen.insert(name.clone()) {
                    files.push(BundleFile {
                        name,
                        path: item.into_path(),
                        priority: entry.priority,
                    });
                }
            }
        }
        files
    }
}

/// Accepts only plain relative names, so a bundle name can never escape its root.
fn relative_name(name: &str) -> Option<&Path> {
    let path = Path::new(name);
    let mut components = path.components().peekable();
    components.peek()?;
    components
        .all(|component| matches!(component, Component::Normal(_)))
        .then_some(path)
}

/// Bundle files are regular files without an extension.
fn is_bundle_file(path: &Path) -> bool {
    path.is_file() && path.extension().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().expect("file has a parent")).expect("mkdir");
        fs::write(path, b"bundle").expect("write bundle");
    }

    #[test]
    fn test_register_is_idempotent() {
        let dir = tempdir().expect("tempdir");
        let mut registry = DirectoryRegistry::new();

        assert!(registry.register(dir.path(), 0).unwrap());
        assert!(!registry.register(dir.path(), 50).unwrap());
        assert!(!registry.register(dir.path().join("."), 0).unwrap());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.entries()[0].priority(), 0);
    }

    #[test]
    fn test_register_creates_missing_directory() {
        let dir = tempdir().expect("tempdir");
        let content = dir.path().join("content/base");

        let mut registry = DirectoryRegistry::new();
        assert!(registry.register(&content, 0).unwrap());
        assert!(content.is_dir());
    }

    #[test]
    fn test_register_reports_io_failure() {
        let dir = tempdir().expect("tempdir");
        touch(dir.path(), "not_a_dir");

        let mut registry = DirectoryRegistry::new();
        let err = registry
            .register(dir.path().join("not_a_dir/content"), 0)
            .unwrap_err();
        assert!(matches!(err, BundleError::Configuration { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_entries_sorted_by_descending_priority() {
        let dir = tempdir().expect("tempdir");
        let mut registry = DirectoryRegistry::new();
        registry.register(dir.path().join("low"), 0).unwrap();
        registry.register(dir.path().join("high"), 100).unwrap();
        registry.register(dir.path().join("mid_a"), 10).unwrap();
        registry.register(dir.path().join("mid_b"), 10).unwrap();

        let order: Vec<_> = registry
            .entries()
            .iter()
            .map(|entry| entry.path().file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(order, ["high", "mid_a", "mid_b", "low"]);
    }

    #[test]
    fn test_override_prefers_highest_priority() {
        let dir = tempdir().expect("tempdir");
        let base = dir.path().join("base");
        let mods = dir.path().join("mods");
        touch(&base, "x");
        touch(&mods, "x");
        touch(&base, "only_base");

        let mut registry = DirectoryRegistry::new();
        registry.register(&base, 0).unwrap();
        registry.register(&mods, 100).unwrap();

        let resolved = registry.resolve_override("x").expect("x should resolve");
        assert!(resolved.starts_with(fs::canonicalize(&mods).unwrap()));

        let resolved = registry.resolve_override("only_base").expect("fallback to base");
        assert!(resolved.starts_with(fs::canonicalize(&base).unwrap()));

        assert!(registry.resolve_override("missing").is_none());
    }

    #[test]
    fn test_override_ignores_files_with_extension_and_escapes() {
        let dir = tempdir().expect("tempdir");
        let base = dir.path().join("base");
        touch(&base, "x.manifest");
        touch(dir.path(), "outside");

        let mut registry = DirectoryRegistry::new();
        registry.register(&base, 0).unwrap();

        assert!(registry.resolve_override("x.manifest").is_none());
        assert!(registry.resolve_override("../outside").is_none());
        let absolute = dir.path().join("outside");
        assert!(registry.resolve_override(absolute.to_str().unwrap()).is_none());
        assert!(registry.resolve_override("").is_none());
    }

    #[test]
    fn test_union_collects_from_every_directory() {
        let dir = tempdir().expect("tempdir");
        let base = dir.path().join("base");
        let mods = dir.path().join("mods");
        touch(&base, "f/one");
        touch(&base, "f/shared");
        touch(&base, "f/one.manifest");
        touch(&mods, "f/two");
        touch(&mods, "f/shared");
        touch(&mods, "f/nested/deep");

        let mut registry = DirectoryRegistry::new();
        registry.register(&base, 0).unwrap();
        registry.register(&mods, 100).unwrap();

        let files = registry.resolve_union("f/");
        let names: Vec<_> = files.iter().map(|file| file.name.as_str()).collect();
        assert_eq!(names, ["f/shared", "f/two", "f/one"]);

        let shared = &files[0];
        assert_eq!(shared.priority, 100);
        assert!(shared.path.starts_with(fs::canonicalize(&mods).unwrap()));
    }

    #[test]
    fn test_union_of_missing_folder_is_empty() {
        let dir = tempdir().expect("tempdir");
        let mut registry = DirectoryRegistry::new();
        registry.register(dir.path(), 0).unwrap();

        assert!(registry.resolve_union("nothing_here").is_empty());
        assert!(registry.resolve_union("../escape").is_empty());
    }
}
