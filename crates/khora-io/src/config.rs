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

//! Configuration of the bundle service.

use crate::error::{BundleError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_AUTO_UNLOAD_PERIOD_SECS: f32 = 30.0;
/// Lower bound for the sweep period, in seconds.
pub(crate) const MIN_AUTO_UNLOAD_PERIOD_SECS: f32 = 0.01;

/// A content root declared in the configuration file.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct DirectoryConfig {
    /// Directory holding bundles. Relative paths are resolved against the
    /// working directory.
    pub path: PathBuf,
    /// Higher priorities override lower ones when bundle names collide.
    #[serde(default)]
    pub priority: i32,
}

/// Represents the structure of a `Bundles.ron` configuration file.
///
/// ```ron
/// (
///     auto_unload_enabled: true,
///     auto_unload_period_secs: 10.0,
///     directories: [
///         (path: "content", priority: 0),
///         (path: "mods", priority: 100),
///     ],
/// )
/// ```
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BundleCacheConfig {
    /// Whether unused bundles are swept periodically.
    pub auto_unload_enabled: bool,
    /// Delay between two automatic sweeps, in seconds.
    pub auto_unload_period_secs: f32,
    /// Content roots to register at startup, in order.
    pub directories: Vec<DirectoryConfig>,
}

impl Default for BundleCacheConfig {
    fn default() -> Self {
        Self {
            auto_unload_enabled: true,
            auto_unload_period_secs: DEFAULT_AUTO_UNLOAD_PERIOD_SECS,
            directories: Vec::new(),
        }
    }
}

impl BundleCacheConfig {
    /// Parses a configuration from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| BundleError::Configuration {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ron_str(&text)
    }

    /// Rejects settings the service cannot honor.
    pub fn validate(&self) -> Result<()> {
        validate_period(self.auto_unload_period_secs)
    }
}

pub(crate) fn validate_period(secs: f32) -> Result<()> {
    if secs.is_finite() && secs >= MIN_AUTO_UNLOAD_PERIOD_SECS {
        Ok(())
    } else {
        Err(BundleError::Configuration {
            path: PathBuf::new(),
            reason: format!(
                "auto unload period must be at least {MIN_AUTO_UNLOAD_PERIOD_SECS}s, got {secs}"
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_to_missing_fields() {
        let config = BundleCacheConfig::from_ron_str("(directories: [(path: \"content\")])")
            .expect("config should parse");

        assert!(config.auto_unload_enabled);
        assert_eq!(config.auto_unload_period_secs, DEFAULT_AUTO_UNLOAD_PERIOD_SECS);
        assert_eq!(
            config.directories,
            vec![DirectoryConfig {
                path: PathBuf::from("content"),
                priority: 0,
            }]
        );
    }

    #[test]
    fn test_full_config() {
        let text = r#"(
            auto_unload_enabled: false,
            auto_unload_period_secs: 2.5,
            directories: [
                (path: "content", priority: 0),
                (path: "mods", priority: 100),
            ],
        )"#;
        let config = BundleCacheConfig::from_ron_str(text).expect("config should parse");

        assert!(!config.auto_unload_enabled);
        assert_eq!(config.auto_unload_period_secs, 2.5);
        assert_eq!(config.directories[1].priority, 100);
    }

    #[test]
    fn test_rejects_non_positive_period() {
        let err = BundleCacheConfig::from_ron_str("(auto_unload_period_secs: 0.0)").unwrap_err();
        assert!(matches!(err, BundleError::Configuration { .. }));
    }

    #[test]
    fn test_rejects_period_too_short_to_schedule() {
        assert!(validate_period(1e-12).is_err());
        assert!(validate_period(MIN_AUTO_UNLOAD_PERIOD_SECS / 2.0).is_err());
        assert!(validate_period(MIN_AUTO_UNLOAD_PERIOD_SECS).is_ok());
    }

    #[test]
    fn test_rejects_malformed_text() {
        let err = BundleCacheConfig::from_ron_str("(directories: [").unwrap_err();
        assert!(matches!(err, BundleError::ConfigParse(_)));
    }

    #[test]
    fn test_load_missing_file_is_configuration_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = BundleCacheConfig::load(dir.path().join("Bundles.ron")).unwrap_err();
        assert!(matches!(err, BundleError::Configuration { .. }));
    }
}
