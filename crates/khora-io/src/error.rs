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

//! Error taxonomy of the bundle subsystem.

use std::path::PathBuf;
use thiserror::Error;

/// Every way a bundle operation can fail.
///
/// These never escape the public [`BundleService`](crate::BundleService)
/// surface: each one is [reported](BundleError::report) and turned into the
/// operation's failure sentinel.
#[derive(Debug, Error)]
pub enum BundleError {
    /// A content directory could not be prepared or the configuration is invalid.
    #[error("configuration error for '{}': {reason}", .path.display())]
    Configuration {
        /// The offending path (empty for non-path settings).
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The configuration file is not valid RON.
    #[error("failed to parse bundle configuration: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),

    /// No registered directory holds a bundle with this name.
    #[error("no bundle named '{name}' in any registered directory")]
    ResolutionMiss {
        /// The requested bundle name.
        name: String,
    },

    /// The bundle exists but has no asset with this name and type.
    #[error("bundle '{bundle}' has no asset '{asset}' of type {type_name}")]
    AssetMissing {
        /// The bundle searched.
        bundle: String,
        /// The requested asset name.
        asset: String,
        /// The requested asset type.
        type_name: &'static str,
    },

    /// Asset extraction from a scene bundle, or scene extraction from an asset bundle.
    #[error("bundle '{bundle}' is not {expected} bundle")]
    TypeMismatch {
        /// The bundle involved.
        bundle: String,
        /// The kind of bundle the operation needs ("an asset" or "a scene").
        expected: &'static str,
    },

    /// Disposal was requested while the bundle was still loading.
    #[error("bundle '{bundle}' disposed before its load completed")]
    LifecycleViolation {
        /// The bundle involved.
        bundle: String,
    },

    /// The archive could not be opened.
    #[error("failed to open bundle '{bundle}': {reason}")]
    OpenFailed {
        /// The bundle involved.
        bundle: String,
        /// The opener's error message.
        reason: String,
    },

    /// The archive failed while extracting.
    #[error("extraction from bundle '{bundle}' failed: {reason}")]
    Extraction {
        /// The bundle involved.
        bundle: String,
        /// The archive's error message.
        reason: String,
    },

    /// The container has already been disposed.
    #[error("bundle '{bundle}' has been disposed")]
    Disposed {
        /// The bundle involved.
        bundle: String,
    },

    /// The call did not come from the thread that owns the service.
    #[error("bundle service called from a foreign thread")]
    OffThread,
}

impl BundleError {
    /// Logs the error at the level its category calls for.
    ///
    /// Off-thread calls are a documented programmer error and stay silent.
    pub fn report(&self) {
        match self {
            BundleError::ResolutionMiss { .. } | BundleError::AssetMissing { .. } => {
                log::warn!("BundleService: {self}")
            }
            BundleError::Disposed { .. } => log::debug!("BundleService: {self}"),
            BundleError::OffThread => {}
            _ => log::error!("BundleService: {self}"),
        }
    }
}

/// A specialized `Result` for bundle operations.
pub type Result<T, E = BundleError> = std::result::Result<T, E>;
