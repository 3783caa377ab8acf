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

//! Reachability probing for extracted values.
//!
//! A bundle may only be evicted once nothing outside the cache still refers
//! to what it produced. The probe answers that question without keeping the
//! values alive itself.

use std::sync::{Arc, Weak};

/// Reports whether a previously observed value is still referenced.
pub trait ReachabilityProbe<T: ?Sized> {
    /// A token that remembers the value without owning it.
    type Handle;

    /// Starts observing `value`.
    fn track(&self, value: &Arc<T>) -> Self::Handle;

    /// Returns `true` while at least one strong reference to the value exists.
    fn is_alive(&self, handle: &Self::Handle) -> bool;
}

/// The default probe, backed by [`Weak`] pointers.
///
/// Reachability here is exact: the value is dead as soon as the last `Arc`
/// is dropped, with no reclamation pass to wait for.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeakProbe;

impl<T: ?Sized> ReachabilityProbe<T> for WeakProbe {
    type Handle = Weak<T>;

    fn track(&self, value: &Arc<T>) -> Weak<T> {
        Arc::downgrade(value)
    }

    fn is_alive(&self, handle: &Weak<T>) -> bool {
        handle.strong_count() > 0
    }
}
