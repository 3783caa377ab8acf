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

//! Thread identity checks for single-threaded services.

use std::thread::{self, ThreadId};

/// Remembers the thread a service was created on.
///
/// Services that are only ever mutated from one cooperative thread use this
/// to reject calls coming from anywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadAffinity {
    owner: ThreadId,
}

impl ThreadAffinity {
    /// Binds to the calling thread.
    pub fn current() -> Self {
        Self {
            owner: thread::current().id(),
        }
    }

    /// The designated thread.
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Returns `true` if the calling thread is the designated one.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.owner
    }
}

impl Default for ThreadAffinity {
    fn default() -> Self {
        Self::current()
    }
}
