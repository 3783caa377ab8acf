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

use super::EventBus;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

/// A scene lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneEvent {
    /// The scene stored at `path` has been unloaded by the scene manager.
    Unloaded {
        /// Path of the scene, as reported by the bundle that contained it.
        path: String,
    },
}

/// A live subscription to the unload notification of one scene path.
///
/// The hub raises the flag when a matching [`SceneEvent::Unloaded`] is
/// dispatched. The owner can lower it again once the scene is back in use.
#[derive(Debug)]
pub struct SceneSubscription {
    id: u64,
    path: String,
    unloaded: Arc<AtomicBool>,
}

impl SceneSubscription {
    /// The scene path this subscription listens to.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns `true` once the scene has been reported unloaded.
    pub fn has_been_unloaded(&self) -> bool {
        self.unloaded.load(Ordering::Acquire)
    }

    /// Marks the scene as in use again.
    pub fn reset(&self) {
        self.unloaded.store(false, Ordering::Release);
    }
}

/// Global source of scene notifications, filterable by scene path.
///
/// Publishers may live on any thread and only need a [`flume::Sender`].
/// Notifications are queued until [`dispatch_pending`](Self::dispatch_pending)
/// is called, so subscribers observe them on the dispatching thread only.
#[derive(Debug, Default)]
pub struct SceneEventHub {
    bus: EventBus<SceneEvent>,
    subscribers: Mutex<HashMap<u64, (String, Arc<AtomicBool>)>>,
    next_id: AtomicU64,
}

impl SceneEventHub {
    /// Creates a hub with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to the unload notification of `path`. The flag starts lowered.
    pub fn subscribe(&self, path: impl Into<String>) -> SceneSubscription {
        let path = path.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let unloaded = Arc::new(AtomicBool::new(false));
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, (path.clone(), unloaded.clone()));
        log::trace!("SceneEventHub: subscription {id} on '{path}'");
        SceneSubscription { id, path, unloaded }
    }

    /// Stops delivering notifications to `subscription`.
    pub fn unsubscribe(&self, subscription: &SceneSubscription) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&subscription.id);
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Queues a notification.
    pub fn publish(&self, event: SceneEvent) {
        self.bus.publish(event);
    }

    /// Returns a sender for publishers on other threads.
    pub fn sender(&self) -> flume::Sender<SceneEvent> {
        self.bus.sender()
    }

    /// Delivers every queued notification to matching subscribers.
    ///
    /// Returns the number of notifications processed.
    pub fn dispatch_pending(&self) -> usize {
        let events = self.bus.drain();
        if events.is_empty() {
            return 0;
        }

        let subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for event in &events {
            match event {
                SceneEvent::Unloaded { path } => {
                    for (_, (subscribed, flag)) in subscribers.iter() {
                        if subscribed == path {
                            flag.store(true, Ordering::Release);
                        }
                    }
                }
            }
        }
        events.len()
    }
}
