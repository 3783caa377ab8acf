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


/// A multi-producer queue whose owner drains it at a time of its choosing.
///
/// Producers hold a [`flume::Sender`] and may live on any thread. Events are
/// only observed when the owner calls [`drain`](Self::drain), which keeps
/// their effects on the owner's thread.
#[derive(Debug)]
pub struct EventBus<T: Send + 'static> {
    sender: flume::Sender<T>,
    receiver: flume::Receiver<T>,
}

impl<T: Send + 'static> EventBus<T> {
    /// Creates a bus backed by an unbounded channel.
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        log::debug!("EventBus<{}> initialized.", std::any::type_name::<T>());
        Self { sender, receiver }
    }

    /// Queues an event from the owner's side.
    pub fn publish(&self, event: T) {
        // The bus holds its own receiver, so this only fails while dropping.
        if self.sender.send(event).is_err() {
            log::warn!("EventBus<{}>: event dropped", std::any::type_name::<T>());
        }
    }

    /// A sender for producers elsewhere.
    pub fn sender(&self) -> flume::Sender<T> {
        self.sender.clone()
    }

    /// Number of queued events.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Takes every event queued so far, oldest first.
    pub fn drain(&self) -> Vec<T> {
        let events: Vec<T> = self.receiver.try_iter().collect();
        if !events.is_empty() {
            log::trace!(
                "EventBus<{}>: drained {} events",
                std::any::type_name::<T>(),
                events.len()
            );
        }
        events
    }
}

impl<T: Send + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}
