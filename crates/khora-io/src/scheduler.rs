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

//! The periodic sweep of unused bundles.
//!
//! The scheduler is a cancellable repeating timer. Its settings live in a
//! `watch` channel, so changing them wakes a running loop right away:
//! disabling parks it, and re-enabling restarts the delay from zero.

use crate::config::validate_period;
use crate::error::Result;
use std::time::Duration;
use tokio::sync::watch;

/// Current settings of the automatic sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerSettings {
    /// Whether sweeps are scheduled.
    pub enabled: bool,
    /// Delay between two sweeps, in seconds.
    pub period_secs: f32,
    /// Set on shutdown. A stopped scheduler never runs again.
    pub stopped: bool,
}

impl SchedulerSettings {
    fn period(&self) -> Duration {
        Duration::try_from_secs_f32(self.period_secs).unwrap_or(Duration::MAX)
    }
}

/// Drives periodic calls to a sweep function.
#[derive(Debug)]
pub struct AutoUnloadScheduler {
    settings: watch::Sender<SchedulerSettings>,
}

impl AutoUnloadScheduler {
    /// Creates a scheduler. `period_secs` must already be validated.
    pub fn new(enabled: bool, period_secs: f32) -> Self {
        let (settings, _) = watch::channel(SchedulerSettings {
            enabled,
            period_secs,
            stopped: false,
        });
        Self { settings }
    }

    /// A snapshot of the current settings.
    pub fn settings(&self) -> SchedulerSettings {
        *self.settings.borrow()
    }

    /// Whether sweeps are scheduled.
    pub fn is_enabled(&self) -> bool {
        self.settings.borrow().enabled
    }

    /// Delay between two sweeps, in seconds.
    pub fn period_secs(&self) -> f32 {
        self.settings.borrow().period_secs
    }

    /// Turns sweeping on or off.
    ///
    /// Returns `true` if the scheduler went from disabled to enabled, in
    /// which case the caller owes one immediate sweep.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        let mut switched_on = false;
        self.settings.send_if_modified(|settings| {
            if settings.stopped || settings.enabled == enabled {
                return false;
            }
            settings.enabled = enabled;
            switched_on = enabled;
            true
        });
        switched_on
    }

    /// Changes the delay. A running delay restarts with the new value.
    pub fn set_period_secs(&self, period_secs: f32) -> Result<()> {
        validate_period(period_secs)?;
        self.settings.send_if_modified(|settings| {
            if settings.period_secs == period_secs {
                return false;
            }
            settings.period_secs = period_secs;
            true
        });
        Ok(())
    }

    /// Stops the scheduler for good. Any running loop returns.
    pub fn stop(&self) {
        self.settings.send_modify(|settings| {
            settings.enabled = false;
            settings.stopped = true;
        });
    }

    /// Calls `sweep` once per period for as long as the scheduler is enabled.
    ///
    /// While disabled the loop sleeps until re-enabled; it returns once the
    /// scheduler is stopped.
    pub async fn run(&self, mut sweep: impl FnMut()) {
        let mut settings = self.settings.subscribe();
        loop {
            let current = *settings.borrow_and_update();
            if current.stopped {
                return;
            }
            if !current.enabled {
                if settings.changed().await.is_err() {
                    return;
                }
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(current.period()) => sweep(),
                changed = settings.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
    }
}
