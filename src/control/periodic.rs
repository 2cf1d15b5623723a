// Copyright 2026 Daniel Pelikan
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

//! Cancellable fixed-interval tasks.
//!
//! Every `start` aborts the previous instance first and bumps a generation
//! counter. Ticks carry the generation they were produced under, so the
//! owner can drop ticks that were queued before a `stop`.

use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

/// A restartable periodic task.
pub struct PeriodicTask {
    name: &'static str,
    period: Duration,
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self {
            name,
            period,
            generation: 0,
            handle: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start ticking every period, replacing any running instance.
    ///
    /// The first tick fires one period after the call. `tick` receives the
    /// generation of this instance; returning `Break` ends the task.
    /// Must be called from within a tokio runtime.
    pub fn start<F>(&mut self, mut tick: F) -> u64
    where
        F: FnMut(u64) -> ControlFlow<()> + Send + 'static,
    {
        self.stop();
        self.generation += 1;

        let generation = self.generation;
        let period = self.period;
        let name = self.name;

        self.handle = Some(tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                if tick(generation).is_break() {
                    debug!("{} task #{} finished", name, generation);
                    break;
                }
            }
        }));

        debug!("{} task #{} started ({:?})", self.name, generation, self.period);
        generation
    }

    /// Abort the running instance, if any. Returns true if one was running.
    pub fn stop(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                debug!("{} task #{} stopped", self.name, self.generation);
                true
            }
            None => false,
        }
    }

    /// Whether an instance is started and has not finished on its own.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Generation of the running instance.
    pub fn active_generation(&self) -> Option<u64> {
        self.handle.as_ref().map(|_| self.generation)
    }

    /// True if `generation` belongs to the instance that is currently started.
    pub fn is_current(&self, generation: u64) -> bool {
        self.active_generation() == Some(generation)
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}
