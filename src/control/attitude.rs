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

//! Device attitude sampling for slots 3 (roll) and 4 (pitch).

use parking_lot::Mutex;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{error::TrySendError, WeakSender};
use tracing::{debug, info, warn};

use super::periodic::PeriodicTask;
use crate::controller::ControlMessage;

/// Roll and pitch in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Attitude {
    pub roll: f32,
    pub pitch: f32,
}

/// Trait for orientation sources.
pub trait AttitudeSource: Send + Sync {
    /// Whether the device has a motion sensor at all.
    fn is_available(&self) -> bool;

    /// Current attitude, `None` if no sample is ready.
    fn sample_attitude(&self) -> Option<Attitude>;
}

/// Source for hosts without a motion sensor.
pub struct NoAttitude;

impl AttitudeSource for NoAttitude {
    fn is_available(&self) -> bool {
        false
    }

    fn sample_attitude(&self) -> Option<Attitude> {
        None
    }
}

/// Attitude set from the outside (scripted sessions, external IMU bridges).
#[derive(Debug, Clone, Default)]
pub struct SharedAttitude {
    inner: Arc<Mutex<Attitude>>,
}

impl SharedAttitude {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, roll: f32, pitch: f32) {
        *self.inner.lock() = Attitude { roll, pitch };
    }
}

impl AttitudeSource for SharedAttitude {
    fn is_available(&self) -> bool {
        true
    }

    fn sample_attitude(&self) -> Option<Attitude> {
        Some(*self.inner.lock())
    }
}

/// Polls an `AttitudeSource` and forwards samples to the controller inbox.
pub struct AttitudeSampler {
    source: Arc<dyn AttitudeSource>,
    task: PeriodicTask,
}

impl AttitudeSampler {
    pub fn new(source: Arc<dyn AttitudeSource>, period: Duration) -> Self {
        Self {
            source,
            task: PeriodicTask::new("attitude", period),
        }
    }

    /// Start sampling. Returns false if the source has no sensor.
    pub fn enable(&mut self, inbox: WeakSender<ControlMessage>) -> bool {
        if !self.source.is_available() {
            warn!("IMU unsupported on this device, attitude stays zero");
            return false;
        }
        if self.task.is_running() {
            return true;
        }

        let source = self.source.clone();
        self.task.start(move |generation| {
            let Some(tx) = inbox.upgrade() else {
                return ControlFlow::Break(());
            };
            let Some(attitude) = source.sample_attitude() else {
                return ControlFlow::Continue(());
            };

            match tx.try_send(ControlMessage::Attitude {
                generation,
                attitude,
            }) {
                Ok(()) => ControlFlow::Continue(()),
                Err(TrySendError::Full(_)) => {
                    debug!("Controller inbox full, dropping attitude sample");
                    ControlFlow::Continue(())
                }
                Err(TrySendError::Closed(_)) => ControlFlow::Break(()),
            }
        });
        info!("Attitude sampling enabled");
        true
    }

    pub fn disable(&mut self) -> bool {
        let was_running = self.task.stop();
        if was_running {
            info!("Attitude sampling disabled");
        }
        was_running
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    pub fn active_generation(&self) -> Option<u64> {
        self.task.active_generation()
    }

    /// Whether a sample produced under `generation` may still be applied.
    pub fn accepts(&self, generation: u64) -> bool {
        self.task.is_current(generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_sampler_forwards_samples() {
        let source = SharedAttitude::new();
        source.set(0.1, -0.2);

        let (tx, mut rx) = mpsc::channel(8);
        let mut sampler = AttitudeSampler::new(Arc::new(source), Duration::from_millis(100));
        assert!(sampler.enable(tx.downgrade()));

        tokio::time::sleep(Duration::from_millis(150)).await;
        match rx.try_recv() {
            Ok(ControlMessage::Attitude { generation, attitude }) => {
                assert!(sampler.accepts(generation));
                assert_eq!(attitude, Attitude { roll: 0.1, pitch: -0.2 });
            }
            other => panic!("unexpected message: {:?}", other.map(|_| ())),
        }

        assert!(sampler.disable());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unavailable_source_never_starts() {
        let (tx, _rx) = mpsc::channel(8);
        let mut sampler = AttitudeSampler::new(Arc::new(NoAttitude), Duration::from_millis(100));

        assert!(!sampler.enable(tx.downgrade()));
        assert!(!sampler.is_running());
        assert!(!sampler.disable());
    }
}
