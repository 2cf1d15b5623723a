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

//! Periodic command-vector notifications.

use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::mpsc::{error::TrySendError, WeakSender};
use tracing::{debug, info, warn};

use super::protocol::encode_command;
use super::transport::{PeripheralTransport, TransportError};
use crate::control::{CommandState, PeriodicTask};
use crate::controller::ControlMessage;

/// Result of one notifier tick.
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyOutcome {
    /// Frame accepted by the transport.
    Sent { mode_update: bool },
    /// Frame rejected; the next tick sends the then-current vector.
    Deferred(TransportError),
}

/// Drives notifications while a central is subscribed.
pub struct Notifier {
    task: PeriodicTask,
    sent: u64,
    deferred: u64,
}

impl Notifier {
    pub fn new(period: Duration) -> Self {
        Self {
            task: PeriodicTask::new("notifier", period),
            sent: 0,
            deferred: 0,
        }
    }

    /// (Re)start ticking; a previous instance is cancelled first.
    pub fn start(&mut self, inbox: WeakSender<ControlMessage>) -> u64 {
        let generation = self.task.start(move |generation| {
            let Some(tx) = inbox.upgrade() else {
                return ControlFlow::Break(());
            };
            match tx.try_send(ControlMessage::NotifyTick { generation }) {
                Ok(()) => ControlFlow::Continue(()),
                Err(TrySendError::Full(_)) => {
                    debug!("Controller inbox full, skipping notify tick");
                    ControlFlow::Continue(())
                }
                Err(TrySendError::Closed(_)) => ControlFlow::Break(()),
            }
        });
        info!("Notifier started ({:?})", self.task.period());
        generation
    }

    pub fn stop(&mut self) -> bool {
        let was_running = self.task.stop();
        if was_running {
            info!(
                "Notifier stopped ({} sent, {} deferred)",
                self.sent, self.deferred
            );
        }
        was_running
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    pub fn active_generation(&self) -> Option<u64> {
        self.task.active_generation()
    }

    /// Whether a tick produced under `generation` should still be emitted.
    pub fn accepts(&self, generation: u64) -> bool {
        self.task.is_current(generation)
    }

    /// Encode the current vector and push it.
    ///
    /// A pending mode update is consumed only once a frame carrying the
    /// sentinel was accepted, so exactly one frame on the wire shows it.
    pub fn emit(
        &mut self,
        state: &mut CommandState,
        transport: &mut dyn PeripheralTransport,
    ) -> NotifyOutcome {
        let frame = encode_command(&state.vector());

        match transport.notify(frame.to_vec()) {
            Ok(()) => {
                self.sent += 1;
                let mode_update = state.consume_mode_update();
                if mode_update {
                    debug!("Mode update sentinel sent, slot 0 cleared");
                }
                NotifyOutcome::Sent { mode_update }
            }
            Err(e) => {
                self.deferred += 1;
                warn!("Failed to send notification, retrying next tick: {}", e);
                NotifyOutcome::Deferred(e)
            }
        }
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn deferred(&self) -> u64 {
        self.deferred
    }
}
