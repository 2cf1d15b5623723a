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

//! Controller task.
//!
//! One task owns the command state and everything that mutates it. Joystick
//! input, transport callbacks, attitude samples and notifier ticks all arrive
//! as `ControlMessage`s on a single inbox and are handled one at a time.

use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bluetooth::notifier::Notifier;
use crate::bluetooth::peripheral::{
    AttError, PeripheralProtocol, PeripheralState, ProtocolAction, WriteRequest,
};
use crate::bluetooth::protocol::ControlFrame;
use crate::bluetooth::transport::{PeripheralTransport, TransportEvent};
use crate::bluetooth::SERVICE_UUID;
use crate::config::Config;
use crate::control::{
    Attitude, AttitudeSampler, AttitudeSource, CommandState, CommandVector, HapticEngine,
    JoystickMapper, Mode, ModeEffectPolicy, Stick, StickOutput,
};
use crate::state::{AppState, ConnectionStatus};

/// Default inbox capacity.
pub const INBOX_DEPTH: usize = 64;

/// Messages handled by the controller task.
#[derive(Debug)]
pub enum ControlMessage {
    /// Raw drag translation of a stick handle.
    JoystickDrag { stick: Stick, dx: f32, dy: f32 },
    /// Drag ended; the stick returns to centre.
    JoystickRelease { stick: Stick },
    /// Already-normalized stick position.
    JoystickInput { stick: Stick, x: f32, y: f32 },
    /// User asked the robot to pick up a new mode.
    UpdateMode,
    Transport(TransportEvent),
    Read {
        characteristic: Uuid,
        offset: usize,
        reply: oneshot::Sender<Result<Vec<u8>, AttError>>,
    },
    Write {
        requests: Vec<WriteRequest>,
        reply: oneshot::Sender<Vec<Result<(), AttError>>>,
    },
    Attitude { generation: u64, attitude: Attitude },
    NotifyTick { generation: u64 },
    Snapshot { reply: oneshot::Sender<ControlSnapshot> },
    Shutdown,
}

/// Point-in-time view of the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlSnapshot {
    pub vector: CommandVector,
    pub mode: Option<Mode>,
    pub vibration: f32,
    pub mode_update_pending: bool,
    pub peripheral: PeripheralState,
    pub notifier_running: bool,
    pub sampling_attitude: bool,
}

/// Cloneable sender side of the controller inbox.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<ControlMessage>,
}

impl ControllerHandle {
    /// Create a handle and the inbox the controller task will drain.
    pub fn channel(depth: usize) -> (Self, mpsc::Receiver<ControlMessage>) {
        let (tx, rx) = mpsc::channel(depth);
        (Self { tx }, rx)
    }

    async fn send(&self, message: ControlMessage) -> bool {
        if self.tx.send(message).await.is_err() {
            warn!("Controller task is gone, dropping message");
            return false;
        }
        true
    }

    pub async fn joystick_drag(&self, stick: Stick, dx: f32, dy: f32) {
        self.send(ControlMessage::JoystickDrag { stick, dx, dy }).await;
    }

    pub async fn joystick_release(&self, stick: Stick) {
        self.send(ControlMessage::JoystickRelease { stick }).await;
    }

    pub async fn joystick_input(&self, stick: Stick, x: f32, y: f32) {
        self.send(ControlMessage::JoystickInput { stick, x, y }).await;
    }

    pub async fn update_mode(&self) {
        self.send(ControlMessage::UpdateMode).await;
    }

    pub async fn transport_event(&self, event: TransportEvent) {
        self.send(ControlMessage::Transport(event)).await;
    }

    /// Serve a read request.
    pub async fn read(&self, characteristic: Uuid, offset: usize) -> Result<Vec<u8>, AttError> {
        let (reply, rx) = oneshot::channel();
        let message = ControlMessage::Read {
            characteristic,
            offset,
            reply,
        };
        if !self.send(message).await {
            return Err(AttError::Unlikely);
        }
        rx.await.unwrap_or(Err(AttError::Unlikely))
    }

    /// Serve a batch of write requests; one result per request.
    pub async fn write(&self, requests: Vec<WriteRequest>) -> Vec<Result<(), AttError>> {
        let count = requests.len();
        let (reply, rx) = oneshot::channel();
        if !self.send(ControlMessage::Write { requests, reply }).await {
            return vec![Err(AttError::Unlikely); count];
        }
        rx.await.unwrap_or_else(|_| vec![Err(AttError::Unlikely); count])
    }

    pub async fn snapshot(&self) -> Option<ControlSnapshot> {
        let (reply, rx) = oneshot::channel();
        if !self.send(ControlMessage::Snapshot { reply }).await {
            return None;
        }
        rx.await.ok()
    }

    pub async fn shutdown(&self) {
        self.send(ControlMessage::Shutdown).await;
    }

    pub(crate) fn downgrade(&self) -> mpsc::WeakSender<ControlMessage> {
        self.tx.downgrade()
    }
}

/// External collaborators of the controller.
pub struct ControllerParts {
    pub config: Config,
    pub transport: Box<dyn PeripheralTransport>,
    pub haptics: Box<dyn HapticEngine>,
    pub attitude: Arc<dyn AttitudeSource>,
    pub app_state: Arc<AppState>,
}

/// Owner of all mutable control state.
pub struct Controller {
    state: CommandState,
    protocol: PeripheralProtocol,
    policy: ModeEffectPolicy,
    transport: Box<dyn PeripheralTransport>,
    haptics: Box<dyn HapticEngine>,
    sampler: AttitudeSampler,
    notifier: Notifier,
    left: JoystickMapper,
    right: JoystickMapper,
    local_name: String,
    app_state: Arc<AppState>,
    inbox: mpsc::WeakSender<ControlMessage>,
}

impl Controller {
    pub fn new(parts: ControllerParts, handle: &ControllerHandle) -> Self {
        let ControllerParts {
            config,
            transport,
            haptics,
            attitude,
            app_state,
        } = parts;

        if haptics.is_available() {
            info!("Haptics: {}", haptics.backend_name());
        } else {
            warn!("Haptic engine unavailable, vibration requests will be ignored");
        }
        info!("Transport: {}", transport.backend_name());

        let radius = config.joystick.max_radius();
        Self {
            state: CommandState::new(config.control.mode_update_sentinel),
            protocol: PeripheralProtocol::new(),
            policy: ModeEffectPolicy::new(&config.haptic),
            transport,
            haptics,
            sampler: AttitudeSampler::new(attitude, config.control.attitude_interval()),
            notifier: Notifier::new(config.control.notify_interval()),
            left: JoystickMapper::new(Stick::Left, radius),
            right: JoystickMapper::new(Stick::Right, radius),
            local_name: config.bluetooth.device_name,
            app_state,
            inbox: handle.downgrade(),
        }
    }

    /// Drain the inbox until shutdown or until every handle is dropped.
    pub async fn run(mut self, mut inbox: mpsc::Receiver<ControlMessage>) {
        info!("Controller started");
        while let Some(message) = inbox.recv().await {
            if self.handle(message).is_break() {
                break;
            }
        }
        self.notifier.stop();
        self.sampler.disable();
        info!("Controller stopped");
    }

    /// Handle one message. Returns `Break` on shutdown.
    pub fn handle(&mut self, message: ControlMessage) -> ControlFlow<()> {
        match message {
            ControlMessage::JoystickDrag { stick, dx, dy } => {
                let output = self.mapper(stick).drag(dx, dy);
                self.state.apply_stick(stick, output);
            }
            ControlMessage::JoystickRelease { stick } => {
                let output = self.mapper(stick).release();
                self.state.apply_stick(stick, output);
            }
            ControlMessage::JoystickInput { stick, x, y } => {
                self.state.apply_stick(stick, StickOutput::normalized(x, y));
            }
            ControlMessage::UpdateMode => {
                info!("Mode update requested");
                self.state.request_mode_update();
            }
            ControlMessage::Transport(event) => self.on_transport_event(event),
            ControlMessage::Read {
                characteristic,
                offset,
                reply,
            } => {
                let result = self
                    .protocol
                    .serve_read(characteristic, offset, &self.state.vector());
                if let Err(e) = &result {
                    warn!("Rejected read at offset {}: {}", offset, e);
                }
                let _ = reply.send(result);
            }
            ControlMessage::Write { requests, reply } => {
                let results = self.on_write(requests);
                let _ = reply.send(results);
            }
            ControlMessage::Attitude {
                generation,
                attitude,
            } => {
                if self.sampler.accepts(generation) {
                    self.state.set_attitude(attitude.roll, attitude.pitch);
                } else {
                    debug!("Dropping stale attitude sample #{}", generation);
                }
            }
            ControlMessage::NotifyTick { generation } => {
                if self.notifier.accepts(generation) {
                    self.notifier.emit(&mut self.state, self.transport.as_mut());
                } else {
                    debug!("Dropping stale notify tick #{}", generation);
                }
            }
            ControlMessage::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            ControlMessage::Shutdown => {
                info!("Controller shutdown requested");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn mapper(&mut self, stick: Stick) -> &mut JoystickMapper {
        match stick {
            Stick::Left => &mut self.left,
            Stick::Right => &mut self.right,
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        if let TransportEvent::ServiceRegistrationFailed(reason) = &event {
            warn!("Service registration failed: {}", reason);
        }

        for action in self.protocol.handle_event(&event) {
            self.run_action(action);
        }

        let status = match self.protocol.state() {
            PeripheralState::Idle => ConnectionStatus::Disconnected,
            PeripheralState::Advertising
            | PeripheralState::ServiceReady
            | PeripheralState::Unsubscribed => ConnectionStatus::Advertising,
            PeripheralState::Subscribed => ConnectionStatus::Connected,
            PeripheralState::Unavailable(_) => ConnectionStatus::Unavailable,
        };
        self.app_state.set_status(status);
    }

    fn run_action(&mut self, action: ProtocolAction) {
        match action {
            ProtocolAction::RegisterService => {
                if let Err(e) = self.transport.register_service() {
                    self.on_transport_event(TransportEvent::ServiceRegistrationFailed(e.to_string()));
                }
            }
            ProtocolAction::StartAdvertising => {
                match self.transport.start_advertising(&self.local_name, SERVICE_UUID) {
                    Ok(()) => info!("Advertising as '{}'", self.local_name),
                    Err(e) => warn!("Failed to start advertising: {}", e),
                }
            }
            ProtocolAction::StopAdvertising => {
                if let Err(e) = self.transport.stop_advertising() {
                    warn!("Failed to stop advertising: {}", e);
                }
            }
            ProtocolAction::StartNotifier => {
                self.notifier.start(self.inbox.clone());
            }
            ProtocolAction::StopNotifier => {
                self.notifier.stop();
            }
            ProtocolAction::SetStatus(text) => {
                self.app_state.set_status_text(text);
            }
        }
    }

    fn on_write(&mut self, requests: Vec<WriteRequest>) -> Vec<Result<(), AttError>> {
        requests
            .iter()
            .map(|request| {
                let frame = self.protocol.decode_write(request).map_err(|e| {
                    warn!("Rejected write of {} bytes: {}", request.value.len(), e);
                    e
                })?;
                self.apply_control(frame);
                Ok(())
            })
            .collect()
    }

    fn apply_control(&mut self, frame: ControlFrame) {
        let effects = self.policy.evaluate(&frame);
        self.state.set_control(&frame);

        info!("{} (vibration {:.2})", effects.status, frame.vibration);
        self.app_state.set_status_text(effects.status.as_str());
        self.app_state.set_mode(effects.mode);

        if effects.attitude_sampling {
            self.sampler.enable(self.inbox.clone());
        } else {
            self.sampler.disable();
            self.state.clear_attitude();
        }

        if let Some(pulse) = effects.haptic {
            if let Err(e) = self.haptics.play(&pulse) {
                warn!("Failed to play haptic: {}", e);
            }
        }
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            vector: self.state.vector(),
            mode: self.state.mode(),
            vibration: self.state.vibration(),
            mode_update_pending: self.state.mode_update_pending(),
            peripheral: self.protocol.state(),
            notifier_running: self.notifier.is_running(),
            sampling_attitude: self.sampler.is_running(),
        }
    }

    pub fn notifier_generation(&self) -> Option<u64> {
        self.notifier.active_generation()
    }

    pub fn sampler_generation(&self) -> Option<u64> {
        self.sampler.active_generation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::protocol::decode_command;
    use crate::bluetooth::transport::{RadioState, SimulatedTransport};
    use crate::bluetooth::CHARACTERISTIC_UUID;
    use crate::control::{HapticError, HapticPulse, NoHaptics, SharedAttitude};
    use parking_lot::Mutex;

    #[derive(Clone, Default)]
    struct RecordingHaptics {
        pulses: Arc<Mutex<Vec<HapticPulse>>>,
    }

    impl HapticEngine for RecordingHaptics {
        fn backend_name(&self) -> &'static str {
            "Recording"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn play(&mut self, pulse: &HapticPulse) -> Result<(), HapticError> {
            self.pulses.lock().push(*pulse);
            Ok(())
        }
    }

    struct Harness {
        controller: Controller,
        transport: SimulatedTransport,
        attitude: SharedAttitude,
        haptics: RecordingHaptics,
        app_state: Arc<AppState>,
        _handle: ControllerHandle,
        _inbox: mpsc::Receiver<ControlMessage>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_haptics(RecordingHaptics::default(), None)
        }

        fn with_haptics(haptics: RecordingHaptics, engine: Option<Box<dyn HapticEngine>>) -> Self {
            let (handle, inbox) = ControllerHandle::channel(INBOX_DEPTH);
            let transport = SimulatedTransport::new();
            let attitude = SharedAttitude::new();
            let app_state = AppState::new();

            let controller = Controller::new(
                ControllerParts {
                    config: Config::default(),
                    transport: Box::new(transport.clone()),
                    haptics: engine.unwrap_or_else(|| Box::new(haptics.clone())),
                    attitude: Arc::new(attitude.clone()),
                    app_state: app_state.clone(),
                },
                &handle,
            );

            Self {
                controller,
                transport,
                attitude,
                haptics,
                app_state,
                _handle: handle,
                _inbox: inbox,
            }
        }

        fn event(&mut self, event: TransportEvent) {
            let _ = self.controller.handle(ControlMessage::Transport(event));
        }

        fn ready(mut self) -> Self {
            self.event(TransportEvent::RadioStateChanged(RadioState::PoweredOn));
            self.event(TransportEvent::ServiceRegistered);
            self
        }

        fn write(&mut self, value: &[u8]) -> Result<(), AttError> {
            self.controller
                .on_write(vec![WriteRequest::new(CHARACTERISTIC_UUID, value)])
                .remove(0)
        }

        fn tick(&mut self) {
            let generation = self.controller.notifier_generation().unwrap();
            let _ = self.controller.handle(ControlMessage::NotifyTick { generation });
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_advertises() {
        let harness = Harness::new().ready();

        let log = harness.transport.snapshot();
        assert_eq!(log.registrations, 1);
        assert_eq!(log.advertising, Some(("Daybreak-Hun".to_string(), SERVICE_UUID)));
        assert_eq!(harness.app_state.get_status(), ConnectionStatus::Advertising);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_space_control_frame() {
        let mut harness = Harness::new().ready();

        assert_eq!(harness.write(&ControlFrame::new(4, 0.0).to_bytes()), Ok(()));

        assert_eq!(harness.app_state.get_status_text(), "[Mode] TASK SPACE CONTROL");
        assert!(harness.haptics.pulses.lock().is_empty());
        let snapshot = harness.controller.snapshot();
        assert!(!snapshot.sampling_attitude);
        assert_eq!(snapshot.vector[3..5], [0.0, 0.0]);
        assert_eq!(snapshot.mode, Some(Mode::TaskSpaceControl));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stand_frame_samples_attitude_and_vibrates() {
        let mut harness = Harness::new().ready();
        harness.attitude.set(0.2, -0.1);

        assert_eq!(harness.write(&ControlFrame::new(6, 0.5).to_bytes()), Ok(()));
        assert_eq!(
            harness.app_state.get_status_text(),
            "[Mode] WHOLE BODY CONTROL STAND"
        );

        let pulses = harness.haptics.pulses.lock().clone();
        assert_eq!(pulses.len(), 1);
        assert_eq!(pulses[0].intensity, 0.5);
        assert_eq!(pulses[0].sharpness, 0.1);
        assert_eq!(pulses[0].duration, std::time::Duration::from_millis(500));

        let generation = harness.controller.sampler_generation().unwrap();
        let _ = harness.controller.handle(ControlMessage::Attitude {
            generation,
            attitude: Attitude { roll: 0.2, pitch: -0.1 },
        });
        assert_eq!(harness.controller.snapshot().vector[3..5], [0.2, -0.1]);

        // Leaving stand mode zeroes the slots and drops late samples.
        harness.write(&ControlFrame::new(7, 0.0).to_bytes()).unwrap();
        let _ = harness.controller.handle(ControlMessage::Attitude {
            generation,
            attitude: Attitude { roll: 0.9, pitch: 0.9 },
        });
        let snapshot = harness.controller.snapshot();
        assert!(!snapshot.sampling_attitude);
        assert_eq!(snapshot.vector[3..5], [0.0, 0.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_frame_rejected_without_side_effects() {
        let mut harness = Harness::new().ready();
        let _ = harness.controller.handle(ControlMessage::JoystickInput {
            stick: Stick::Left,
            x: 0.5,
            y: 0.5,
        });
        let before = harness.controller.snapshot();

        assert_eq!(
            harness.write(&[6, 0, 0, 0, 0x3f, 0, 0]),
            Err(AttError::InvalidAttributeValueLength)
        );
        assert_eq!(harness.controller.snapshot(), before);
        assert!(harness.haptics.pulses.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_response_per_request() {
        let mut harness = Harness::new().ready();
        let results = harness.controller.on_write(vec![
            WriteRequest::new(CHARACTERISTIC_UUID, ControlFrame::new(1, 0.0).to_bytes()),
            WriteRequest::new(CHARACTERISTIC_UUID, vec![0u8; 3]),
            WriteRequest::new(Uuid::nil(), ControlFrame::new(2, 0.0).to_bytes()),
            WriteRequest::new(CHARACTERISTIC_UUID, ControlFrame::new(2, 0.0).to_bytes()),
        ]);

        assert_eq!(
            results,
            vec![
                Ok(()),
                Err(AttError::InvalidAttributeValueLength),
                Err(AttError::WriteNotPermitted),
                Ok(())
            ]
        );
        assert_eq!(harness.controller.snapshot().mode, Some(Mode::Homing));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mode_update_one_shot() {
        let mut harness = Harness::new().ready();
        harness.event(TransportEvent::Subscribed);

        let _ = harness.controller.handle(ControlMessage::UpdateMode);
        assert_eq!(harness.controller.snapshot().vector[0], 100.0);

        harness.tick();
        harness.tick();

        let slot0: Vec<f32> = harness
            .transport
            .notifications()
            .iter()
            .map(|frame| decode_command(frame).unwrap()[0])
            .collect();
        assert_eq!(slot0, vec![100.0, 0.0]);
        assert!(!harness.controller.snapshot().mode_update_pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_stops_notifier() {
        let mut harness = Harness::new().ready();
        harness.event(TransportEvent::Subscribed);
        let generation = harness.controller.notifier_generation().unwrap();
        assert_eq!(harness.app_state.get_status(), ConnectionStatus::Connected);

        harness.event(TransportEvent::Unsubscribed);
        assert!(!harness.controller.snapshot().notifier_running);
        assert_eq!(harness.app_state.get_status_text(), "The system is not connected yet!");

        let _ = harness.controller.handle(ControlMessage::NotifyTick { generation });
        assert!(harness.transport.notifications().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubscribe_replaces_notifier() {
        let mut harness = Harness::new().ready();
        harness.event(TransportEvent::Subscribed);
        let first = harness.controller.notifier_generation().unwrap();
        harness.event(TransportEvent::Subscribed);
        let second = harness.controller.notifier_generation().unwrap();
        assert_ne!(first, second);

        let _ = harness.controller.handle(ControlMessage::NotifyTick { generation: first });
        assert!(harness.transport.notifications().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_joystick_release_zeroes_slots() {
        let mut harness = Harness::new();
        let _ = harness.controller.handle(ControlMessage::JoystickDrag {
            stick: Stick::Right,
            dx: 700.0,
            dy: 0.0,
        });
        assert_eq!(harness.controller.snapshot().vector, [0.0, 0.0, 0.0, 0.0, 0.0, -1.0]);

        let _ = harness.controller.handle(ControlMessage::JoystickRelease { stick: Stick::Right });
        assert_eq!(harness.controller.snapshot().vector, [0.0; 6]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_haptic_failure_is_not_a_protocol_error() {
        let mut harness =
            Harness::with_haptics(RecordingHaptics::default(), Some(Box::new(NoHaptics))).ready();

        assert_eq!(harness.write(&ControlFrame::new(6, 0.5).to_bytes()), Ok(()));
        assert_eq!(harness.controller.snapshot().mode, Some(Mode::WholeBodyControlStand));
    }

    #[tokio::test(start_paused = true)]
    async fn test_power_off_halts_advertising() {
        let mut harness = Harness::new().ready();
        harness.event(TransportEvent::Subscribed);
        harness.event(TransportEvent::RadioStateChanged(RadioState::PoweredOff));

        assert!(!harness.transport.is_advertising());
        assert!(!harness.controller.snapshot().notifier_running);
        assert_eq!(harness.app_state.get_status(), ConnectionStatus::Unavailable);
        assert_eq!(harness.app_state.get_status_text(), "Bluetooth is powered off.");

        let (reply, rx) = oneshot::channel();
        let _ = harness.controller.handle(ControlMessage::Read {
            characteristic: CHARACTERISTIC_UUID,
            offset: 0,
            reply,
        });
        assert_eq!(rx.await.unwrap(), Err(AttError::ReadNotPermitted));
    }
}
