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

//! Peripheral-role protocol state machine.
//!
//! ```text
//! Idle --PoweredOn--> Advertising --ServiceRegistered--> ServiceReady
//! ServiceReady | Unsubscribed --Subscribed--> Subscribed
//! Subscribed --Unsubscribed--> Unsubscribed
//! any --PoweredOff/Unauthorized/Unsupported/Unknown--> Unavailable --PoweredOn--> Advertising
//! ```
//!
//! Transitions are a pure function of (state, event); the controller
//! executes the returned actions against the transport.

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use super::ble_constants::{CHARACTERISTIC_UUID, NOT_CONNECTED_STATUS, REGISTRATION_FAILED_STATUS};
use super::protocol::{self, ControlFrame, FrameError};
use super::transport::{RadioState, TransportEvent};
use crate::control::CommandVector;

/// Protocol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeripheralState {
    /// Waiting for the radio.
    Idle,
    /// Service registration in flight.
    Advertising,
    /// Service registered and advertised, no subscriber yet.
    ServiceReady,
    /// A central is subscribed; the notifier runs.
    Subscribed,
    /// The subscriber left; still serving reads and writes.
    Unsubscribed,
    /// Radio cannot be used until it reports powered on again.
    Unavailable(RadioState),
}

impl PeripheralState {
    /// Whether read/write requests are served.
    pub fn serves_requests(&self) -> bool {
        matches!(
            self,
            PeripheralState::ServiceReady | PeripheralState::Subscribed | PeripheralState::Unsubscribed
        )
    }
}

/// Work the controller performs after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolAction {
    RegisterService,
    StartAdvertising,
    StopAdvertising,
    StartNotifier,
    StopNotifier,
    SetStatus(&'static str),
}

/// Per-request ATT response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AttError {
    #[error("invalid offset")]
    InvalidOffset,

    #[error("read not permitted")]
    ReadNotPermitted,

    #[error("write not permitted")]
    WriteNotPermitted,

    #[error("invalid attribute value length")]
    InvalidAttributeValueLength,

    #[error("unlikely error")]
    Unlikely,
}

impl From<FrameError> for AttError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Malformed { .. } => AttError::InvalidAttributeValueLength,
            FrameError::InvalidOffset { .. } => AttError::InvalidOffset,
        }
    }
}

/// A single write request of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub characteristic: Uuid,
    pub value: Vec<u8>,
}

impl WriteRequest {
    pub fn new(characteristic: Uuid, value: impl Into<Vec<u8>>) -> Self {
        Self {
            characteristic,
            value: value.into(),
        }
    }
}

/// Compute the next state and the actions for `event`.
pub fn transition(
    state: PeripheralState,
    event: &TransportEvent,
) -> (PeripheralState, Vec<ProtocolAction>) {
    use PeripheralState as S;
    use ProtocolAction as A;

    match (state, event) {
        (S::Idle | S::Unavailable(_), TransportEvent::RadioStateChanged(RadioState::PoweredOn)) => {
            (S::Advertising, vec![A::RegisterService])
        }
        (_, TransportEvent::RadioStateChanged(RadioState::PoweredOn)) => (state, Vec::new()),
        (_, TransportEvent::RadioStateChanged(radio)) => {
            let mut actions = vec![A::StopNotifier, A::StopAdvertising];
            if let Some(status) = radio.unavailable_status() {
                actions.push(A::SetStatus(status));
            }
            (S::Unavailable(*radio), actions)
        }

        (S::Advertising, TransportEvent::ServiceRegistered) => {
            (S::ServiceReady, vec![A::StopAdvertising, A::StartAdvertising])
        }
        (S::Advertising, TransportEvent::ServiceRegistrationFailed(_)) => {
            (S::Idle, vec![A::SetStatus(REGISTRATION_FAILED_STATUS)])
        }

        (S::ServiceReady | S::Subscribed | S::Unsubscribed, TransportEvent::Subscribed) => {
            (S::Subscribed, vec![A::StartNotifier])
        }
        (S::ServiceReady | S::Subscribed | S::Unsubscribed, TransportEvent::Unsubscribed) => (
            S::Unsubscribed,
            vec![A::StopNotifier, A::SetStatus(NOT_CONNECTED_STATUS)],
        ),

        _ => (state, Vec::new()),
    }
}

/// Protocol state plus request handling for the transfer characteristic.
#[derive(Debug)]
pub struct PeripheralProtocol {
    state: PeripheralState,
    characteristic: Uuid,
}

impl Default for PeripheralProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl PeripheralProtocol {
    pub fn new() -> Self {
        Self {
            state: PeripheralState::Idle,
            characteristic: CHARACTERISTIC_UUID,
        }
    }

    pub fn state(&self) -> PeripheralState {
        self.state
    }

    /// Apply a transport event and return the actions to run.
    pub fn handle_event(&mut self, event: &TransportEvent) -> Vec<ProtocolAction> {
        let (next, actions) = transition(self.state, event);
        if next != self.state {
            info!("Peripheral {:?} -> {:?} on {:?}", self.state, next, event);
            self.state = next;
        } else if actions.is_empty() {
            debug!("Ignoring {:?} in {:?}", event, self.state);
        }
        actions
    }

    /// Serve a (possibly partial) read of the command vector.
    pub fn serve_read(
        &self,
        characteristic: Uuid,
        offset: usize,
        vector: &CommandVector,
    ) -> Result<Vec<u8>, AttError> {
        if !self.state.serves_requests() || characteristic != self.characteristic {
            return Err(AttError::ReadNotPermitted);
        }

        let frame = protocol::encode_command(vector);
        Ok(protocol::read_at_offset(&frame, offset)?)
    }

    /// Validate and decode one write request.
    pub fn decode_write(&self, request: &WriteRequest) -> Result<ControlFrame, AttError> {
        if !self.state.serves_requests() || request.characteristic != self.characteristic {
            return Err(AttError::WriteNotPermitted);
        }

        Ok(protocol::decode_control(&request.value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PeripheralState as S;
    use ProtocolAction as A;

    fn ready() -> PeripheralProtocol {
        let mut protocol = PeripheralProtocol::new();
        protocol.handle_event(&TransportEvent::RadioStateChanged(RadioState::PoweredOn));
        protocol.handle_event(&TransportEvent::ServiceRegistered);
        protocol
    }

    #[test]
    fn test_happy_path() {
        let mut protocol = PeripheralProtocol::new();
        assert_eq!(protocol.state(), S::Idle);

        let actions = protocol.handle_event(&TransportEvent::RadioStateChanged(RadioState::PoweredOn));
        assert_eq!(protocol.state(), S::Advertising);
        assert_eq!(actions, vec![A::RegisterService]);

        let actions = protocol.handle_event(&TransportEvent::ServiceRegistered);
        assert_eq!(protocol.state(), S::ServiceReady);
        assert_eq!(actions, vec![A::StopAdvertising, A::StartAdvertising]);

        let actions = protocol.handle_event(&TransportEvent::Subscribed);
        assert_eq!(protocol.state(), S::Subscribed);
        assert_eq!(actions, vec![A::StartNotifier]);

        let actions = protocol.handle_event(&TransportEvent::Unsubscribed);
        assert_eq!(protocol.state(), S::Unsubscribed);
        assert_eq!(actions, vec![A::StopNotifier, A::SetStatus(NOT_CONNECTED_STATUS)]);

        let actions = protocol.handle_event(&TransportEvent::Subscribed);
        assert_eq!(protocol.state(), S::Subscribed);
        assert_eq!(actions, vec![A::StartNotifier]);
    }

    #[test]
    fn test_radio_loss_and_recovery() {
        let mut protocol = ready();
        protocol.handle_event(&TransportEvent::Subscribed);

        let actions = protocol.handle_event(&TransportEvent::RadioStateChanged(RadioState::PoweredOff));
        assert_eq!(protocol.state(), S::Unavailable(RadioState::PoweredOff));
        assert_eq!(
            actions,
            vec![
                A::StopNotifier,
                A::StopAdvertising,
                A::SetStatus("Bluetooth is powered off.")
            ]
        );

        // Subscriptions are meaningless without a radio.
        assert!(protocol.handle_event(&TransportEvent::Subscribed).is_empty());

        let actions = protocol.handle_event(&TransportEvent::RadioStateChanged(RadioState::PoweredOn));
        assert_eq!(protocol.state(), S::Advertising);
        assert_eq!(actions, vec![A::RegisterService]);
    }

    #[test]
    fn test_unauthorized_and_unsupported() {
        for radio in [RadioState::Unauthorized, RadioState::Unsupported] {
            let mut protocol = PeripheralProtocol::new();
            let actions = protocol.handle_event(&TransportEvent::RadioStateChanged(radio));
            assert_eq!(protocol.state(), S::Unavailable(radio));
            assert!(actions.contains(&A::StopAdvertising));
        }
    }

    #[test]
    fn test_repeated_power_on_ignored() {
        let mut protocol = ready();
        let actions = protocol.handle_event(&TransportEvent::RadioStateChanged(RadioState::PoweredOn));
        assert!(actions.is_empty());
        assert_eq!(protocol.state(), S::ServiceReady);
    }

    #[test]
    fn test_registration_failure() {
        let mut protocol = PeripheralProtocol::new();
        protocol.handle_event(&TransportEvent::RadioStateChanged(RadioState::PoweredOn));
        let actions = protocol.handle_event(&TransportEvent::ServiceRegistrationFailed("busy".into()));

        assert_eq!(protocol.state(), S::Idle);
        assert_eq!(actions, vec![A::SetStatus(REGISTRATION_FAILED_STATUS)]);
    }

    #[test]
    fn test_serve_read() {
        let protocol = ready();
        let vector = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let full = protocol::encode_command(&vector).to_vec();

        assert_eq!(protocol.serve_read(CHARACTERISTIC_UUID, 0, &vector), Ok(full.clone()));
        assert_eq!(
            protocol.serve_read(CHARACTERISTIC_UUID, 20, &vector),
            Ok(full[20..].to_vec())
        );
        assert_eq!(protocol.serve_read(CHARACTERISTIC_UUID, 24, &vector), Ok(Vec::new()));
        assert_eq!(
            protocol.serve_read(CHARACTERISTIC_UUID, 25, &vector),
            Err(AttError::InvalidOffset)
        );
        assert_eq!(
            protocol.serve_read(Uuid::nil(), 0, &vector),
            Err(AttError::ReadNotPermitted)
        );
    }

    #[test]
    fn test_requests_before_ready() {
        let protocol = PeripheralProtocol::new();
        assert_eq!(
            protocol.serve_read(CHARACTERISTIC_UUID, 0, &[0.0; 6]),
            Err(AttError::ReadNotPermitted)
        );
        assert_eq!(
            protocol.decode_write(&WriteRequest::new(CHARACTERISTIC_UUID, [0u8; 8])),
            Err(AttError::WriteNotPermitted)
        );
    }

    #[test]
    fn test_decode_write() {
        let protocol = ready();

        let frame = ControlFrame::new(4, 0.0);
        assert_eq!(
            protocol.decode_write(&WriteRequest::new(CHARACTERISTIC_UUID, frame.to_bytes())),
            Ok(frame)
        );
        assert_eq!(
            protocol.decode_write(&WriteRequest::new(CHARACTERISTIC_UUID, [4u8; 7])),
            Err(AttError::InvalidAttributeValueLength)
        );
        assert_eq!(
            protocol.decode_write(&WriteRequest::new(Uuid::nil(), frame.to_bytes())),
            Err(AttError::WriteNotPermitted)
        );
    }
}
