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

//! Peripheral transport abstraction.
//!
//! The controller only ever talks to the radio through this trait, so the
//! protocol can run against BlueZ or against `SimulatedTransport` in tests.

use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Radio power/permission state as reported by the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    PoweredOn,
    PoweredOff,
    Unauthorized,
    Unsupported,
    Unknown,
}

impl RadioState {
    /// Status line for states in which no service operations are possible.
    pub fn unavailable_status(&self) -> Option<&'static str> {
        match self {
            RadioState::PoweredOn => None,
            RadioState::PoweredOff => Some("Bluetooth is powered off."),
            RadioState::Unauthorized => Some("Bluetooth access denied."),
            RadioState::Unsupported => Some("BLE peripheral unsupported on this device."),
            RadioState::Unknown => Some("Unknown Bluetooth state."),
        }
    }
}

/// Events reported by the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    RadioStateChanged(RadioState),
    ServiceRegistered,
    ServiceRegistrationFailed(String),
    /// A central subscribed to notifications.
    Subscribed,
    /// The subscriber went away.
    Unsubscribed,
}

/// Transport failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("transport unavailable: {0:?}")]
    Unavailable(RadioState),

    #[error("notification queue full")]
    Backpressure,

    #[error("no subscriber")]
    Closed,

    #[error("transport failure: {0}")]
    Failed(String),
}

/// Trait for peripheral-role transports. Calls must not block.
pub trait PeripheralTransport: Send {
    /// Transport name for logs.
    fn backend_name(&self) -> &'static str;

    /// Register the service; completion arrives as `ServiceRegistered`.
    fn register_service(&mut self) -> Result<(), TransportError>;

    /// (Re)start advertising.
    fn start_advertising(&mut self, local_name: &str, service: Uuid) -> Result<(), TransportError>;

    fn stop_advertising(&mut self) -> Result<(), TransportError>;

    /// Push a notification to the subscriber.
    fn notify(&mut self, value: Vec<u8>) -> Result<(), TransportError>;
}

/// Transport used when no Bluetooth stack could be opened.
pub struct UnavailableTransport {
    state: RadioState,
}

impl UnavailableTransport {
    pub fn new(state: RadioState) -> Self {
        Self { state }
    }
}

impl PeripheralTransport for UnavailableTransport {
    fn backend_name(&self) -> &'static str {
        "Unavailable"
    }

    fn register_service(&mut self) -> Result<(), TransportError> {
        Err(TransportError::Unavailable(self.state))
    }

    fn start_advertising(&mut self, _local_name: &str, _service: Uuid) -> Result<(), TransportError> {
        Err(TransportError::Unavailable(self.state))
    }

    fn stop_advertising(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn notify(&mut self, _value: Vec<u8>) -> Result<(), TransportError> {
        Err(TransportError::Unavailable(self.state))
    }
}

/// Everything a `SimulatedTransport` saw.
#[derive(Debug, Default, Clone)]
pub struct SimulatedLog {
    pub registrations: usize,
    pub advertise_calls: usize,
    pub advertising: Option<(String, Uuid)>,
    pub notifications: Vec<Vec<u8>>,
    pub rejected: usize,
    pub backpressure: bool,
}

/// In-memory transport. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct SimulatedTransport {
    log: Arc<Mutex<SimulatedLog>>,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every notification while enabled.
    pub fn set_backpressure(&self, enabled: bool) {
        self.log.lock().backpressure = enabled;
    }

    pub fn snapshot(&self) -> SimulatedLog {
        self.log.lock().clone()
    }

    pub fn notifications(&self) -> Vec<Vec<u8>> {
        self.log.lock().notifications.clone()
    }

    pub fn take_notifications(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.log.lock().notifications)
    }

    pub fn is_advertising(&self) -> bool {
        self.log.lock().advertising.is_some()
    }
}

impl PeripheralTransport for SimulatedTransport {
    fn backend_name(&self) -> &'static str {
        "Simulated"
    }

    fn register_service(&mut self) -> Result<(), TransportError> {
        self.log.lock().registrations += 1;
        Ok(())
    }

    fn start_advertising(&mut self, local_name: &str, service: Uuid) -> Result<(), TransportError> {
        let mut log = self.log.lock();
        log.advertise_calls += 1;
        log.advertising = Some((local_name.to_string(), service));
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), TransportError> {
        self.log.lock().advertising = None;
        Ok(())
    }

    fn notify(&mut self, value: Vec<u8>) -> Result<(), TransportError> {
        let mut log = self.log.lock();
        if log.backpressure {
            log.rejected += 1;
            return Err(TransportError::Backpressure);
        }
        debug!("[SIM] notify {} bytes", value.len());
        log.notifications.push(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_records() {
        let mut transport = SimulatedTransport::new();
        let observer = transport.clone();

        transport.register_service().unwrap();
        transport.start_advertising("Daybreak-Hun", Uuid::nil()).unwrap();
        transport.notify(vec![1, 2, 3]).unwrap();

        let log = observer.snapshot();
        assert_eq!(log.registrations, 1);
        assert_eq!(log.advertising, Some(("Daybreak-Hun".to_string(), Uuid::nil())));
        assert_eq!(log.notifications, vec![vec![1, 2, 3]]);

        transport.stop_advertising().unwrap();
        assert!(!observer.is_advertising());
    }

    #[test]
    fn test_simulated_backpressure() {
        let mut transport = SimulatedTransport::new();
        transport.set_backpressure(true);

        assert_eq!(transport.notify(vec![0]), Err(TransportError::Backpressure));
        assert_eq!(transport.snapshot().rejected, 1);
        assert!(transport.notifications().is_empty());
    }

    #[test]
    fn test_unavailable_transport() {
        let mut transport = UnavailableTransport::new(RadioState::Unsupported);
        assert_eq!(
            transport.notify(vec![0]),
            Err(TransportError::Unavailable(RadioState::Unsupported))
        );
        assert_eq!(
            RadioState::PoweredOff.unavailable_status(),
            Some("Bluetooth is powered off.")
        );
        assert_eq!(RadioState::PoweredOn.unavailable_status(), None);
    }
}
