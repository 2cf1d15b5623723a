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

//! Bluetooth communication module.
//!
//! Wire format, peripheral protocol state machine, notifier and the BlueZ
//! GATT server that carries them.

pub mod ble_constants;
pub mod gatt_server;
pub mod notifier;
pub mod peripheral;
pub mod protocol;
pub mod transport;

pub use ble_constants::{CHARACTERISTIC_UUID, SERVICE_UUID};
pub use gatt_server::{BluerTransport, GattServer};
pub use notifier::{NotifyOutcome, Notifier};
pub use peripheral::{AttError, PeripheralProtocol, PeripheralState, ProtocolAction, WriteRequest};
pub use protocol::{ControlFrame, FrameError};
pub use transport::{
    PeripheralTransport, RadioState, SimulatedTransport, TransportError, TransportEvent,
    UnavailableTransport,
};
