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

//! Application state management.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::bluetooth::ble_constants::NOT_CONNECTED_STATUS;
use crate::control::Mode;

/// Connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Service not registered yet.
    Disconnected,
    /// Advertising, waiting for the robot to subscribe.
    Advertising,
    /// Robot subscribed to notifications.
    Connected,
    /// Radio off, unauthorized or unsupported.
    Unavailable,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Advertising => "Advertising...",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Unavailable => "Bluetooth unavailable",
        }
    }

    pub fn icon_name(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "network-offline",
            ConnectionStatus::Advertising => "network-idle",
            ConnectionStatus::Connected => "network-transmit-receive",
            ConnectionStatus::Unavailable => "network-error",
        }
    }
}

/// State shown to the user. Written by the controller, read by the tray.
#[derive(Debug)]
pub struct AppState {
    /// Current connection status.
    pub connection_status: RwLock<ConnectionStatus>,

    /// Status line (mode label or transport condition).
    pub status_text: RwLock<String>,

    /// Last mode reported by the robot.
    pub mode: RwLock<Option<Mode>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            connection_status: RwLock::new(ConnectionStatus::Disconnected),
            status_text: RwLock::new(NOT_CONNECTED_STATUS.to_string()),
            mode: RwLock::new(None),
        }
    }
}

impl AppState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        *self.connection_status.write() = status;
    }

    pub fn get_status(&self) -> ConnectionStatus {
        *self.connection_status.read()
    }

    pub fn set_status_text(&self, text: impl Into<String>) {
        *self.status_text.write() = text.into();
    }

    pub fn get_status_text(&self) -> String {
        self.status_text.read().clone()
    }

    pub fn set_mode(&self, mode: Mode) {
        *self.mode.write() = Some(mode);
    }

    pub fn get_mode(&self) -> Option<Mode> {
        *self.mode.read()
    }
}
