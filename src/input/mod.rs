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

//! Host input sources that drive the command sticks.

pub mod gamepad;

pub use gamepad::{forward_updates, AxisRange, GamepadMapper, GamepadSource, StickUpdate};

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::GamepadConfig;
use crate::controller::ControllerHandle;

/// Open the configured gamepad and stream its sticks into the controller.
///
/// Returns `None` when input is disabled or no device is present; the sticks
/// then stay centred.
pub fn spawn_gamepad(config: &GamepadConfig, handle: ControllerHandle) -> Option<JoinHandle<()>> {
    if !config.enabled {
        info!("Gamepad input disabled");
        return None;
    }

    match GamepadSource::open(config) {
        Ok(Some(source)) => Some(tokio::spawn(async move {
            if let Err(e) = source.run(&handle).await {
                error!("Gamepad input stopped: {}", e);
            }
        })),
        Ok(None) => {
            warn!("No gamepad found, sticks stay centred");
            None
        }
        Err(e) => {
            warn!("Failed to open gamepad: {}", e);
            None
        }
    }
}
