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

//! Configuration module.
//!
//! Handles loading and saving application settings.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bluetooth::ble_constants::DEFAULT_LOCAL_NAME;
use crate::control::MODE_UPDATE_SENTINEL;

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bluetooth settings.
    pub bluetooth: BluetoothConfig,

    /// Control loop timing.
    pub control: ControlConfig,

    /// Joystick widget geometry.
    pub joystick: JoystickConfig,

    /// Haptic pulse shape.
    pub haptic: HapticConfig,

    /// Host gamepad feeding the sticks.
    pub gamepad: GamepadConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Local name carried in the advertisement.
    pub device_name: String,

    /// Notifications queued towards BlueZ before ticks are rejected.
    pub notify_queue_depth: usize,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_LOCAL_NAME.to_string(),
            notify_queue_depth: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Period of command notifications in milliseconds.
    pub notify_interval_ms: u64,

    /// Period of attitude polling in milliseconds.
    pub attitude_interval_ms: u64,

    /// Slot 0 value sent once after "Update Mode".
    pub mode_update_sentinel: f32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            notify_interval_ms: 100,
            attitude_interval_ms: 100,
            mode_update_sentinel: MODE_UPDATE_SENTINEL,
        }
    }
}

impl ControlConfig {
    pub fn notify_interval(&self) -> Duration {
        Duration::from_millis(self.notify_interval_ms)
    }

    pub fn attitude_interval(&self) -> Duration {
        Duration::from_millis(self.attitude_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoystickConfig {
    /// Diameter of the joystick base.
    pub outer_diameter: f32,

    /// Diameter of the draggable handle.
    pub handle_diameter: f32,
}

impl Default for JoystickConfig {
    fn default() -> Self {
        Self {
            outer_diameter: 200.0,
            handle_diameter: 60.0,
        }
    }
}

impl JoystickConfig {
    /// Travel of the handle centre.
    pub fn max_radius(&self) -> f32 {
        self.outer_diameter / 2.0 - self.handle_diameter / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HapticConfig {
    /// Sharpness of every pulse (0-1).
    pub sharpness: f32,

    /// Pulse length in milliseconds.
    pub duration_ms: u64,

    /// Clamp vibration intensities above 1.0.
    pub clamp_intensity: bool,
}

impl Default for HapticConfig {
    fn default() -> Self {
        Self {
            sharpness: 0.1,
            duration_ms: 500,
            clamp_intensity: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GamepadConfig {
    /// Read stick input from an evdev gamepad.
    pub enabled: bool,

    /// Event device to open; the first pad with two sticks when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_path: Option<String>,

    /// Radial deadzone on normalized stick deflection.
    pub deadzone: f32,
}

impl Default for GamepadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            device_path: None,
            deadzone: 0.08,
        }
    }
}

fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sthexa-controller")
        .join("config.toml")
}

impl Config {
    /// Load configuration from the user config dir, creating it with defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load configuration from `path`, writing defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            let config = Self::default();
            config.save_to(path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the control loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.bluetooth.device_name.trim().is_empty() {
            bail!("bluetooth.device_name must not be empty");
        }
        if self.bluetooth.notify_queue_depth == 0 {
            bail!("bluetooth.notify_queue_depth must be at least 1");
        }
        if self.control.notify_interval_ms == 0 || self.control.attitude_interval_ms == 0 {
            bail!("control intervals must be non-zero");
        }
        if !(self.joystick.max_radius() > 0.0) {
            bail!(
                "joystick outer_diameter ({}) must exceed handle_diameter ({})",
                self.joystick.outer_diameter,
                self.joystick.handle_diameter
            );
        }
        if !(0.0..=1.0).contains(&self.haptic.sharpness) {
            bail!("haptic.sharpness must be within 0-1");
        }
        if !(0.0..1.0).contains(&self.gamepad.deadzone) {
            bail!("gamepad.deadzone must be within 0-1");
        }
        Ok(())
    }
}
