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

//! evdev gamepad backend.
//!
//! Absolute axis events are collected per stick and flushed on each
//! `SYN_REPORT`. The left stick uses `ABS_X`/`ABS_Y`, the right stick
//! `ABS_RX`/`ABS_RY`. evdev reports y growing downwards, so it is inverted to
//! match the on-screen sticks. Inside the deadzone a stick reports an explicit
//! centre.

use anyhow::{Context, Result};
use evdev::{AbsoluteAxisCode, Device, EventType, InputEvent, SynchronizationCode};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::GamepadConfig;
use crate::control::{Stick, StickOutput};
use crate::controller::ControllerHandle;

/// Raw range of one absolute axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
}

impl AxisRange {
    /// Signed 16-bit range used by most pads.
    pub const I16: AxisRange = AxisRange {
        min: i16::MIN as i32,
        max: i16::MAX as i32,
    };

    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Map a raw value to `[-1, 1]` around the range centre.
    pub fn normalize(&self, value: i32) -> f32 {
        let half = (self.max as f32 - self.min as f32) / 2.0;
        if half <= 0.0 {
            return 0.0;
        }
        let centre = self.min as f32 + half;
        ((value as f32 - centre) / half).clamp(-1.0, 1.0)
    }
}

/// New position for one stick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StickUpdate {
    pub stick: Stick,
    pub output: StickOutput,
}

#[derive(Debug, Clone)]
struct StickAxes {
    stick: Stick,
    x_code: AbsoluteAxisCode,
    y_code: AbsoluteAxisCode,
    x_range: AxisRange,
    y_range: AxisRange,
    x: f32,
    y: f32,
    dirty: bool,
    sent: StickOutput,
}

impl StickAxes {
    fn new(stick: Stick, x_code: AbsoluteAxisCode, y_code: AbsoluteAxisCode) -> Self {
        Self {
            stick,
            x_code,
            y_code,
            x_range: AxisRange::I16,
            y_range: AxisRange::I16,
            x: 0.0,
            y: 0.0,
            dirty: false,
            sent: StickOutput::ZERO,
        }
    }

    fn set_range(&mut self, code: AbsoluteAxisCode, range: AxisRange) {
        if code == self.x_code {
            self.x_range = range;
        } else if code == self.y_code {
            self.y_range = range;
        }
    }

    fn apply(&mut self, code: AbsoluteAxisCode, value: i32) -> bool {
        if code == self.x_code {
            self.x = self.x_range.normalize(value);
        } else if code == self.y_code {
            self.y = -self.y_range.normalize(value);
        } else {
            return false;
        }
        self.dirty = true;
        true
    }

    fn flush(&mut self, deadzone: f32) -> Option<StickUpdate> {
        if !std::mem::take(&mut self.dirty) {
            return None;
        }
        let output = if self.x.hypot(self.y) < deadzone {
            StickOutput::ZERO
        } else {
            StickOutput::normalized(self.x, self.y)
        };
        self.emit(output)
    }

    fn emit(&mut self, output: StickOutput) -> Option<StickUpdate> {
        if output == self.sent {
            return None;
        }
        self.sent = output;
        Some(StickUpdate {
            stick: self.stick,
            output,
        })
    }
}

/// Turns raw evdev events into stick updates.
#[derive(Debug, Clone)]
pub struct GamepadMapper {
    deadzone: f32,
    left: StickAxes,
    right: StickAxes,
}

impl GamepadMapper {
    pub fn new(deadzone: f32) -> Self {
        Self {
            deadzone,
            left: StickAxes::new(Stick::Left, AbsoluteAxisCode::ABS_X, AbsoluteAxisCode::ABS_Y),
            right: StickAxes::new(Stick::Right, AbsoluteAxisCode::ABS_RX, AbsoluteAxisCode::ABS_RY),
        }
    }

    /// Use the device's reported range for `code`.
    pub fn set_range(&mut self, code: AbsoluteAxisCode, range: AxisRange) {
        self.left.set_range(code, range);
        self.right.set_range(code, range);
    }

    /// Feed one event. Updates are only produced on `SYN_REPORT`.
    pub fn on_event(&mut self, event: &InputEvent) -> Vec<StickUpdate> {
        let event_type = event.event_type();
        if event_type == EventType::ABSOLUTE {
            let code = AbsoluteAxisCode(event.code());
            if !self.left.apply(code, event.value()) {
                self.right.apply(code, event.value());
            }
            Vec::new()
        } else if event_type == EventType::SYNCHRONIZATION
            && event.code() == SynchronizationCode::SYN_REPORT.0
        {
            let deadzone = self.deadzone;
            [self.left.flush(deadzone), self.right.flush(deadzone)]
                .into_iter()
                .flatten()
                .collect()
        } else {
            Vec::new()
        }
    }

    /// Centre both sticks, e.g. when the device goes away.
    pub fn release_all(&mut self) -> Vec<StickUpdate> {
        [
            self.left.emit(StickOutput::ZERO),
            self.right.emit(StickOutput::ZERO),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Deliver stick updates to the controller.
pub async fn forward_updates(handle: &ControllerHandle, updates: Vec<StickUpdate>) {
    for update in updates {
        debug!(
            "{} stick -> ({:.2}, {:.2})",
            update.stick.as_str(),
            update.output.x,
            update.output.y
        );
        handle
            .joystick_input(update.stick, update.output.x, update.output.y)
            .await;
    }
}

fn has_two_sticks(device: &Device) -> bool {
    device.supported_absolute_axes().is_some_and(|axes| {
        axes.contains(AbsoluteAxisCode::ABS_X) && axes.contains(AbsoluteAxisCode::ABS_RX)
    })
}

/// An opened evdev gamepad.
pub struct GamepadSource {
    path: PathBuf,
    device: Device,
    mapper: GamepadMapper,
}

impl GamepadSource {
    /// Open the configured device, or the first one with two sticks.
    pub fn open(config: &GamepadConfig) -> Result<Option<Self>> {
        let found = match &config.device_path {
            Some(path) => {
                let path = PathBuf::from(path);
                let device = Device::open(&path)
                    .with_context(|| format!("opening {}", path.display()))?;
                Some((path, device))
            }
            None => evdev::enumerate().find(|(_, device)| has_two_sticks(device)),
        };

        let Some((path, device)) = found else {
            return Ok(None);
        };

        let mut mapper = GamepadMapper::new(config.deadzone);
        for (code, info) in device.get_absinfo()? {
            mapper.set_range(code, AxisRange::new(info.minimum(), info.maximum()));
        }

        info!(
            "Gamepad: {} ({})",
            device.name().unwrap_or("unnamed"),
            path.display()
        );
        Ok(Some(Self {
            path,
            device,
            mapper,
        }))
    }

    /// Stream events until the device disappears. Sticks are centred on exit.
    pub async fn run(self, handle: &ControllerHandle) -> Result<()> {
        let Self {
            path,
            device,
            mut mapper,
        } = self;
        let mut events = device.into_event_stream()?;

        loop {
            match events.next_event().await {
                Ok(event) => forward_updates(handle, mapper.on_event(&event)).await,
                Err(e) => {
                    warn!("Gamepad {} lost: {}", path.display(), e);
                    forward_updates(handle, mapper.release_all()).await;
                    return Err(e.into());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abs(code: AbsoluteAxisCode, value: i32) -> InputEvent {
        InputEvent::new(EventType::ABSOLUTE.0, code.0, value)
    }

    fn syn() -> InputEvent {
        InputEvent::new(
            EventType::SYNCHRONIZATION.0,
            SynchronizationCode::SYN_REPORT.0,
            0,
        )
    }

    #[test]
    fn test_axis_range_normalize() {
        let range = AxisRange::new(0, 255);
        assert_eq!(range.normalize(0), -1.0);
        assert_eq!(range.normalize(255), 1.0);
        assert!(range.normalize(128).abs() < 0.01);
        assert_eq!(AxisRange::new(5, 5).normalize(5), 0.0);
        assert_eq!(AxisRange::I16.normalize(i16::MAX as i32), 1.0);
    }

    #[test]
    fn test_updates_wait_for_sync() {
        let mut mapper = GamepadMapper::new(0.1);
        assert!(mapper.on_event(&abs(AbsoluteAxisCode::ABS_X, 32767)).is_empty());

        let updates = mapper.on_event(&syn());
        assert_eq!(
            updates,
            vec![StickUpdate {
                stick: Stick::Left,
                output: StickOutput { x: 1.0, y: 0.0 },
            }]
        );
    }

    #[test]
    fn test_y_axis_inverted() {
        let mut mapper = GamepadMapper::new(0.1);
        mapper.on_event(&abs(AbsoluteAxisCode::ABS_RY, i16::MIN as i32));
        let updates = mapper.on_event(&syn());
        assert_eq!(updates[0].stick, Stick::Right);
        assert_eq!(updates[0].output, StickOutput { x: 0.0, y: 1.0 });
    }

    #[test]
    fn test_deadzone_reports_explicit_centre() {
        let mut mapper = GamepadMapper::new(0.1);
        mapper.on_event(&abs(AbsoluteAxisCode::ABS_X, 20000));
        mapper.on_event(&syn());

        mapper.on_event(&abs(AbsoluteAxisCode::ABS_X, 1000));
        let updates = mapper.on_event(&syn());
        assert_eq!(
            updates,
            vec![StickUpdate {
                stick: Stick::Left,
                output: StickOutput::ZERO,
            }]
        );

        // Jitter inside the deadzone is not resent.
        mapper.on_event(&abs(AbsoluteAxisCode::ABS_X, -800));
        assert!(mapper.on_event(&syn()).is_empty());
    }

    #[test]
    fn test_device_range_used() {
        let mut mapper = GamepadMapper::new(0.0);
        mapper.set_range(AbsoluteAxisCode::ABS_X, AxisRange::new(0, 255));
        mapper.on_event(&abs(AbsoluteAxisCode::ABS_X, 0));
        assert_eq!(mapper.on_event(&syn())[0].output.x, -1.0);
    }

    #[test]
    fn test_release_all_centres_moved_sticks() {
        let mut mapper = GamepadMapper::new(0.1);
        mapper.on_event(&abs(AbsoluteAxisCode::ABS_RX, 32767));
        mapper.on_event(&syn());

        assert_eq!(
            mapper.release_all(),
            vec![StickUpdate {
                stick: Stick::Right,
                output: StickOutput::ZERO,
            }]
        );
        assert!(mapper.release_all().is_empty());
    }

    #[test]
    fn test_unrelated_axes_ignored() {
        let mut mapper = GamepadMapper::new(0.1);
        mapper.on_event(&abs(AbsoluteAxisCode::ABS_Z, 255));
        assert!(mapper.on_event(&syn()).is_empty());
    }
}
