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

//! Shared command vector and control-state fields.

use super::joystick::{Stick, StickOutput};
use super::mode::Mode;
use crate::bluetooth::protocol::ControlFrame;

/// Number of slots in the command vector.
pub const COMMAND_SLOTS: usize = 6;

/// Six-slot motion command sent to the robot.
pub type CommandVector = [f32; COMMAND_SLOTS];

/// Slot indices of the command vector.
pub mod slot {
    /// Forward/back (left stick Y).
    pub const FORWARD: usize = 0;
    /// Left/right strafe (left stick X, inverted).
    pub const STRAFE: usize = 1;
    /// Yaw (right stick Y).
    pub const YAW: usize = 2;
    /// Roll from device attitude.
    pub const ROLL: usize = 3;
    /// Pitch from device attitude.
    pub const PITCH: usize = 4;
    /// Secondary rotate (right stick X, inverted).
    pub const ROTATE: usize = 5;
}

/// Value written to slot 0 by the one-shot mode update.
pub const MODE_UPDATE_SENTINEL: f32 = 100.0;

/// Mutable control state. Owned by the controller task only.
#[derive(Debug, Clone)]
pub struct CommandState {
    vector: CommandVector,
    mode: Option<u8>,
    vibration: f32,
    mode_update_pending: bool,
    sentinel: f32,
}

impl Default for CommandState {
    fn default() -> Self {
        Self::new(MODE_UPDATE_SENTINEL)
    }
}

impl CommandState {
    /// Create a zeroed state using `sentinel` for mode updates.
    pub fn new(sentinel: f32) -> Self {
        Self {
            vector: [0.0; COMMAND_SLOTS],
            mode: None,
            vibration: 0.0,
            mode_update_pending: false,
            sentinel,
        }
    }

    /// Copy of the current command vector.
    pub fn vector(&self) -> CommandVector {
        self.vector
    }

    /// Write a stick output into the slots owned by that stick.
    pub fn apply_stick(&mut self, stick: Stick, output: StickOutput) {
        match stick {
            Stick::Left => {
                self.vector[slot::FORWARD] = output.y;
                self.vector[slot::STRAFE] = -output.x;
            }
            Stick::Right => {
                self.vector[slot::YAW] = output.y;
                self.vector[slot::ROTATE] = -output.x;
            }
        }
    }

    pub fn set_attitude(&mut self, roll: f32, pitch: f32) {
        self.vector[slot::ROLL] = roll;
        self.vector[slot::PITCH] = pitch;
    }

    pub fn clear_attitude(&mut self) {
        self.set_attitude(0.0, 0.0);
    }

    /// Record the mode and vibration of an accepted control frame.
    pub fn set_control(&mut self, frame: &ControlFrame) {
        self.mode = Some(frame.mode);
        self.vibration = frame.vibration;
    }

    /// Last mode received, if any.
    pub fn mode(&self) -> Option<Mode> {
        self.mode.map(Mode::from_byte)
    }

    pub fn vibration(&self) -> f32 {
        self.vibration
    }

    /// Flag a mode update: slot 0 carries the sentinel until the next emitted frame.
    pub fn request_mode_update(&mut self) {
        self.vector[slot::FORWARD] = self.sentinel;
        self.mode_update_pending = true;
    }

    pub fn mode_update_pending(&self) -> bool {
        self.mode_update_pending
    }

    /// Clear a pending mode update. Returns true if one was pending.
    pub fn consume_mode_update(&mut self) -> bool {
        if !self.mode_update_pending {
            return false;
        }
        self.mode_update_pending = false;
        self.vector[slot::FORWARD] = 0.0;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_zeroed() {
        let state = CommandState::default();
        assert_eq!(state.vector(), [0.0; 6]);
        assert_eq!(state.mode(), None);
        assert!(!state.mode_update_pending());
    }

    #[test]
    fn test_stick_slots() {
        let mut state = CommandState::default();

        state.apply_stick(Stick::Left, StickOutput { x: 0.5, y: 0.25 });
        assert_eq!(state.vector(), [0.25, -0.5, 0.0, 0.0, 0.0, 0.0]);

        state.apply_stick(Stick::Right, StickOutput { x: -1.0, y: 0.75 });
        assert_eq!(state.vector(), [0.25, -0.5, 0.75, 0.0, 0.0, 1.0]);

        state.apply_stick(Stick::Left, StickOutput::ZERO);
        assert_eq!(state.vector(), [0.0, 0.0, 0.75, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_mode_update_consumed_once() {
        let mut state = CommandState::default();
        state.apply_stick(Stick::Left, StickOutput { x: 0.0, y: 0.5 });

        state.request_mode_update();
        assert_eq!(state.vector()[slot::FORWARD], 100.0);
        assert!(state.mode_update_pending());

        assert!(state.consume_mode_update());
        assert_eq!(state.vector()[slot::FORWARD], 0.0);
        assert!(!state.mode_update_pending());

        assert!(!state.consume_mode_update());
    }

    #[test]
    fn test_control_fields() {
        let mut state = CommandState::default();
        state.set_control(&ControlFrame::new(42, 0.3));

        assert_eq!(state.mode(), Some(Mode::Invalid(42)));
        assert_eq!(state.vibration(), 0.3);
    }
}
