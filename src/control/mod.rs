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

//! Control state: command vector, joystick mapping, mode effects and
//! the periodic tasks that feed them.

pub mod attitude;
pub mod command;
pub mod haptic;
pub mod joystick;
pub mod mode;
pub mod periodic;

pub use attitude::{Attitude, AttitudeSampler, AttitudeSource, NoAttitude, SharedAttitude};
pub use command::{slot, CommandState, CommandVector, COMMAND_SLOTS, MODE_UPDATE_SENTINEL};
pub use haptic::{HapticEngine, HapticError, HapticPulse, LoggingHaptics, NoHaptics, PulseKind};
pub use joystick::{clamp_offset, JoystickMapper, Stick, StickOutput};
pub use mode::{Mode, ModeEffectPolicy, ModeEffects, INVALID_MODE_STATUS};
pub use periodic::PeriodicTask;
