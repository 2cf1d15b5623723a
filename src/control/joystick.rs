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

//! On-screen joystick to command mapping.
//!
//! A drag translation is clamped to the ring of radius `R` around the
//! stick centre and then normalized to `[-1, 1]` with Y pointing up.

use serde::{Deserialize, Serialize};

/// Which stick an input belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stick {
    /// Drives slots 0 and 1.
    Left,
    /// Drives slots 2 and 5.
    Right,
}

impl Stick {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stick::Left => "left",
            Stick::Right => "right",
        }
    }
}

/// Normalized stick position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StickOutput {
    pub x: f32,
    pub y: f32,
}

impl StickOutput {
    pub const ZERO: StickOutput = StickOutput { x: 0.0, y: 0.0 };

    /// Build from an already-normalized callback value, clamped to `[-1, 1]`.
    pub fn normalized(x: f32, y: f32) -> Self {
        let clamp = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(-1.0, 1.0) };
        Self {
            x: clamp(x),
            y: clamp(y),
        }
    }
}

/// Clamp a drag offset radially to `max_radius`, keeping its direction.
pub fn clamp_offset(dx: f32, dy: f32, max_radius: f32) -> (f32, f32) {
    let distance = (dx * dx + dy * dy).sqrt();
    if distance <= max_radius {
        return (dx, dy);
    }

    let angle = dy.atan2(dx);
    (max_radius * angle.cos(), max_radius * angle.sin())
}

/// Stateful mapper for a single stick.
#[derive(Debug, Clone)]
pub struct JoystickMapper {
    stick: Stick,
    max_radius: f32,
    offset: (f32, f32),
}

impl JoystickMapper {
    /// `max_radius` must be positive; see `JoystickConfig::max_radius`.
    pub fn new(stick: Stick, max_radius: f32) -> Self {
        Self {
            stick,
            max_radius,
            offset: (0.0, 0.0),
        }
    }

    pub fn stick(&self) -> Stick {
        self.stick
    }

    pub fn max_radius(&self) -> f32 {
        self.max_radius
    }

    /// Current handle offset in widget units.
    pub fn offset(&self) -> (f32, f32) {
        self.offset
    }

    /// Handle a drag translation and return the normalized output.
    pub fn drag(&mut self, dx: f32, dy: f32) -> StickOutput {
        let or_zero = |v: f32| if v.is_nan() { 0.0 } else { v };
        self.offset = clamp_offset(or_zero(dx), or_zero(dy), self.max_radius);
        StickOutput {
            x: self.offset.0 / self.max_radius,
            y: -self.offset.1 / self.max_radius,
        }
    }

    /// Drag ended: handle springs back to the centre.
    pub fn release(&mut self) -> StickOutput {
        self.offset = (0.0, 0.0);
        StickOutput::ZERO
    }
}
