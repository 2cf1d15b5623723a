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

//! Haptic feedback abstraction.
//!
//! Haptics are best effort: callers log a `HapticError` and carry on.

use std::time::Duration;

use thiserror::Error;
use tracing::info;

/// Haptic event shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseKind {
    Continuous,
    Transient,
}

/// A single haptic pulse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HapticPulse {
    pub intensity: f32,
    pub sharpness: f32,
    pub duration: Duration,
    pub kind: PulseKind,
}

impl HapticPulse {
    /// Reject pulses no engine can render.
    pub fn validate(&self) -> Result<(), HapticError> {
        if !self.intensity.is_finite() || self.intensity < 0.0 {
            return Err(HapticError::PatternRejected(format!(
                "intensity {} out of range",
                self.intensity
            )));
        }
        if !(0.0..=1.0).contains(&self.sharpness) {
            return Err(HapticError::PatternRejected(format!(
                "sharpness {} out of range",
                self.sharpness
            )));
        }
        if self.kind == PulseKind::Continuous && self.duration.is_zero() {
            return Err(HapticError::PatternRejected(
                "continuous pulse needs a duration".to_string(),
            ));
        }
        Ok(())
    }
}

/// Haptic failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HapticError {
    #[error("haptic engine unavailable")]
    EngineUnavailable,

    #[error("haptic pattern rejected: {0}")]
    PatternRejected(String),
}

/// Trait for haptic backends.
pub trait HapticEngine: Send {
    /// Backend name for logs.
    fn backend_name(&self) -> &'static str;

    /// Whether the hardware can play anything at all.
    fn is_available(&self) -> bool;

    /// Play a pulse.
    fn play(&mut self, pulse: &HapticPulse) -> Result<(), HapticError>;
}

/// Backend for hosts without an actuator: validates and logs each pulse.
pub struct LoggingHaptics {
    played: u64,
}

impl LoggingHaptics {
    pub fn new() -> Self {
        Self { played: 0 }
    }

    pub fn played(&self) -> u64 {
        self.played
    }
}

impl Default for LoggingHaptics {
    fn default() -> Self {
        Self::new()
    }
}

impl HapticEngine for LoggingHaptics {
    fn backend_name(&self) -> &'static str {
        "Logging (no actuator)"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn play(&mut self, pulse: &HapticPulse) -> Result<(), HapticError> {
        pulse.validate()?;
        self.played += 1;
        info!(
            "[HAPTIC] {:?} pulse: intensity={:.2} sharpness={:.2} duration={:?}",
            pulse.kind, pulse.intensity, pulse.sharpness, pulse.duration
        );
        Ok(())
    }
}

/// Backend used when no haptic engine could be started.
pub struct NoHaptics;

impl HapticEngine for NoHaptics {
    fn backend_name(&self) -> &'static str {
        "None"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn play(&mut self, _pulse: &HapticPulse) -> Result<(), HapticError> {
        Err(HapticError::EngineUnavailable)
    }
}
