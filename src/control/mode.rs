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

//! Robot operating modes and the side effects a mode change has on the controller.

use std::time::Duration;

use super::haptic::{HapticPulse, PulseKind};
use crate::bluetooth::protocol::ControlFrame;
use crate::config::HapticConfig;

/// Status shown for a mode byte outside 0-13.
pub const INVALID_MODE_STATUS: &str = "Invalid SThexa Mode! Please Update!";

/// SThexa operating mode as reported by the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Init,
    GravityCompensation,
    Homing,
    TaskSpaceTransition,
    TaskSpaceControl,
    WholeBodyTransition,
    WholeBodyControlStand,
    WholeBodyControlWalking,
    UnifiedLocomotionTripod,
    UnifiedLocomotionRipple,
    UnifiedLocomotionWave,
    InverseKinematics,
    IkWalkingPattern,
    Finish,
    /// Any byte outside the known range.
    Invalid(u8),
}

impl Mode {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::Init,
            1 => Self::GravityCompensation,
            2 => Self::Homing,
            3 => Self::TaskSpaceTransition,
            4 => Self::TaskSpaceControl,
            5 => Self::WholeBodyTransition,
            6 => Self::WholeBodyControlStand,
            7 => Self::WholeBodyControlWalking,
            8 => Self::UnifiedLocomotionTripod,
            9 => Self::UnifiedLocomotionRipple,
            10 => Self::UnifiedLocomotionWave,
            11 => Self::InverseKinematics,
            12 => Self::IkWalkingPattern,
            13 => Self::Finish,
            other => Self::Invalid(other),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Init => 0,
            Self::GravityCompensation => 1,
            Self::Homing => 2,
            Self::TaskSpaceTransition => 3,
            Self::TaskSpaceControl => 4,
            Self::WholeBodyTransition => 5,
            Self::WholeBodyControlStand => 6,
            Self::WholeBodyControlWalking => 7,
            Self::UnifiedLocomotionTripod => 8,
            Self::UnifiedLocomotionRipple => 9,
            Self::UnifiedLocomotionWave => 10,
            Self::InverseKinematics => 11,
            Self::IkWalkingPattern => 12,
            Self::Finish => 13,
            Self::Invalid(byte) => *byte,
        }
    }

    /// Human-readable label, `None` for invalid modes.
    pub fn label(&self) -> Option<&'static str> {
        let label = match self {
            Self::Init => "INIT",
            Self::GravityCompensation => "GRAVITY COMPENSATION",
            Self::Homing => "HOMING",
            Self::TaskSpaceTransition => "TASK SPACE TRANSITION",
            Self::TaskSpaceControl => "TASK SPACE CONTROL",
            Self::WholeBodyTransition => "WHOLE BODY TRANSITION",
            Self::WholeBodyControlStand => "WHOLE BODY CONTROL STAND",
            Self::WholeBodyControlWalking => "WHOLE BODY CONTROL WALKING",
            Self::UnifiedLocomotionTripod => "UNIFIED LOCOMOTION TRIPOD",
            Self::UnifiedLocomotionRipple => "UNIFIED LOCOMOTION RIPPLE",
            Self::UnifiedLocomotionWave => "UNIFIED LOCOMOTION WAVE",
            Self::InverseKinematics => "INVERSE KINEMATICS",
            Self::IkWalkingPattern => "IK WALKING PATTERN",
            Self::Finish => "FINISH",
            Self::Invalid(_) => return None,
        };
        Some(label)
    }

    /// Status line shown to the user.
    pub fn status_text(&self) -> String {
        match self.label() {
            Some(label) => format!("[Mode] {}", label),
            None => INVALID_MODE_STATUS.to_string(),
        }
    }

    /// Attitude is streamed into slots 3-4 only while standing under whole-body control.
    pub fn samples_attitude(&self) -> bool {
        matches!(self, Self::WholeBodyControlStand)
    }
}

/// Side effects of one accepted control frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeEffects {
    pub mode: Mode,
    pub status: String,
    pub attitude_sampling: bool,
    pub haptic: Option<HapticPulse>,
}

/// Maps an accepted control frame to its side effects.
#[derive(Debug, Clone, Copy)]
pub struct ModeEffectPolicy {
    sharpness: f32,
    duration: Duration,
    clamp_intensity: bool,
}

impl Default for ModeEffectPolicy {
    fn default() -> Self {
        Self::new(&HapticConfig::default())
    }
}

impl ModeEffectPolicy {
    pub fn new(config: &HapticConfig) -> Self {
        Self {
            sharpness: config.sharpness,
            duration: Duration::from_millis(config.duration_ms),
            clamp_intensity: config.clamp_intensity,
        }
    }

    pub fn evaluate(&self, frame: &ControlFrame) -> ModeEffects {
        let mode = frame.mode();
        ModeEffects {
            mode,
            status: mode.status_text(),
            attitude_sampling: mode.samples_attitude(),
            haptic: self.pulse_for(frame.vibration),
        }
    }

    /// One continuous pulse per frame with positive vibration.
    fn pulse_for(&self, vibration: f32) -> Option<HapticPulse> {
        // NaN compares false and is dropped here too
        if !(vibration > 0.0) {
            return None;
        }

        let intensity = if self.clamp_intensity {
            vibration.min(1.0)
        } else {
            vibration
        };

        Some(HapticPulse {
            intensity,
            sharpness: self.sharpness,
            duration: self.duration,
            kind: PulseKind::Continuous,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_bytes() {
        for byte in 0..=u8::MAX {
            assert_eq!(Mode::from_byte(byte).as_byte(), byte);
        }
        assert_eq!(Mode::from_byte(13), Mode::Finish);
        assert_eq!(Mode::from_byte(14), Mode::Invalid(14));
    }

    #[test]
    fn test_status_text() {
        assert_eq!(Mode::Init.status_text(), "[Mode] INIT");
        assert_eq!(Mode::TaskSpaceControl.label(), Some("TASK SPACE CONTROL"));
        assert_eq!(Mode::IkWalkingPattern.label(), Some("IK WALKING PATTERN"));
        assert_eq!(Mode::Invalid(99).status_text(), INVALID_MODE_STATUS);

        for byte in 0..=13u8 {
            assert!(Mode::from_byte(byte).label().is_some());
        }
    }

    #[test]
    fn test_task_space_control_frame() {
        let effects = ModeEffectPolicy::default().evaluate(&ControlFrame::new(4, 0.0));

        assert_eq!(effects.mode, Mode::TaskSpaceControl);
        assert_eq!(effects.status, "[Mode] TASK SPACE CONTROL");
        assert!(!effects.attitude_sampling);
        assert_eq!(effects.haptic, None);
    }

    #[test]
    fn test_stand_frame_with_vibration() {
        let effects = ModeEffectPolicy::default().evaluate(&ControlFrame::new(6, 0.5));

        assert_eq!(effects.status, "[Mode] WHOLE BODY CONTROL STAND");
        assert!(effects.attitude_sampling);

        let pulse = effects.haptic.unwrap();
        assert_eq!(pulse.intensity, 0.5);
        assert_eq!(pulse.sharpness, 0.1);
        assert_eq!(pulse.duration, Duration::from_millis(500));
        assert_eq!(pulse.kind, PulseKind::Continuous);
    }

    #[test]
    fn test_non_positive_vibration_is_silent() {
        let policy = ModeEffectPolicy::default();
        for vibration in [0.0, -0.0, -1.0, f32::NAN] {
            assert_eq!(policy.evaluate(&ControlFrame::new(2, vibration)).haptic, None);
        }
    }

    #[test]
    fn test_intensity_clamp() {
        let clamped = ModeEffectPolicy::default();
        assert_eq!(clamped.evaluate(&ControlFrame::new(0, 3.0)).haptic.unwrap().intensity, 1.0);

        let passthrough = ModeEffectPolicy::new(&HapticConfig {
            clamp_intensity: false,
            ..HapticConfig::default()
        });
        assert_eq!(passthrough.evaluate(&ControlFrame::new(0, 3.0)).haptic.unwrap().intensity, 3.0);
    }

    #[test]
    fn test_invalid_mode_disables_sampling() {
        let effects = ModeEffectPolicy::default().evaluate(&ControlFrame::new(200, 0.2));
        assert_eq!(effects.status, INVALID_MODE_STATUS);
        assert!(!effects.attitude_sampling);
        assert!(effects.haptic.is_some());
    }
}
