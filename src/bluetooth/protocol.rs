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

//! Binary wire format shared with the robot.
//!
//! ```text
//! Command frame (read response / notify payload), 24 bytes:
//! [0-3]   : slot 0, forward/back        (f32 little-endian)
//! [4-7]   : slot 1, strafe              (f32 little-endian)
//! [8-11]  : slot 2, yaw                 (f32 little-endian)
//! [12-15] : slot 3, roll (attitude)     (f32 little-endian)
//! [16-19] : slot 4, pitch (attitude)    (f32 little-endian)
//! [20-23] : slot 5, secondary rotate    (f32 little-endian)
//!
//! Control frame (write request), 8 bytes:
//! [0]     : mode (u8)
//! [1-4]   : vibration intensity (f32 little-endian)
//! [5-7]   : reserved
//! ```

use thiserror::Error;

use crate::control::{CommandVector, Mode, COMMAND_SLOTS};

/// Size of an encoded command vector.
pub const COMMAND_FRAME_LEN: usize = 4 * COMMAND_SLOTS;

/// Size of an inbound control frame.
pub const CONTROL_FRAME_LEN: usize = 8;

/// Framing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("malformed frame: expected {expected} bytes, got {actual}")]
    Malformed { expected: usize, actual: usize },

    #[error("read offset {offset} is beyond frame length {len}")]
    InvalidOffset { offset: usize, len: usize },
}

/// Decoded control frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlFrame {
    /// Raw mode byte as sent by the robot.
    pub mode: u8,
    /// Requested vibration intensity.
    pub vibration: f32,
}

impl ControlFrame {
    pub fn new(mode: u8, vibration: f32) -> Self {
        Self { mode, vibration }
    }

    /// Interpret the raw mode byte.
    pub fn mode(&self) -> Mode {
        Mode::from_byte(self.mode)
    }

    /// Encode back into the 8-byte wire shape (reserved bytes zeroed).
    pub fn to_bytes(&self) -> [u8; CONTROL_FRAME_LEN] {
        let mut frame = [0u8; CONTROL_FRAME_LEN];
        frame[0] = self.mode;
        frame[1..5].copy_from_slice(&self.vibration.to_bits().to_le_bytes());
        frame
    }
}

/// Encode the command vector as six little-endian IEEE-754 bit patterns.
pub fn encode_command(vector: &CommandVector) -> [u8; COMMAND_FRAME_LEN] {
    let mut frame = [0u8; COMMAND_FRAME_LEN];
    for (chunk, value) in frame.chunks_exact_mut(4).zip(vector.iter()) {
        chunk.copy_from_slice(&value.to_bits().to_le_bytes());
    }
    frame
}

/// Decode a 24-byte command frame. Used by the central side and by tooling.
pub fn decode_command(bytes: &[u8]) -> Result<CommandVector, FrameError> {
    if bytes.len() != COMMAND_FRAME_LEN {
        return Err(FrameError::Malformed {
            expected: COMMAND_FRAME_LEN,
            actual: bytes.len(),
        });
    }

    let mut vector = [0.0f32; COMMAND_SLOTS];
    for (value, chunk) in vector.iter_mut().zip(bytes.chunks_exact(4)) {
        *value = f32::from_bits(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(vector)
}

/// Decode an inbound control frame. Anything but exactly 8 bytes is rejected.
pub fn decode_control(bytes: &[u8]) -> Result<ControlFrame, FrameError> {
    if bytes.len() != CONTROL_FRAME_LEN {
        return Err(FrameError::Malformed {
            expected: CONTROL_FRAME_LEN,
            actual: bytes.len(),
        });
    }

    let vibration = f32::from_bits(u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]));
    Ok(ControlFrame {
        mode: bytes[0],
        vibration,
    })
}

/// Return the suffix of `frame` starting at `offset` (long reads).
pub fn read_at_offset(frame: &[u8], offset: usize) -> Result<Vec<u8>, FrameError> {
    if offset > frame.len() {
        return Err(FrameError::InvalidOffset {
            offset,
            len: frame.len(),
        });
    }
    Ok(frame[offset..].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let frame = encode_command(&[1.0, -1.0, 0.5, 0.0, 0.25, 100.0]);

        assert_eq!(frame.len(), 24);
        assert_eq!(&frame[0..4], &[0x00, 0x00, 0x80, 0x3f]); // 1.0
        assert_eq!(&frame[4..8], &[0x00, 0x00, 0x80, 0xbf]); // -1.0
        assert_eq!(&frame[8..12], &[0x00, 0x00, 0x00, 0x3f]); // 0.5
        assert_eq!(&frame[12..16], &[0x00; 4]);
        assert_eq!(&frame[20..24], &[0x00, 0x00, 0xc8, 0x42]); // 100.0
    }

    #[test]
    fn test_command_bits_survive() {
        let vector = [
            f32::MIN_POSITIVE,
            -0.0,
            f32::MAX,
            f32::from_bits(0x7fc0_0001), // NaN payload
            -1.0e-40,                   // subnormal
            0.333_333_34,
        ];

        let decoded = decode_command(&encode_command(&vector)).unwrap();
        for (a, b) in vector.iter().zip(decoded.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_decode_control() {
        let mut bytes = [0u8; 8];
        bytes[0] = 6;
        bytes[1..5].copy_from_slice(&0.5f32.to_le_bytes());
        bytes[5..8].copy_from_slice(&[0xaa, 0xbb, 0xcc]); // reserved, ignored

        let frame = decode_control(&bytes).unwrap();
        assert_eq!(frame.mode, 6);
        assert_eq!(frame.mode(), Mode::WholeBodyControlStand);
        assert_eq!(frame.vibration, 0.5);
    }

    #[test]
    fn test_decode_control_keeps_exact_bits() {
        for (mode, bits) in [(0u8, 0u32), (13, 0x3f80_0000), (200, 0xffff_ffff), (255, 0x0000_0001)] {
            let frame = ControlFrame::new(mode, f32::from_bits(bits));
            let decoded = decode_control(&frame.to_bytes()).unwrap();
            assert_eq!(decoded.mode, mode);
            assert_eq!(decoded.vibration.to_bits(), bits);
        }
    }

    #[test]
    fn test_decode_control_wrong_length() {
        for len in (0..32).filter(|len| *len != CONTROL_FRAME_LEN) {
            let bytes = vec![4u8; len];
            assert_eq!(
                decode_control(&bytes),
                Err(FrameError::Malformed {
                    expected: 8,
                    actual: len
                })
            );
        }
    }

    #[test]
    fn test_read_at_offset() {
        let frame = encode_command(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        for offset in 0..=COMMAND_FRAME_LEN {
            let suffix = read_at_offset(&frame, offset).unwrap();
            assert_eq!(suffix, frame[offset..].to_vec());
        }
        assert!(read_at_offset(&frame, 24).unwrap().is_empty());

        assert_eq!(
            read_at_offset(&frame, 25),
            Err(FrameError::InvalidOffset { offset: 25, len: 24 })
        );
        assert!(read_at_offset(&frame, usize::MAX).is_err());
    }
}
