//! Acknowledgment frames.
//!
//! The echo side answers every read with the number of bytes it just
//! consumed, written as ASCII decimal digits right-aligned in an 8-byte
//! field. The unused leading bytes are NUL (`0x00`), not the character
//! `'0'`. Decoding strips NUL bytes from both ends before parsing.

use crate::error::{MeterError, Result};
use crate::params::ACK_FRAME_LEN;

/// One encoded acknowledgment.
pub type AckFrame = [u8; ACK_FRAME_LEN];

/// Encode `count` into a NUL-padded frame.
///
/// Fails with [`MeterError::AckOverflow`] if `count` needs more than 8 digits.
pub fn encode(count: usize) -> Result<AckFrame> {
    let digits = count.to_string();
    if digits.len() > ACK_FRAME_LEN {
        return Err(MeterError::AckOverflow(count));
    }
    let mut frame = [0u8; ACK_FRAME_LEN];
    frame[ACK_FRAME_LEN - digits.len()..].copy_from_slice(digits.as_bytes());
    Ok(frame)
}

/// Decode a frame into a byte count.
///
/// Returns `None` for anything that is not a decimal number once NUL
/// padding is removed.
pub fn decode(frame: &[u8]) -> Option<usize> {
    let start = frame.iter().position(|&b| b != 0)?;
    let end = frame.iter().rposition(|&b| b != 0)? + 1;
    std::str::from_utf8(&frame[start..end]).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_with_nul_bytes() {
        let frame = encode(1_048_576).unwrap();
        assert_eq!(&frame, b"\x001048576");

        let frame = encode(1).unwrap();
        assert_eq!(&frame, b"\0\0\0\0\0\0\01");
    }

    #[test]
    fn full_width_frame() {
        let frame = encode(67_108_864).unwrap();
        assert_eq!(&frame, b"67108864");
        assert_eq!(decode(&frame), Some(67_108_864));
    }

    #[test]
    fn decodes_every_power_of_two_and_neighbours() {
        let mut count = 1usize;
        while count <= 64 * 1024 * 1024 {
            for c in [count - 1, count, count + 1] {
                assert_eq!(decode(&encode(c).unwrap()), Some(c), "count {c}");
            }
            count *= 2;
        }
    }

    #[test]
    fn decodes_strided_range() {
        for c in (0..=64 * 1024 * 1024).step_by(9_973) {
            assert_eq!(decode(&encode(c).unwrap()), Some(c));
        }
    }

    #[test]
    fn zero_is_encodable() {
        assert_eq!(decode(&encode(0).unwrap()), Some(0));
    }

    #[test]
    fn overflow_is_rejected() {
        assert!(matches!(
            encode(100_000_000),
            Err(MeterError::AckOverflow(100_000_000))
        ));
    }

    #[test]
    fn malformed_frames() {
        assert_eq!(decode(&[0u8; 8]), None);
        assert_eq!(decode(b"\0\0\0\0abcd"), None);
        assert_eq!(decode(b"\0\0\0-1234"), None);
        assert_eq!(decode(&[0xff; 8]), None);
    }

    #[test]
    fn trailing_padding_is_stripped() {
        assert_eq!(decode(b"512\0\0\0\0\0"), Some(512));
    }
}
