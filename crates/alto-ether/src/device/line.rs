// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Physical-layer model of the Alto Ethernet line.
//!
//! The line idles high. A frame is a sync bit followed by the frame bits,
//! MSB first, each as two half-bit levels, and a closing high half-bit:
//!
//! ```text
//!   sync    1      0      ...    end
//!  ‾‾‾|_ _|‾‾‾|___|‾‾‾|  ...  |‾‾‾‾‾‾‾‾ idle
//!    1  0   1   0   0   1
//! ```

use crate::config::RECV_WIDTH_NS;

/// Half-bit levels the transmitter drives for `frame`.
pub fn manchester_levels(frame: &[u8]) -> Vec<u8> {
    let mut levels = Vec::with_capacity(frame.len() * 16 + 3);
    levels.extend_from_slice(&[1, 0]);
    for &byte in frame {
        for bit in (0..8).rev() {
            if (byte >> bit) & 1 == 1 {
                levels.extend_from_slice(&[1, 0]);
            } else {
                levels.extend_from_slice(&[0, 1]);
            }
        }
    }
    levels.push(1);
    levels
}

/// Durations (in 2 ns samples) a receiver records for `levels`.
///
/// Timing starts at the first falling edge (the middle of the sync bit).
/// The final high run merges with the idle line and ends in a timeout, so it
/// is not reported. Widths beyond one sample byte saturate.
pub fn levels_to_durations(levels: &[u8], half_bit_ns: u32) -> Vec<u8> {
    let mut runs: Vec<u32> = Vec::new();
    let mut iter = levels.iter().copied();
    let Some(mut current) = iter.next() else {
        return Vec::new();
    };
    let mut run = 1u32;
    for level in iter {
        if level == current {
            run += 1;
        } else {
            runs.push(run);
            current = level;
            run = 1;
        }
    }

    // Leading high run is indistinguishable from idle.
    let start = usize::from(levels[0] == 1);
    let end = if current == 1 { runs.len() } else { runs.len() + 1 };
    runs.push(run);

    runs.get(start..end)
        .unwrap_or(&[])
        .iter()
        .map(|&n| {
            let samples = n * half_bit_ns / RECV_WIDTH_NS;
            u8::try_from(samples).unwrap_or(u8::MAX)
        })
        .collect()
}

/// Convenience: what the receiver records for a frame sent at `half_bit_ns`.
pub fn frame_durations(frame: &[u8], half_bit_ns: u32) -> Vec<u8> {
    levels_to_durations(&manchester_levels(frame), half_bit_ns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HALF_BIT_NS;

    #[test]
    fn test_levels_of_one_byte() {
        let levels = manchester_levels(&[0b1000_0001]);
        assert_eq!(
            levels,
            vec![1, 0, 1, 0, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 1, 0, 1]
        );
    }

    #[test]
    fn test_durations_skip_idle_runs() {
        // sync, one 1 bit, closing high
        let durations = levels_to_durations(&[1, 0, 1, 0, 1], HALF_BIT_NS);
        assert_eq!(durations, vec![85, 85, 85]);
    }

    #[test]
    fn test_durations_merge_equal_levels() {
        // sync, bit 0: 0 then 1, closing high merges with the last half
        let durations = levels_to_durations(&[1, 0, 0, 1, 1], HALF_BIT_NS);
        assert_eq!(durations, vec![170]);
    }

    #[test]
    fn test_saturates_long_widths() {
        assert_eq!(levels_to_durations(&[1, 0, 0, 0, 0, 1], 200), vec![255]);
    }

    #[test]
    fn test_empty_levels() {
        assert!(levels_to_durations(&[], HALF_BIT_NS).is_empty());
    }

    #[test]
    fn test_frame_durations_decode() {
        let frame = crate::codec::encode(&[0x12, 0x34]).unwrap();
        let durations = frame_durations(frame.as_bytes(), HALF_BIT_NS);
        let decoded = crate::codec::decode(&durations).unwrap();
        assert_eq!(decoded, frame);
    }
}
