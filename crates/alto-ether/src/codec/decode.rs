// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Duration sequence -> frame.

use super::Frame;
use crate::config::{
    AMBIGUOUS_LOW_NS, CRC_LEN, LEVEL_BUFFER_LEN, MAX_FULL_BIT_NS, MAX_PUP_LENGTH, MIN_FULL_BIT_NS,
    MIN_HALF_BIT_NS, RECV_WIDTH_NS,
};
use crate::crc::crc16;
use crate::error::{DecodeError, FramingError};

/// Classification of the time between two transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// Below 120 ns.
    TooShort,
    /// 120..230 ns: one half-bit.
    Half,
    /// 230..280 ns: neither one nor two half-bits.
    Ambiguous,
    /// 280..400 ns: two half-bits at the same level.
    Full,
    /// 400 ns and above.
    TooLong,
}

/// Classify a pulse width in nanoseconds.
#[must_use]
pub fn classify_width(width_ns: u32) -> Width {
    if width_ns < MIN_HALF_BIT_NS {
        Width::TooShort
    } else if width_ns < AMBIGUOUS_LOW_NS {
        Width::Half
    } else if width_ns < MIN_FULL_BIT_NS {
        Width::Ambiguous
    } else if width_ns < MAX_FULL_BIT_NS {
        Width::Full
    } else {
        Width::TooLong
    }
}

/// Expand raw durations (2 ns units) into half-bit line levels.
///
/// The line idles high, so the running level starts at 1 and every
/// transition toggles it. `levels` is cleared first.
pub fn expand_durations(durations: &[u8], levels: &mut Vec<u8>) -> Result<(), FramingError> {
    levels.clear();
    let len = durations.len();
    let mut level = 1u8;

    for (index, &sample) in durations.iter().enumerate() {
        let width_ns = u32::from(sample) * RECV_WIDTH_NS;
        match classify_width(width_ns) {
            Width::Half => {
                level ^= 1;
                levels.push(level);
            }
            Width::Full => {
                level ^= 1;
                levels.push(level);
                levels.push(level);
            }
            Width::TooShort => {
                return Err(FramingError::WidthTooShort {
                    width_ns,
                    index,
                    len,
                })
            }
            Width::Ambiguous => {
                return Err(FramingError::AmbiguousWidth {
                    width_ns,
                    index,
                    len,
                })
            }
            Width::TooLong => {
                return Err(FramingError::WidthTooLong {
                    width_ns,
                    index,
                    len,
                })
            }
        }
    }
    Ok(())
}

/// Pair half-bit levels into bytes, MSB first.
///
/// Index 0 is the second half of the sync bit and is skipped. A pair with no
/// mid-bit transition is a bit error: it is logged and read as 0, leaving
/// the CRC to reject the frame. `bytes` is cleared first.
///
/// A trailing 0 bit loses its final high half into the idle line, so an even
/// number of levels gets a synthetic 1 appended.
pub fn pack_levels(
    levels: &mut Vec<u8>,
    bytes: &mut Vec<u8>,
    capacity: usize,
) -> Result<(), DecodeError> {
    bytes.clear();
    if levels.len() % 2 == 0 {
        levels.push(1);
    }
    let total = levels.len();

    let mut byte = 0u8;
    let mut i = 1;
    while i < total {
        let (first, second) = (levels[i], levels[i + 1]);
        if first == second {
            log::debug!(
                "[RX] bad bit sequence at {} of {}: {} {}",
                i,
                total,
                first,
                second
            );
            byte <<= 1;
        } else {
            byte = (byte << 1) | first;
        }
        if i % 16 == 15 {
            bytes.push(byte);
            if bytes.len() >= capacity {
                return Err(DecodeError::Overflow { capacity });
            }
            byte = 0;
        }
        i += 2;
    }

    if total % 16 != 1 {
        return Err(FramingError::Misaligned { half_bits: total }.into());
    }
    Ok(())
}

/// Verify the trailing CRC of a packed frame.
fn check_crc(bytes: &[u8]) -> Result<(), FramingError> {
    let n = bytes.len();
    if n < CRC_LEN {
        return Err(FramingError::TooShort { bytes: n });
    }
    if n % 2 != 0 {
        return Err(FramingError::OddLength { bytes: n });
    }
    let computed = crc16(&bytes[..n - CRC_LEN]);
    let received = u16::from_be_bytes([bytes[n - 2], bytes[n - 1]]);
    if computed != received {
        return Err(FramingError::CrcMismatch { computed, received });
    }
    Ok(())
}

/// Frame decoder with preallocated scratch buffers.
pub struct Decoder {
    levels: Vec<u8>,
    bytes: Vec<u8>,
    capacity: usize,
}

impl Decoder {
    /// Decoder bounded by [`MAX_PUP_LENGTH`].
    pub fn new() -> Self {
        Self::with_capacity(MAX_PUP_LENGTH)
    }

    /// Decoder that rejects frames reaching `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            levels: Vec::with_capacity(LEVEL_BUFFER_LEN.max(16 * capacity + 2)),
            bytes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Decode one received duration sequence.
    ///
    /// No partial frame is ever returned: any framing fault discards the
    /// whole sequence.
    pub fn decode(&mut self, durations: &[u8]) -> Result<Frame, DecodeError> {
        expand_durations(durations, &mut self.levels)?;
        pack_levels(&mut self.levels, &mut self.bytes, self.capacity)?;
        check_crc(&self.bytes)?;
        Ok(Frame::from_wire(self.bytes.clone()))
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot decode with a fresh [`Decoder`].
pub fn decode(durations: &[u8]) -> Result<Frame, DecodeError> {
    Decoder::new().decode(durations)
}
