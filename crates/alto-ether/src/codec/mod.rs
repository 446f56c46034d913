// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Timing codec for the Alto Ethernet.
//!
//! The PRU samples the line and reports the time between consecutive
//! transitions. Decoding turns those durations back into bytes:
//!
//! ```text
//! durations --expand--> half-bit levels --pack--> bytes --CRC--> Frame
//!   (2 ns)              (1 per 170 ns)       (MSB first)
//! ```
//!
//! Encoding only has to produce the exact byte sequence (payload + CRC);
//! the PRU serializes it with mid-bit Manchester transitions.

mod decode;
mod encode;

pub use decode::{classify_width, decode, expand_durations, pack_levels, Decoder, Width};
pub use encode::encode;

use crate::config::CRC_LEN;

/// Diagnostic frame sent to the Alto on request (destination word 0 = broadcast).
pub const ECHO_FRAME: [u8; 14] = [
    0x00, 0x00, 0x01, 0xC0, 0x09, 0x6D, 0xFF, 0xFF, 0x00, 0x01, 0x01, 0x01, 0xFF, 0xFF,
];

/// An Alto Ethernet frame as it appears on the wire: payload words followed
/// by the big-endian CRC word.
///
/// Always at least one word long and a whole number of words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    /// Wrap bytes already validated by the decoder or built by the encoder.
    pub(crate) fn from_wire(bytes: Vec<u8>) -> Self {
        debug_assert!(bytes.len() >= CRC_LEN && bytes.len() % 2 == 0);
        Self { bytes }
    }

    /// Full frame, CRC included.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Frame without the trailing CRC word.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.bytes[..self.bytes.len() - CRC_LEN]
    }

    /// Trailing CRC word.
    pub fn crc(&self) -> u16 {
        let n = self.bytes.len();
        u16::from_be_bytes([self.bytes[n - 2], self.bytes[n - 1]])
    }

    /// Payload length in 16-bit words (CRC excluded).
    pub fn word_count(&self) -> usize {
        self.payload().len() / 2
    }

    /// Length in bytes, CRC included.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
