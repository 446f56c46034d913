// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the gateway.
//!
//! Every per-frame error is local to one frame: it is logged, counted and the
//! loop moves on. Only startup failures (device open, socket bind) bubble up
//! to the caller as fatal.

use crate::iface::{Direction, Status};
use std::io;
use thiserror::Error;

/// Malformed waveform or frame; the frame is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("width {width_ns} ns too short at sample {index} of {len}")]
    WidthTooShort {
        width_ns: u32,
        index: usize,
        len: usize,
    },

    #[error("ambiguous width {width_ns} ns at sample {index} of {len}")]
    AmbiguousWidth {
        width_ns: u32,
        index: usize,
        len: usize,
    },

    #[error("width {width_ns} ns too long at sample {index} of {len}")]
    WidthTooLong {
        width_ns: u32,
        index: usize,
        len: usize,
    },

    #[error("misaligned frame: {half_bits} half-bits (expected 1 mod 16)")]
    Misaligned { half_bits: usize },

    #[error("frame too short: {bytes} bytes")]
    TooShort { bytes: usize },

    #[error("frame is not a whole number of words: {bytes} bytes")]
    OddLength { bytes: usize },

    #[error("bad CRC {computed:04x} vs {received:04x}")]
    CrcMismatch { computed: u16, received: u16 },
}

/// Decoder failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Framing(#[from] FramingError),

    #[error("buffer overflow: decoded frame reached {capacity} bytes")]
    Overflow { capacity: usize },
}

/// Frame cannot be prepared for transmission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("payload of {bytes} bytes is not a whole number of words")]
    OddLength { bytes: usize },

    #[error("frame of {bytes} bytes exceeds limit of {limit}")]
    TooLarge { bytes: usize, limit: usize },
}

/// Malformed UDP datagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatagramError {
    #[error("datagram of {len} bytes has no length header")]
    MissingHeader { len: usize },

    #[error("datagram declares {words} words but carries {available} bytes")]
    Truncated { words: usize, available: usize },
}

/// Shared interface misuse or inconsistent device state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IfaceError {
    #[error("invalid interface layout: {0}")]
    Layout(String),

    #[error("payload of {size} bytes exceeds buffer capacity {capacity}")]
    PayloadTooLarge { size: usize, capacity: usize },

    #[error("device reported {len} bytes, buffer holds {capacity}")]
    LengthOverrun { len: usize, capacity: usize },
}

/// Gateway error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("overflow: decoded frame reached {capacity} bytes")]
    Overflow { capacity: usize },

    #[error("{direction} failed with status {status}")]
    DeviceStatus { direction: Direction, status: Status },

    #[error("{0} buffer is owned by the device")]
    OwnershipViolation(Direction),

    #[error("bad datagram: {0}")]
    Datagram(#[from] DatagramError),

    #[error("cannot encode frame: {0}")]
    Encode(#[from] EncodeError),

    #[error("interface error: {0}")]
    Iface(#[from] IfaceError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Framing(e) => Self::Framing(e),
            DecodeError::Overflow { capacity } => Self::Overflow { capacity },
        }
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_maps_to_gateway_error() {
        let err: Error = DecodeError::Overflow { capacity: 564 }.into();
        assert!(matches!(err, Error::Overflow { capacity: 564 }));

        let err: Error = DecodeError::Framing(FramingError::TooShort { bytes: 1 }).into();
        assert!(matches!(err, Error::Framing(FramingError::TooShort { bytes: 1 })));
    }

    #[test]
    fn test_crc_mismatch_message() {
        let err = FramingError::CrcMismatch {
            computed: 0x9d30,
            received: 0x0001,
        };
        assert_eq!(err.to_string(), "bad CRC 9d30 vs 0001");
    }
}
