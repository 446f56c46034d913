// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Payload -> frame ready for the transmit buffer.

use super::Frame;
use crate::config::{CRC_LEN, MAX_PUP_LENGTH};
use crate::crc::crc16;
use crate::error::EncodeError;

/// Append the CRC word to a payload.
///
/// The result is the exact byte sequence the PRU serializes, MSB first.
/// Frames the receiving side would overflow on are refused.
pub fn encode(payload: &[u8]) -> Result<Frame, EncodeError> {
    if payload.len() % 2 != 0 {
        return Err(EncodeError::OddLength {
            bytes: payload.len(),
        });
    }
    let frame_len = payload.len() + CRC_LEN;
    if frame_len >= MAX_PUP_LENGTH {
        return Err(EncodeError::TooLarge {
            bytes: frame_len,
            limit: MAX_PUP_LENGTH - 1,
        });
    }

    let mut bytes = Vec::with_capacity(frame_len);
    bytes.extend_from_slice(payload);
    bytes.extend_from_slice(&crc16(payload).to_be_bytes());
    Ok(Frame::from_wire(bytes))
}
