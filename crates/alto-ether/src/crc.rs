// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Alto Ethernet CRC-16.
//!
//! Not CRC-16/CCITT: the register is seeded with the polynomial itself to
//! account for the sync bit that precedes the data on the wire, and the
//! result is neither inverted nor reflected. Data is a sequence of
//! big-endian 16-bit words, processed one byte at a time, MSB first.

/// CRC-16 polynomial constant, also the initial register value.
pub const CRC_POLY: u16 = 0x8005;

/// Compute the CRC over big-endian word data stored as bytes.
///
/// Callers pass whole words; the loop itself is byte oriented, so an odd
/// trailing byte would simply be folded in.
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = CRC_POLY;
    for &byte in data {
        let mut bits = u16::from(byte) << 8;
        for _ in 0..8 {
            let feedback = (crc ^ bits) & 0x8000;
            crc <<= 1;
            bits <<= 1;
            if feedback != 0 {
                crc ^= CRC_POLY;
            }
        }
    }
    crc
}

/// Compute the CRC over 16-bit words.
#[must_use]
pub fn crc16_words(words: &[u16]) -> u16 {
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
    crc16(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ECHO: [u8; 14] = [
        0x42, 0x43, 0x01, 0xC0, 0x09, 0x6D, 0xFF, 0xFF, 0x00, 0x01, 0x01, 0x01, 0xFF, 0xFF,
    ];

    #[test]
    fn test_empty_is_seed() {
        assert_eq!(crc16(&[]), 0x8005);
    }

    #[test]
    fn test_known_vectors() {
        assert_eq!(crc16(&[0x00, 0x00]), 0x8017);
        assert_eq!(crc16(&ECHO), 0x9d30);
    }

    #[test]
    fn test_words_match_bytes() {
        let words = [0x4243, 0x01C0, 0x096D, 0xFFFF, 0x0001, 0x0101, 0xFFFF];
        assert_eq!(crc16_words(&words), crc16(&ECHO));
    }

    #[test]
    fn test_single_bit_flip_changes_crc() {
        let base = crc16(&ECHO);
        for i in 0..ECHO.len() * 8 {
            let mut data = ECHO;
            data[i / 8] ^= 0x80 >> (i % 8);
            assert_ne!(crc16(&data), base, "bit {} undetected", i);
        }
    }
}
