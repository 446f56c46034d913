// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host side of the interface shared with the PRU.
//!
//! Two single-slot buffers, one per direction, live in memory both sides can
//! touch. Each carries an owner word; whoever holds it is the only party
//! allowed to read or write that buffer's payload. Handing a buffer over is
//! therefore a message send on a one-slot channel:
//!
//! ```text
//!                 Receive                         Transmit
//!  PRU   fill ─> owner=HOST ─┐          ┌─ owner=HOST <─ send
//!                            v          v
//!  ARM        copy out, owner=PRU     write frame, owner=PRU
//! ```
//!
//! # Memory Ordering
//!
//! The owner word is the last write before giving a buffer away (Release)
//! and the first read after waking (Acquire). Payload and length accesses
//! happen strictly between the two, so they need no further fencing.
//!
//! On the host, [`ReceivePort`] and [`TransmitPort`] hand out at most one
//! grant at a time, and only while the owner word reads [`Owner::Host`].

mod block;
mod port;
mod region;

pub use block::{InterfaceBlock, InterfaceLayout};
pub use port::{split_ports, ReceiveGrant, ReceivePort, TransmitGrant, TransmitPort};
pub use region::SharedRegion;

use std::fmt;

/// Owner word value meaning the host holds the buffer.
pub const OWNER_HOST: u32 = 1;

/// Owner word value meaning the PRU holds the buffer.
pub const OWNER_DEVICE: u32 = 2;

/// Party allowed to touch a buffer's payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Owner {
    Host,
    Device,
}

impl Owner {
    /// Decode an owner word. Anything but the host marker stays with the device.
    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        if raw == OWNER_HOST {
            Self::Host
        } else {
            Self::Device
        }
    }

    #[inline]
    pub fn as_raw(self) -> u32 {
        match self {
            Self::Host => OWNER_HOST,
            Self::Device => OWNER_DEVICE,
        }
    }
}

/// Buffer direction, seen from the Alto.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Receive,
    Transmit,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Receive => write!(f, "receive"),
            Self::Transmit => write!(f, "transmit"),
        }
    }
}

/// Completion status written by the PRU.
///
/// Bits 8..15 carry a completion code, the low byte carries flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Status(pub u32);

impl Status {
    pub const INPUT_COMPLETE: Self = Self(0 << 8);
    pub const OUTPUT_COMPLETE: Self = Self(1 << 8);
    pub const INPUT_OVERRUN: Self = Self(2 << 8);
    pub const LOAD_OVERFLOW: Self = Self(3 << 8);
    pub const ZERO_LENGTH: Self = Self(4 << 8);
    pub const SOFTWARE_RESET: Self = Self(5 << 8);

    /// Transmission did not end on a byte boundary.
    pub const FLAG_INCOMPLETE: u32 = 1;
    pub const FLAG_CRC_BAD: u32 = 8;
    /// Collision seen while transmitting.
    pub const FLAG_BIT_COLLISION: u32 = 16;
    pub const FLAG_TIMING_ERROR: u32 = 32;

    const CODE_MASK: u32 = 0xff00;
    const FLAG_MASK: u32 = 0x00ff;

    #[inline]
    pub fn code(self) -> Self {
        Self(self.0 & Self::CODE_MASK)
    }

    #[inline]
    pub fn flags(self) -> u32 {
        self.0 & Self::FLAG_MASK
    }

    #[inline]
    pub fn has_flag(self, flag: u32) -> bool {
        self.0 & flag != 0
    }

    /// A receive finished cleanly.
    #[inline]
    pub fn is_input_complete(self) -> bool {
        self == Self::INPUT_COMPLETE
    }

    /// A transmit finished cleanly.
    #[inline]
    pub fn is_output_complete(self) -> bool {
        self == Self::OUTPUT_COMPLETE
    }

    fn code_name(self) -> Option<&'static str> {
        match self.code() {
            Self::INPUT_COMPLETE => Some("input-complete"),
            Self::OUTPUT_COMPLETE => Some("output-complete"),
            Self::INPUT_OVERRUN => Some("input-overrun"),
            Self::LOAD_OVERFLOW => Some("load-overflow"),
            Self::ZERO_LENGTH => Some("zero-length"),
            Self::SOFTWARE_RESET => Some("software-reset"),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = Vec::new();
        // Code 0 with flags set is a bare flag report (e.g. a collision).
        if self.code().0 != 0 || self.flags() == 0 {
            names.push(self.code_name().unwrap_or("unknown"));
        }
        for (flag, name) in [
            (Self::FLAG_INCOMPLETE, "incomplete"),
            (Self::FLAG_CRC_BAD, "crc-bad"),
            (Self::FLAG_BIT_COLLISION, "bit-collision"),
            (Self::FLAG_TIMING_ERROR, "timing-error"),
        ] {
            if self.has_flag(flag) {
                names.push(name);
            }
        }
        write!(f, "{} ({:#06x})", names.join("+"), self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_encoding() {
        assert_eq!(Owner::from_raw(OWNER_HOST), Owner::Host);
        assert_eq!(Owner::from_raw(OWNER_DEVICE), Owner::Device);
        assert_eq!(Owner::from_raw(0), Owner::Device);
        assert_eq!(Owner::Host.as_raw(), OWNER_HOST);
    }

    #[test]
    fn test_status_predicates() {
        assert!(Status(0).is_input_complete());
        assert!(Status(0x100).is_output_complete());
        assert!(!Status(Status::FLAG_BIT_COLLISION).is_input_complete());
        assert!(!Status(0x200).is_input_complete());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Status::OUTPUT_COMPLETE.to_string(), "output-complete (0x0100)");
        assert_eq!(
            Status(Status::FLAG_BIT_COLLISION).to_string(),
            "bit-collision (0x0010)"
        );
        assert_eq!(
            Status(0x0201).to_string(),
            "input-overrun+incomplete (0x0201)"
        );
        assert_eq!(Status(0x0900).to_string(), "unknown (0x0900)");
    }
}
