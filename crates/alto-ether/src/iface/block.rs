// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Interface block layout.
//!
//! # Memory Layout
//!
//! ```text
//! Offset  Field               Writer
//! 0x00    r_owner             both (handoff)
//! 0x04    r_max_length        host
//! 0x08    r_received_length   device
//! 0x0c    r_buf               host (device-local address)
//! 0x10    r_truncated         device sets, host clears
//! 0x14    r_status            device
//! 0x18    w_owner             both (handoff)
//! 0x1c    w_length            host
//! 0x20    w_buf               host (device-local address)
//! 0x24    w_status            device
//! ```

use super::{Owner, Status};
use crate::config::{IFACE_OFFSET, R_BUF_CAPACITY, R_BUF_OFFSET, W_BUF_CAPACITY, W_BUF_OFFSET};
use crate::error::IfaceError;
use std::sync::atomic::{AtomicU32, Ordering};

/// Metadata for both shared buffers, polled and written by host and device.
#[repr(C)]
pub struct InterfaceBlock {
    pub r_owner: AtomicU32,
    pub r_max_length: AtomicU32,
    pub r_received_length: AtomicU32,
    pub r_buf: AtomicU32,
    pub r_truncated: AtomicU32,
    pub r_status: AtomicU32,
    pub w_owner: AtomicU32,
    pub w_length: AtomicU32,
    pub w_buf: AtomicU32,
    pub w_status: AtomicU32,
}

impl InterfaceBlock {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Read an owner word. Acquire: pairs with the Release in [`Self::hand_over`].
    #[inline]
    pub fn owner_of(word: &AtomicU32) -> Owner {
        Owner::from_raw(word.load(Ordering::Acquire))
    }

    /// Give a buffer away. Release: every payload and length write made
    /// before this is visible to the new owner.
    #[inline]
    pub fn hand_over(word: &AtomicU32, to: Owner) {
        word.store(to.as_raw(), Ordering::Release);
    }

    #[inline]
    pub fn receive_owner(&self) -> Owner {
        Self::owner_of(&self.r_owner)
    }

    #[inline]
    pub fn transmit_owner(&self) -> Owner {
        Self::owner_of(&self.w_owner)
    }

    #[inline]
    pub fn receive_status(&self) -> Status {
        Status(self.r_status.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn transmit_status(&self) -> Status {
        Status(self.w_status.load(Ordering::Relaxed))
    }
}

/// Where the block and the two payload windows sit inside a [`SharedRegion`].
///
/// Buffer offsets double as the device-local addresses written to
/// `r_buf`/`w_buf`; on the PRU both views coincide.
///
/// [`SharedRegion`]: super::SharedRegion
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterfaceLayout {
    pub block_offset: usize,
    pub tx_offset: usize,
    pub tx_capacity: usize,
    pub rx_offset: usize,
    pub rx_capacity: usize,
}

impl InterfaceLayout {
    /// PRU-ICSS memory map used by the gateway firmware.
    pub const fn pru() -> Self {
        Self {
            block_offset: IFACE_OFFSET,
            tx_offset: W_BUF_OFFSET,
            tx_capacity: W_BUF_CAPACITY,
            rx_offset: R_BUF_OFFSET,
            rx_capacity: R_BUF_CAPACITY,
        }
    }

    /// Bytes of region the layout needs.
    pub fn span(&self) -> usize {
        (self.block_offset + InterfaceBlock::SIZE)
            .max(self.tx_offset + self.tx_capacity)
            .max(self.rx_offset + self.rx_capacity)
    }

    /// Check alignment, bounds and overlap against a region of `region_len` bytes.
    pub fn validate(&self, region_len: usize) -> Result<(), IfaceError> {
        if self.block_offset % std::mem::align_of::<InterfaceBlock>() != 0 {
            return Err(IfaceError::Layout(format!(
                "block offset {:#x} is not word aligned",
                self.block_offset
            )));
        }
        if self.tx_capacity == 0 || self.rx_capacity == 0 {
            return Err(IfaceError::Layout("empty buffer window".into()));
        }
        if self.span() > region_len {
            return Err(IfaceError::Layout(format!(
                "layout needs {:#x} bytes, region has {:#x}",
                self.span(),
                region_len
            )));
        }
        if u32::try_from(self.span()).is_err() {
            return Err(IfaceError::Layout("offsets exceed 32 bits".into()));
        }

        let ranges = [
            ("block", self.block_offset, InterfaceBlock::SIZE),
            ("transmit", self.tx_offset, self.tx_capacity),
            ("receive", self.rx_offset, self.rx_capacity),
        ];
        for (i, &(a_name, a_start, a_len)) in ranges.iter().enumerate() {
            for &(b_name, b_start, b_len) in &ranges[i + 1..] {
                if a_start < b_start + b_len && b_start < a_start + a_len {
                    return Err(IfaceError::Layout(format!(
                        "{a_name} window overlaps {b_name} window"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for InterfaceLayout {
    fn default() -> Self {
        Self::pru()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PRUSS_MAP_LEN;

    #[test]
    fn test_block_size() {
        assert_eq!(InterfaceBlock::SIZE, 40);
    }

    #[test]
    fn test_pru_layout_fits_mapping() {
        let layout = InterfaceLayout::pru();
        assert!(layout.validate(PRUSS_MAP_LEN).is_ok());
        assert_eq!(layout.span(), R_BUF_OFFSET + R_BUF_CAPACITY);
    }

    #[test]
    fn test_layout_rejects_overlap() {
        let layout = InterfaceLayout {
            block_offset: 0,
            tx_offset: 0x20,
            tx_capacity: 0x100,
            rx_offset: 0x200,
            rx_capacity: 0x100,
        };
        assert!(matches!(layout.validate(0x1000), Err(IfaceError::Layout(_))));
    }

    #[test]
    fn test_layout_rejects_small_region() {
        assert!(InterfaceLayout::pru().validate(0x1000).is_err());
    }

    #[test]
    fn test_layout_rejects_unaligned_block() {
        let layout = InterfaceLayout {
            block_offset: 2,
            ..InterfaceLayout::pru()
        };
        assert!(layout.validate(PRUSS_MAP_LEN).is_err());
    }
}
