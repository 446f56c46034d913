// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host handles on the two shared buffers.
//!
//! A port is the only host-side path to its buffer. Payload access needs a
//! grant, a grant needs `&mut` on the port and is only issued while the
//! owner word says [`Owner::Host`]. Handing the buffer back is the last
//! thing a grant does.

use super::block::{InterfaceBlock, InterfaceLayout};
use super::region::SharedRegion;
use super::{Owner, Status};
use crate::error::IfaceError;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Attach to the interface in `region`.
///
/// Leaves the transmit buffer with the host (nothing to send yet) and arms
/// the receive buffer for the device.
pub fn split_ports(
    region: Arc<SharedRegion>,
    layout: InterfaceLayout,
) -> Result<(ReceivePort, TransmitPort), IfaceError> {
    layout.validate(region.len())?;

    let mut tx = TransmitPort {
        region: Arc::clone(&region),
        layout,
        in_flight: false,
    };
    let mut rx = ReceivePort { region, layout };
    tx.reset();
    // Stale from a previous session. Afterwards only a grant clears it.
    rx.block().r_truncated.store(0, Ordering::Relaxed);
    rx.arm();

    log::debug!(
        "[DEV] interface attached: block {:#x}, tx {:#x}+{:#x}, rx {:#x}+{:#x}",
        layout.block_offset,
        layout.tx_offset,
        layout.tx_capacity,
        layout.rx_offset,
        layout.rx_capacity
    );
    Ok((rx, tx))
}

#[inline]
fn block_of<'a>(region: &'a SharedRegion, layout: &InterfaceLayout) -> &'a InterfaceBlock {
    // SAFETY: layout was validated against this region in split_ports.
    unsafe { region.block_unchecked(layout.block_offset) }
}

/// Receive buffer: the device fills it with durations, the host drains it.
pub struct ReceivePort {
    region: Arc<SharedRegion>,
    layout: InterfaceLayout,
}

impl ReceivePort {
    #[inline]
    fn block(&self) -> &InterfaceBlock {
        block_of(&self.region, &self.layout)
    }

    pub fn owner(&self) -> Owner {
        self.block().receive_owner()
    }

    pub fn capacity(&self) -> usize {
        self.layout.rx_capacity
    }

    /// Hand an empty buffer to the device. `r_truncated` is left alone: a
    /// drop reported while the host held the buffer belongs to the next grant.
    pub fn arm(&mut self) {
        let block = self.block();
        block
            .r_buf
            .store(self.layout.rx_offset as u32, Ordering::Relaxed);
        block
            .r_max_length
            .store(self.layout.rx_capacity as u32, Ordering::Relaxed);
        block.r_received_length.store(0, Ordering::Relaxed);
        InterfaceBlock::hand_over(&block.r_owner, Owner::Device);
    }

    /// Borrow the filled buffer, if the device has handed it over.
    pub fn try_acquire(&mut self) -> Option<ReceiveGrant<'_>> {
        if self.owner() == Owner::Host {
            Some(ReceiveGrant { port: self })
        } else {
            None
        }
    }
}

/// Host access to a filled receive buffer. Re-arms the buffer when dropped,
/// so every exit path returns it to the device.
pub struct ReceiveGrant<'a> {
    port: &'a mut ReceivePort,
}

impl ReceiveGrant<'_> {
    pub fn status(&self) -> Status {
        self.port.block().receive_status()
    }

    /// Whether the device dropped input while the host held this buffer.
    /// Reading clears the flag.
    pub fn take_truncated(&mut self) -> bool {
        self.port.block().r_truncated.swap(0, Ordering::AcqRel) != 0
    }

    /// Length the device reported, unchecked.
    pub fn received_len(&self) -> usize {
        self.port.block().r_received_length.load(Ordering::Relaxed) as usize
    }

    /// The received durations, bounded by the buffer capacity.
    pub fn payload(&self) -> Result<&[u8], IfaceError> {
        let len = self.received_len();
        let capacity = self.port.capacity();
        if len > capacity {
            return Err(IfaceError::LengthOverrun { len, capacity });
        }
        // SAFETY: the owner word reads Host for as long as this grant exists;
        // the device does not touch the window until release.
        unsafe { self.port.region.bytes(self.port.layout.rx_offset, len) }
    }

    /// Copy the received durations into a host-private buffer.
    pub fn copy_out(&self, dst: &mut Vec<u8>) -> Result<usize, IfaceError> {
        let payload = self.payload()?;
        dst.clear();
        dst.extend_from_slice(payload);
        Ok(payload.len())
    }

    /// Give the buffer back to the device.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ReceiveGrant<'_> {
    fn drop(&mut self) {
        self.port.arm();
    }
}

/// Transmit buffer: the host fills it with a frame, the device sends it.
pub struct TransmitPort {
    region: Arc<SharedRegion>,
    layout: InterfaceLayout,
    in_flight: bool,
}

impl TransmitPort {
    #[inline]
    fn block(&self) -> &InterfaceBlock {
        block_of(&self.region, &self.layout)
    }

    pub fn owner(&self) -> Owner {
        self.block().transmit_owner()
    }

    /// The host may write a frame now.
    pub fn is_available(&self) -> bool {
        self.owner() == Owner::Host
    }

    pub fn capacity(&self) -> usize {
        self.layout.tx_capacity
    }

    /// A committed frame has not been reported back yet.
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Status of the most recent transmit.
    pub fn last_status(&self) -> Status {
        self.block().transmit_status()
    }

    /// Take the buffer back unconditionally. Only valid before the device runs.
    pub fn reset(&mut self) {
        let block = self.block();
        block
            .w_buf
            .store(self.layout.tx_offset as u32, Ordering::Relaxed);
        block.w_length.store(0, Ordering::Relaxed);
        InterfaceBlock::hand_over(&block.w_owner, Owner::Host);
        self.in_flight = false;
    }

    /// Report a finished transmit once, when the device hands the buffer back.
    pub fn poll_completion(&mut self) -> Option<Status> {
        if self.in_flight && self.is_available() {
            self.in_flight = false;
            Some(self.last_status())
        } else {
            None
        }
    }

    /// Borrow the buffer for writing, if the host holds it.
    pub fn try_acquire(&mut self) -> Option<TransmitGrant<'_>> {
        if self.is_available() {
            Some(TransmitGrant { port: self, len: 0 })
        } else {
            None
        }
    }
}

/// Host access to an idle transmit buffer. Dropping it without
/// [`commit`](TransmitGrant::commit) leaves the buffer with the host.
pub struct TransmitGrant<'a> {
    port: &'a mut TransmitPort,
    len: usize,
}

impl TransmitGrant<'_> {
    pub fn capacity(&self) -> usize {
        self.port.capacity()
    }

    /// Copy a frame into the buffer, replacing anything written before.
    pub fn write(&mut self, frame: &[u8]) -> Result<(), IfaceError> {
        let capacity = self.capacity();
        if frame.len() > capacity {
            return Err(IfaceError::PayloadTooLarge {
                size: frame.len(),
                capacity,
            });
        }
        // SAFETY: the owner word reads Host for as long as this grant exists.
        let window = unsafe {
            self.port
                .region
                .bytes_mut(self.port.layout.tx_offset, frame.len())?
        };
        window.copy_from_slice(frame);
        self.len = frame.len();
        Ok(())
    }

    /// Bytes written so far.
    pub fn written(&self) -> &[u8] {
        // SAFETY: as in write(); len never exceeds the window.
        unsafe {
            self.port
                .region
                .bytes(self.port.layout.tx_offset, self.len)
                .unwrap_or(&[])
        }
    }

    /// Publish the length and hand the buffer to the device.
    pub fn commit(self) -> usize {
        let block = self.port.block();
        block.w_length.store(self.len as u32, Ordering::Relaxed);
        block.w_status.store(0, Ordering::Relaxed);
        InterfaceBlock::hand_over(&block.w_owner, Owner::Device);
        self.port.in_flight = true;
        self.len
    }
}
