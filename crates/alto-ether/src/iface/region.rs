// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Memory shared with the device.
//!
//! On hardware this is the PRU-ICSS window mapped through UIO. Tests and
//! the loopback device use a zeroed heap allocation with the same layout.

use super::block::InterfaceBlock;
use crate::error::IfaceError;
use std::alloc::{self, Layout};
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::ptr;

enum Backing {
    /// `mmap`ed from a device file; unmapped on drop.
    Mapped,
    /// Heap allocation; freed with this layout on drop.
    Heap(Layout),
}

/// A fixed-size byte region both host and device can touch.
pub struct SharedRegion {
    ptr: *mut u8,
    len: usize,
    backing: Backing,
}

// SAFETY: the pointer is owned by the region for its whole lifetime. All
// cross-party access goes through the atomics of InterfaceBlock; payload
// bytes are only touched by whoever holds the matching owner word.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    const HEAP_ALIGN: usize = 64;

    /// Map `len` bytes of a device file, starting at `offset`.
    ///
    /// For UIO, `offset` selects the map: map N lives at N * page size.
    pub fn map(fd: BorrowedFd<'_>, len: usize, offset: usize) -> io::Result<Self> {
        if len == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty mapping"));
        }
        let offset = libc::off_t::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset out of range"))?;

        // SAFETY:
        // - A null hint lets the kernel choose the address
        // - fd is borrowed, so it stays open for the duration of the call
        // - MAP_SHARED makes device writes visible to us and vice versa
        // - mmap returns MAP_FAILED on error (checked below), otherwise a valid
        //   pointer to `len` bytes
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd.as_raw_fd(),
                offset,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        log::debug!("[DEV] mapped {:#x} bytes at offset {:#x}", len, offset);
        Ok(Self {
            ptr: ptr.cast::<u8>(),
            len,
            backing: Backing::Mapped,
        })
    }

    /// Zeroed heap region of `len` bytes.
    pub fn heap(len: usize) -> Result<Self, IfaceError> {
        let layout = Layout::from_size_align(len.max(1), Self::HEAP_ALIGN)
            .map_err(|e| IfaceError::Layout(format!("cannot allocate {len:#x} bytes: {e}")))?;

        // SAFETY: layout has a non-zero size.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            alloc::handle_alloc_error(layout);
        }
        Ok(Self {
            ptr,
            len,
            backing: Backing::Heap(layout),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped)
    }

    fn check_window(&self, offset: usize, len: usize) -> Result<(), IfaceError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(IfaceError::Layout(format!(
                "window {offset:#x}+{len:#x} outside region of {:#x}",
                self.len
            ))),
        }
    }

    /// Interface block at `offset`, checked for bounds and alignment.
    pub fn block(&self, offset: usize) -> Result<&InterfaceBlock, IfaceError> {
        self.check_window(offset, InterfaceBlock::SIZE)?;
        // The base is at least 64-byte aligned (heap) or page aligned (mmap).
        if offset % std::mem::align_of::<InterfaceBlock>() != 0 {
            return Err(IfaceError::Layout(format!(
                "block offset {offset:#x} is not word aligned"
            )));
        }
        // SAFETY: bounds and alignment checked above.
        Ok(unsafe { self.block_unchecked(offset) })
    }

    /// # Safety
    ///
    /// `offset` must be word aligned and leave room for a whole block.
    #[inline]
    pub(crate) unsafe fn block_unchecked(&self, offset: usize) -> &InterfaceBlock {
        // SAFETY: caller upholds bounds and alignment. InterfaceBlock is only
        // atomics, which may alias freely with the device's view.
        unsafe { &*self.ptr.add(offset).cast::<InterfaceBlock>() }
    }

    /// Store a 32-bit device register.
    pub fn write_register(&self, offset: usize, value: u32) -> Result<(), IfaceError> {
        self.check_window(offset, 4)?;
        if offset % 4 != 0 {
            return Err(IfaceError::Layout(format!(
                "register offset {offset:#x} is not word aligned"
            )));
        }
        // SAFETY: in bounds and aligned; registers are written, never borrowed.
        unsafe { ptr::write_volatile(self.ptr.add(offset).cast::<u32>(), value) };
        Ok(())
    }

    /// Read view of a payload window.
    ///
    /// # Safety
    ///
    /// Nobody else may write these bytes while the slice is alive; in
    /// practice the caller holds the owner word of the buffer containing them.
    pub unsafe fn bytes(&self, offset: usize, len: usize) -> Result<&[u8], IfaceError> {
        self.check_window(offset, len)?;
        // SAFETY: window is in bounds; exclusivity is the caller's contract.
        Ok(unsafe { std::slice::from_raw_parts(self.ptr.add(offset), len) })
    }

    /// Write view of a payload window.
    ///
    /// # Safety
    ///
    /// Nobody else may read or write these bytes while the slice is alive.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn bytes_mut(&self, offset: usize, len: usize) -> Result<&mut [u8], IfaceError> {
        self.check_window(offset, len)?;
        // SAFETY: window is in bounds; exclusivity is the caller's contract.
        Ok(unsafe { std::slice::from_raw_parts_mut(self.ptr.add(offset), len) })
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        match self.backing {
            Backing::Mapped => {
                // SAFETY: ptr/len come from the successful mmap in map() and
                // are unmapped exactly once, here.
                unsafe {
                    libc::munmap(self.ptr.cast::<libc::c_void>(), self.len);
                }
            }
            Backing::Heap(layout) => {
                // SAFETY: ptr was returned by alloc_zeroed with this layout.
                unsafe { alloc::dealloc(self.ptr, layout) };
            }
        }
    }
}

impl std::fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("len", &self.len)
            .field("mapped", &self.is_mapped())
            .finish()
    }
}
