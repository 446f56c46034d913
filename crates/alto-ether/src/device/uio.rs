// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! PRU-ICSS through the `uio_pruss` driver.
//!
//! The PRU firmware is loaded beforehand by the system; this side only maps
//! the memory and services the PRU0 -> ARM interrupt.

use super::TimingDevice;
use crate::config::{INTC_HIEISR, INTC_SICR, PRU0_ARM_EVENT, PRUSS_MAP_LEN, PRU_EVTOUT0_HOST};
use crate::error::Result;
use crate::iface::{InterfaceLayout, SharedRegion};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The PRU as seen through `/dev/uioN`.
pub struct UioDevice {
    file: File,
    path: PathBuf,
    region: Arc<SharedRegion>,
    layout: InterfaceLayout,
    /// Cleared once the driver refuses irqcontrol writes.
    rearm_by_write: bool,
}

impl UioDevice {
    pub const DEFAULT_PATH: &'static str = "/dev/uio0";

    /// Open the UIO node and map the PRU-ICSS window (map 0).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_CLOEXEC)
            .open(&path)
            .map_err(|e| {
                log::error!("[DEV] cannot open {}: {}", path.display(), e);
                e
            })?;
        let region = SharedRegion::map(file.as_fd(), PRUSS_MAP_LEN, 0).map_err(|e| {
            log::error!("[DEV] cannot map {}: {}", path.display(), e);
            e
        })?;
        let layout = InterfaceLayout::pru();
        layout.validate(region.len())?;

        log::info!("[DEV] opened {} ({:#x} bytes mapped)", path.display(), region.len());
        Ok(Self {
            file,
            path,
            region: Arc::new(region),
            layout,
            rearm_by_write: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the interrupt counter, if an interrupt is pending.
    fn read_event_count(&mut self) -> io::Result<Option<u32>> {
        let mut count = [0u8; 4];
        match self.file.read(&mut count) {
            Ok(4) => Ok(Some(u32::from_ne_bytes(count))),
            Ok(n) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("short UIO read: {n} bytes"),
            )),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl TimingDevice for UioDevice {
    fn region(&self) -> &Arc<SharedRegion> {
        &self.region
    }

    fn layout(&self) -> InterfaceLayout {
        self.layout
    }

    fn event_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    fn acknowledge(&mut self) -> Result<()> {
        match self.read_event_count()? {
            Some(count) => log::trace!("[DEV] interrupt #{}", count),
            None => log::trace!("[DEV] no interrupt pending"),
        }

        // Clear the PRU0 -> ARM system event, then re-enable its host interrupt.
        self.region.write_register(INTC_SICR, PRU0_ARM_EVENT)?;
        self.region.write_register(INTC_HIEISR, PRU_EVTOUT0_HOST)?;

        if self.rearm_by_write {
            if let Err(e) = self.file.write_all(&1u32.to_ne_bytes()) {
                log::debug!(
                    "[DEV] {} does not take irqcontrol writes ({}); relying on INTC only",
                    self.path.display(),
                    e
                );
                self.rearm_by_write = false;
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "uio"
    }
}
