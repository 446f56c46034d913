// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Timing devices: whatever drives the other side of the shared interface.
//!
//! - [`UioDevice`]: the PRU coprocessor, reached through Linux UIO
//! - [`sim::SimulatedDevice`]: an in-process stand-in driven by tests or
//!   by a loopback thread

pub mod line;
pub mod sim;
mod uio;

pub use uio::UioDevice;

use crate::error::Result;
use crate::iface::{InterfaceLayout, SharedRegion};
use std::os::fd::RawFd;
use std::sync::Arc;

/// Host view of a device sharing an interface block.
pub trait TimingDevice {
    /// Memory holding the interface block and both buffers.
    fn region(&self) -> &Arc<SharedRegion>;

    /// Where things sit inside [`TimingDevice::region`].
    fn layout(&self) -> InterfaceLayout;

    /// Descriptor that polls readable when the device signals completion.
    fn event_fd(&self) -> RawFd;

    /// Consume pending completion signals and re-enable the next one.
    fn acknowledge(&mut self) -> Result<()>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "device"
    }
}

impl<T: TimingDevice + ?Sized> TimingDevice for Box<T> {
    fn region(&self) -> &Arc<SharedRegion> {
        (**self).region()
    }

    fn layout(&self) -> InterfaceLayout {
        (**self).layout()
    }

    fn event_fd(&self) -> RawFd {
        (**self).event_fd()
    }

    fn acknowledge(&mut self) -> Result<()> {
        (**self).acknowledge()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
