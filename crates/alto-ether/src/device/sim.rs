// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process timing device.
//!
//! [`simulated`] builds a pair sharing one heap region: the host half
//! ([`SimulatedDevice`]) goes to the gateway, the device half
//! ([`SimulatedPru`]) plays the coprocessor. A Unix socket pair stands in
//! for the interrupt line.
//!
//! The device half follows the same rules as the firmware: it only touches
//! a buffer while the owner word says so, and reports every completion
//! with a signal.

use super::line::frame_durations;
use super::TimingDevice;
use crate::config::{HALF_BIT_NS, PRUSS_MAP_LEN};
use crate::error::{IfaceError, Result};
use crate::iface::{Direction, InterfaceBlock, InterfaceLayout, Owner, SharedRegion, Status};
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

/// Device-side failure in the simulation.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("{0} buffer is owned by the host")]
    NotOwned(Direction),

    #[error("transmit window changed between commit and completion")]
    Overwritten,

    #[error(transparent)]
    Iface(#[from] IfaceError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// What happened to input offered to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Written to the receive buffer and handed to the host.
    Delivered,
    /// Dropped: the host still held the receive buffer.
    Truncated,
}

/// Build a host/device pair over a fresh zeroed region.
pub fn simulated(layout: InterfaceLayout) -> Result<(SimulatedDevice, SimulatedPru)> {
    let region = Arc::new(SharedRegion::heap(PRUSS_MAP_LEN.max(layout.span()))?);
    layout.validate(region.len())?;

    let (host_irq, device_irq) = UnixStream::pair()?;
    host_irq.set_nonblocking(true)?;
    device_irq.set_nonblocking(true)?;

    let host = SimulatedDevice {
        region: Arc::clone(&region),
        layout,
        irq: host_irq,
    };
    let device = SimulatedPru {
        region,
        layout,
        irq: device_irq,
        half_bit_ns: HALF_BIT_NS,
        committed: None,
    };
    Ok((host, device))
}

/// Host half of a simulated device.
pub struct SimulatedDevice {
    region: Arc<SharedRegion>,
    layout: InterfaceLayout,
    irq: UnixStream,
}

impl TimingDevice for SimulatedDevice {
    fn region(&self) -> &Arc<SharedRegion> {
        &self.region
    }

    fn layout(&self) -> InterfaceLayout {
        self.layout
    }

    fn event_fd(&self) -> RawFd {
        self.irq.as_raw_fd()
    }

    fn acknowledge(&mut self) -> Result<()> {
        let mut buf = [0u8; 64];
        loop {
            match self.irq.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

/// Device half of a simulated device.
pub struct SimulatedPru {
    region: Arc<SharedRegion>,
    layout: InterfaceLayout,
    irq: UnixStream,
    half_bit_ns: u32,
    /// Transmit window as it was when the host committed it.
    committed: Option<Vec<u8>>,
}

impl SimulatedPru {
    fn block(&self) -> &InterfaceBlock {
        // SAFETY: layout was validated against the region in simulated().
        unsafe { self.region.block_unchecked(self.layout.block_offset) }
    }

    /// Line speed used by [`SimulatedPru::deliver_frame`].
    pub fn set_half_bit_ns(&mut self, half_bit_ns: u32) {
        self.half_bit_ns = half_bit_ns;
    }

    pub fn receive_owner(&self) -> Owner {
        self.block().receive_owner()
    }

    pub fn transmit_owner(&self) -> Owner {
        self.block().transmit_owner()
    }

    /// Raise the interrupt line.
    pub fn signal(&self) -> io::Result<()> {
        match (&self.irq).write(&[1]) {
            Ok(_) => Ok(()),
            // Line already raised and unread.
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Record input that arrived while the host held the receive buffer.
    pub fn mark_truncated(&self) {
        self.block().r_truncated.store(1, Ordering::Relaxed);
    }

    /// Hand the receive buffer to the host with `durations` and a status.
    ///
    /// Input longer than `r_max_length` is cut there and reported as an
    /// overrun, as the firmware does.
    pub fn deliver_durations(&self, durations: &[u8]) -> std::result::Result<Delivery, SimError> {
        let block = self.block();
        if block.receive_owner() != Owner::Device {
            self.mark_truncated();
            return Ok(Delivery::Truncated);
        }

        let offset = block.r_buf.load(Ordering::Relaxed) as usize;
        let max = block.r_max_length.load(Ordering::Relaxed) as usize;
        let (len, status) = if durations.len() > max {
            (max, Status::INPUT_OVERRUN)
        } else {
            (durations.len(), Status::INPUT_COMPLETE)
        };

        // SAFETY: the receive owner word reads Device; the host does not
        // touch the window until we hand it over below.
        let window = unsafe { self.region.bytes_mut(offset, len)? };
        window.copy_from_slice(&durations[..len]);
        block.r_received_length.store(len as u32, Ordering::Relaxed);
        block.r_status.store(status.0, Ordering::Relaxed);
        InterfaceBlock::hand_over(&block.r_owner, Owner::Host);
        self.signal()?;
        Ok(Delivery::Delivered)
    }

    /// Deliver the waveform of `frame` (bytes as sent, CRC included).
    pub fn deliver_frame(&self, frame: &[u8]) -> std::result::Result<Delivery, SimError> {
        self.deliver_durations(&frame_durations(frame, self.half_bit_ns))
    }

    /// Complete a receive with `status` and no data.
    pub fn deliver_status(&self, status: Status) -> std::result::Result<(), SimError> {
        let block = self.block();
        if block.receive_owner() != Owner::Device {
            return Err(SimError::NotOwned(Direction::Receive));
        }
        block.r_received_length.store(0, Ordering::Relaxed);
        block.r_status.store(status.0, Ordering::Relaxed);
        InterfaceBlock::hand_over(&block.r_owner, Owner::Host);
        self.signal()?;
        Ok(())
    }

    /// Frame the host committed, if the transmit buffer is ours.
    pub fn take_transmit(&mut self) -> std::result::Result<Option<Vec<u8>>, SimError> {
        let block = self.block();
        if block.transmit_owner() != Owner::Device {
            return Ok(None);
        }
        let offset = block.w_buf.load(Ordering::Relaxed) as usize;
        let len = block.w_length.load(Ordering::Relaxed) as usize;
        // SAFETY: the transmit owner word reads Device.
        let frame = unsafe { self.region.bytes(offset, len)? }.to_vec();
        self.committed = Some(frame.clone());
        Ok(Some(frame))
    }

    /// Finish the pending transmit with `status` and hand the buffer back.
    ///
    /// Fails with [`SimError::Overwritten`] if the window no longer holds
    /// what the host committed; the buffer is still handed back.
    pub fn complete_transmit(&mut self, status: Status) -> std::result::Result<(), SimError> {
        if self.transmit_owner() != Owner::Device {
            return Err(SimError::NotOwned(Direction::Transmit));
        }
        let committed = match self.committed.take() {
            Some(frame) => frame,
            None => self.take_transmit()?.unwrap_or_default(),
        };

        let block = self.block();
        let offset = block.w_buf.load(Ordering::Relaxed) as usize;
        // SAFETY: still Device-owned until hand_over below.
        let intact = unsafe { self.region.bytes(offset, committed.len())? } == committed.as_slice();

        block.w_status.store(status.0, Ordering::Relaxed);
        InterfaceBlock::hand_over(&block.w_owner, Owner::Host);
        self.signal()?;

        if intact {
            Ok(())
        } else {
            Err(SimError::Overwritten)
        }
    }

    /// Run the device on its own thread, echoing every transmitted frame
    /// back as received input.
    pub fn spawn_loopback(self) -> io::Result<Loopback> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("alto-sim-pru".into())
            .spawn(move || loopback_main(self, &flag))?;
        Ok(Loopback {
            stop,
            handle: Some(handle),
        })
    }
}

/// Counters kept by the loopback thread.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopbackReport {
    pub transmitted: u64,
    pub echoed: u64,
    pub truncated: u64,
    pub overwrites: u64,
    pub errors: u64,
}

/// Handle to a running loopback thread. Stops it on drop.
pub struct Loopback {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<LoopbackReport>>,
}

impl Loopback {
    /// Stop the thread and collect its counters.
    pub fn stop(mut self) -> LoopbackReport {
        self.shutdown()
    }

    fn shutdown(&mut self) -> LoopbackReport {
        self.stop.store(true, Ordering::Release);
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(report)) => report,
            Some(Err(_)) => {
                log::error!("[DEV] loopback thread panicked");
                LoopbackReport::default()
            }
            None => LoopbackReport::default(),
        }
    }
}

impl Drop for Loopback {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown();
        }
    }
}

const LOOPBACK_IDLE: Duration = Duration::from_micros(200);

fn loopback_main(mut pru: SimulatedPru, stop: &AtomicBool) -> LoopbackReport {
    let mut report = LoopbackReport::default();
    log::debug!("[DEV] loopback device started");

    while !stop.load(Ordering::Acquire) {
        let frame = match pru.take_transmit() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                thread::sleep(LOOPBACK_IDLE);
                continue;
            }
            Err(e) => {
                log::warn!("[DEV] loopback transmit read failed: {}", e);
                report.errors += 1;
                thread::sleep(LOOPBACK_IDLE);
                continue;
            }
        };

        match pru.complete_transmit(Status::OUTPUT_COMPLETE) {
            Ok(()) => report.transmitted += 1,
            Err(SimError::Overwritten) => {
                log::error!("[DEV] transmit buffer modified while owned by the device");
                report.overwrites += 1;
            }
            Err(e) => {
                log::warn!("[DEV] loopback transmit completion failed: {}", e);
                report.errors += 1;
                continue;
            }
        }

        match pru.deliver_frame(&frame) {
            Ok(Delivery::Delivered) => report.echoed += 1,
            Ok(Delivery::Truncated) => {
                log::debug!("[DEV] receive buffer busy, echo dropped");
                report.truncated += 1;
            }
            Err(e) => {
                log::warn!("[DEV] loopback echo failed: {}", e);
                report.errors += 1;
            }
        }
    }

    log::debug!("[DEV] loopback device stopped: {:?}", report);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::iface::split_ports;

    fn pair() -> (SimulatedDevice, SimulatedPru) {
        simulated(InterfaceLayout::pru()).unwrap()
    }

    #[test]
    fn test_deliver_requires_device_ownership() {
        let (host, pru) = pair();
        let (mut rx, _tx) = split_ports(Arc::clone(host.region()), host.layout()).unwrap();
        assert_eq!(pru.deliver_durations(&[85, 85]).unwrap(), Delivery::Delivered);
        assert_eq!(rx.owner(), Owner::Host);

        assert_eq!(pru.deliver_durations(&[85]).unwrap(), Delivery::Truncated);
        let mut grant = rx.try_acquire().unwrap();
        assert!(grant.take_truncated());
        assert_eq!(grant.payload().unwrap(), &[85, 85]);
    }

    #[test]
    fn test_deliver_overrun_cuts_input() {
        let layout = InterfaceLayout {
            rx_capacity: 4,
            ..InterfaceLayout::pru()
        };
        let (host, pru) = simulated(layout).unwrap();
        let (mut rx, _tx) = split_ports(Arc::clone(host.region()), layout).unwrap();
        pru.deliver_durations(&[85; 6]).unwrap();
        let grant = rx.try_acquire().unwrap();
        assert_eq!(grant.status(), Status::INPUT_OVERRUN);
        assert_eq!(grant.received_len(), 4);
    }

    #[test]
    fn test_signal_wakes_host_fd() {
        let (mut host, pru) = pair();
        pru.signal().unwrap();
        pru.signal().unwrap();
        let mut buf = [0u8; 4];
        assert_eq!((&host.irq).read(&mut buf).unwrap(), 2);
        host.acknowledge().unwrap();
    }

    #[test]
    fn test_transmit_round() {
        let (host, mut pru) = pair();
        let (_rx, mut tx) = split_ports(Arc::clone(host.region()), host.layout()).unwrap();
        assert_eq!(pru.take_transmit().unwrap(), None);

        let frame = codec::encode(&codec::ECHO_FRAME).unwrap();
        let mut grant = tx.try_acquire().unwrap();
        grant.write(frame.as_bytes()).unwrap();
        grant.commit();

        assert_eq!(pru.take_transmit().unwrap().as_deref(), Some(frame.as_bytes()));
        pru.complete_transmit(Status::OUTPUT_COMPLETE).unwrap();
        assert_eq!(tx.poll_completion(), Some(Status::OUTPUT_COMPLETE));
    }

    #[test]
    fn test_overwrite_detected() {
        let (host, mut pru) = pair();
        let (_rx, mut tx) = split_ports(Arc::clone(host.region()), host.layout()).unwrap();
        let mut grant = tx.try_acquire().unwrap();
        grant.write(&[1, 2, 3, 4]).unwrap();
        grant.commit();
        pru.take_transmit().unwrap();

        // Scribble on the window behind the ownership protocol's back.
        let offset = host.layout().tx_offset;
        unsafe { host.region().bytes_mut(offset, 1) }.unwrap()[0] = 9;

        assert!(matches!(
            pru.complete_transmit(Status::OUTPUT_COMPLETE),
            Err(SimError::Overwritten)
        ));
        assert_eq!(tx.owner(), Owner::Host);
    }

    #[test]
    fn test_deliver_status_needs_ownership() {
        let (host, pru) = pair();
        let (mut rx, _tx) = split_ports(Arc::clone(host.region()), host.layout()).unwrap();
        pru.deliver_status(Status::INPUT_OVERRUN).unwrap();
        assert!(matches!(
            pru.deliver_status(Status::INPUT_OVERRUN),
            Err(SimError::NotOwned(Direction::Receive))
        ));
        assert_eq!(rx.try_acquire().unwrap().status(), Status::INPUT_OVERRUN);
    }

    #[test]
    fn test_loopback_echoes_frames() {
        let (host, pru) = pair();
        let (mut rx, mut tx) = split_ports(Arc::clone(host.region()), host.layout()).unwrap();
        let loopback = pru.spawn_loopback().unwrap();

        let frame = codec::encode(&[0xCA, 0xFE]).unwrap();
        let mut grant = tx.try_acquire().unwrap();
        grant.write(frame.as_bytes()).unwrap();
        grant.commit();

        let mut decoded = None;
        for _ in 0..2000 {
            if let Some(grant) = rx.try_acquire() {
                decoded = Some(codec::decode(grant.payload().unwrap()).unwrap());
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(decoded, Some(frame));

        let report = loopback.stop();
        assert_eq!(report.transmitted, 1);
        assert_eq!(report.echoed, 1);
        assert_eq!(report.overwrites, 0);
    }
}
