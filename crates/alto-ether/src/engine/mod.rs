// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Gateway session and event loop.
//!
//! # Loop
//!
//! ```text
//!             +--------------------- mio::Poll ---------------------+
//!             |  device event fd (always)   UDP socket (tx = host)  |
//!             +-----------------------------------------------------+
//!                 | ack, observe tx completion        |
//!                 v                                   v
//!   rx = host? -> copy, re-arm, decode, relay   tx = host? -> read, encode, commit
//! ```
//!
//! Everything runs on one thread. The only state shared with the device is
//! the interface block, accessed through the ports.

mod stats;

pub use stats::GatewayStats;

use crate::codec::{self, Decoder, Frame, ECHO_FRAME};
use crate::config::DEFAULT_POLL_TIMEOUT;
use crate::device::TimingDevice;
use crate::error::{Error, Result};
use crate::iface::{split_ports, Direction, ReceivePort, TransmitPort};
use crate::transport::udp::{unwrap_datagram, UdpRelay, MAX_DATAGRAM_LEN};
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const DEVICE: Token = Token(0);
const UDP: Token = Token(1);

/// Runtime switches of a [`Gateway`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayOptions {
    /// Wait limit per iteration; only drives the diagnostic tick.
    pub poll_timeout: Duration,
    /// Log every frame crossing the gateway.
    pub dump_frames: bool,
    /// Log the raw durations of receives completing with a bad status.
    pub dump_bad_status: bool,
    /// Send [`ECHO_FRAME`] to the Alto once the loop starts.
    pub echo_on_start: bool,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            dump_frames: false,
            dump_bad_status: false,
            echo_on_start: false,
        }
    }
}

/// Bridges one timing device and one UDP relay.
pub struct Gateway<D: TimingDevice> {
    device: D,
    rx: ReceivePort,
    tx: TransmitPort,
    relay: UdpRelay,
    decoder: Decoder,
    poll: Poll,
    events: Events,
    udp_registered: bool,
    /// Private copy of the last receive buffer.
    durations: Vec<u8>,
    datagram: Vec<u8>,
    echo_pending: bool,
    stats: GatewayStats,
    options: GatewayOptions,
}

impl<D: TimingDevice> Gateway<D> {
    /// Attach to `device`, arm the receive buffer and start watching the
    /// device's event fd.
    pub fn new(device: D, relay: UdpRelay, options: GatewayOptions) -> Result<Self> {
        let (rx, tx) = split_ports(Arc::clone(device.region()), device.layout())?;
        let poll = Poll::new()?;
        poll.registry().register(
            &mut SourceFd(&device.event_fd()),
            DEVICE,
            Interest::READABLE,
        )?;

        log::info!(
            "[GW] gateway up: device={} udp={} -> {}",
            device.name(),
            relay.local_addr()?,
            relay.destination()
        );
        Ok(Self {
            rx,
            tx,
            decoder: Decoder::new(),
            poll,
            events: Events::with_capacity(8),
            udp_registered: false,
            durations: Vec::with_capacity(device.layout().rx_capacity),
            datagram: vec![0u8; MAX_DATAGRAM_LEN],
            echo_pending: options.echo_on_start,
            stats: GatewayStats::default(),
            options,
            device,
            relay,
        })
    }

    pub fn stats(&self) -> &GatewayStats {
        &self.stats
    }

    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Address datagrams for the Alto should be sent to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.relay.local_addr()
    }

    /// Loop until `running` goes false.
    pub fn run(&mut self, running: &AtomicBool) -> Result<()> {
        log::info!("[GW] running (tick every {:?})", self.options.poll_timeout);
        while running.load(Ordering::Acquire) {
            self.poll_once(Some(self.options.poll_timeout))?;
        }
        log::info!("[GW] stopped: {}", self.stats);
        Ok(())
    }

    /// One iteration: wait, acknowledge the device, finish a transmit,
    /// drain the receive buffer, feed the transmit buffer.
    ///
    /// Only failures of the wait itself are returned; per-frame errors are
    /// logged and counted.
    pub fn poll_once(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.watch_udp(self.tx.is_available())?;

        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        let mut device_ready = false;
        for event in self.events.iter() {
            if event.token() == DEVICE {
                device_ready = true;
            }
        }
        if self.events.is_empty() {
            self.tick();
        }
        if device_ready {
            if let Err(e) = self.device.acknowledge() {
                log::warn!("[DEV] acknowledge failed: {}", e);
            }
        }

        self.observe_transmit();
        if self.echo_pending {
            self.queue_echo();
        }
        if let Err(e) = self.handle_receive() {
            self.report(&e);
        }
        self.drain_datagrams();
        Ok(())
    }

    /// Service the receive buffer if the device has handed it over.
    ///
    /// Returns the decoded frame, already relayed. The buffer goes back to
    /// the device before decoding, whatever the outcome.
    pub fn handle_receive(&mut self) -> Result<Option<Frame>> {
        let Some(mut grant) = self.rx.try_acquire() else {
            return Ok(None);
        };

        if grant.take_truncated() {
            self.stats.truncations += 1;
            log::warn!("[RX] input arrived while the receive buffer was busy");
        }

        let status = grant.status();
        if !status.is_input_complete() {
            self.stats.receive_failures += 1;
            if self.options.dump_bad_status {
                match grant.payload() {
                    Ok(raw) => log::info!("[RX] durations on {}: {:?}", status, raw),
                    Err(e) => log::info!("[RX] durations on {} unavailable: {}", status, e),
                }
            }
            return Err(Error::DeviceStatus {
                direction: Direction::Receive,
                status,
            });
        }

        let copied = grant.copy_out(&mut self.durations);
        grant.release();
        if let Err(e) = copied {
            self.stats.receive_failures += 1;
            return Err(e.into());
        }

        self.stats.frames_received += 1;
        let frame = match self.decoder.decode(&self.durations) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.bad_frames += 1;
                return Err(e.into());
            }
        };

        log::debug!("[RX] frame of {} words", frame.word_count());
        if self.options.dump_frames {
            log::info!("[RX] {}", hex_dump(frame.as_bytes()));
        }
        match self.relay.send_frame(&frame) {
            Ok(_) => self.stats.frames_relayed += 1,
            Err(e) => {
                self.stats.relay_failures += 1;
                log::warn!("[UDP] send to {} failed: {}", self.relay.destination(), e);
            }
        }
        Ok(Some(frame))
    }

    /// Put one datagram's payload on the wire to the Alto.
    ///
    /// Fails with [`Error::OwnershipViolation`] while the previous frame is
    /// still being sent; the datagram is dropped.
    pub fn handle_datagram(&mut self, datagram: &[u8]) -> Result<()> {
        self.stats.datagrams_received += 1;
        let result = self.commit_datagram(datagram);
        if result.is_err() {
            self.stats.datagrams_dropped += 1;
        }
        result
    }

    fn commit_datagram(&mut self, datagram: &[u8]) -> Result<()> {
        let payload = unwrap_datagram(datagram)?;
        let frame = codec::encode(payload)?;
        self.transmit(&frame)
    }

    fn transmit(&mut self, frame: &Frame) -> Result<()> {
        self.observe_transmit();
        let Some(mut grant) = self.tx.try_acquire() else {
            return Err(Error::OwnershipViolation(Direction::Transmit));
        };
        grant.write(frame.as_bytes())?;
        grant.commit();

        self.stats.frames_transmitted += 1;
        log::debug!("[TX] frame of {} words", frame.word_count());
        if self.options.dump_frames {
            log::info!("[TX] {}", hex_dump(frame.as_bytes()));
        }
        Ok(())
    }

    /// Account for a transmit the device has finished since last time.
    fn observe_transmit(&mut self) {
        let Some(status) = self.tx.poll_completion() else {
            return;
        };
        if status.is_output_complete() {
            log::trace!("[TX] complete");
        } else {
            self.stats.transmit_failures += 1;
            self.report(&Error::DeviceStatus {
                direction: Direction::Transmit,
                status,
            });
        }
    }

    fn queue_echo(&mut self) {
        if !self.tx.is_available() {
            return;
        }
        self.echo_pending = false;
        let sent = codec::encode(&ECHO_FRAME)
            .map_err(Error::from)
            .and_then(|frame| self.transmit(&frame));
        match sent {
            Ok(()) => log::info!("[TX] echo frame queued"),
            Err(e) => self.report(&e),
        }
    }

    /// Read datagrams while the transmit buffer is free to take them.
    fn drain_datagrams(&mut self) {
        loop {
            self.observe_transmit();
            if !self.tx.is_available() {
                return;
            }

            let mut buf = std::mem::take(&mut self.datagram);
            let outcome = match self.relay.recv(&mut buf) {
                Ok(Some((len, src))) => {
                    log::debug!("[UDP] {} bytes from {}", len, src);
                    Some(self.handle_datagram(&buf[..len]))
                }
                Ok(None) => None,
                Err(e) => {
                    log::warn!("[UDP] receive failed: {}", e);
                    None
                }
            };
            self.datagram = buf;

            match outcome {
                None => return,
                Some(Ok(())) => {}
                Some(Err(e)) => self.report(&e),
            }
        }
    }

    /// Keep the UDP socket in the poll set only while a datagram could be
    /// accepted.
    fn watch_udp(&mut self, want: bool) -> Result<()> {
        if want == self.udp_registered {
            return Ok(());
        }
        let registry = self.poll.registry();
        if want {
            registry.register(self.relay.source_mut(), UDP, Interest::READABLE)?;
        } else {
            registry.deregister(self.relay.source_mut())?;
        }
        self.udp_registered = want;
        Ok(())
    }

    fn tick(&self) {
        log::debug!(
            "[GW] tick: rx {:?}, tx {:?}; {}",
            self.rx.owner(),
            self.tx.owner(),
            self.stats
        );
    }

    fn report(&self, err: &Error) {
        match err {
            Error::Framing(_) | Error::Overflow { .. } => {
                log::warn!("[RX] {}", err);
                log::warn!("[RX] {}", self.stats.packet_summary());
            }
            Error::DeviceStatus {
                direction: Direction::Receive,
                ..
            } => log::warn!("[RX] {}", err),
            Error::DeviceStatus { .. } => log::warn!("[TX] {}", err),
            Error::Datagram(_) | Error::Encode(_) => log::warn!("[UDP] dropped: {}", err),
            Error::OwnershipViolation(_) | Error::Iface(_) => log::error!("[GW] {}", err),
            Error::Io(_) => log::warn!("[GW] {}", err),
        }
    }
}

/// Bytes as space-separated hex pairs.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{:02x}", b));
    }
    out
}
