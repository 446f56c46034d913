// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # alto-ether - Alto 3 Mb/s Ethernet to UDP gateway
//!
//! Bridges a Xerox Alto's experimental Ethernet to UDP. A PRU coprocessor
//! samples and drives the coax; this crate is the host side: it decodes
//! the pulse timings the PRU records, relays good frames as UDP
//! broadcasts, and hands datagrams from emulators back to the PRU.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use alto_ether::{Gateway, GatewayOptions, RelayConfig, Result, UdpRelay, UioDevice};
//! use std::sync::atomic::AtomicBool;
//!
//! fn main() -> Result<()> {
//!     let device = UioDevice::open(UioDevice::DEFAULT_PATH)?;
//!     let relay = UdpRelay::bind(&RelayConfig::default())?;
//!     let mut gateway = Gateway::new(device, relay, GatewayOptions::default())?;
//!     gateway.run(&AtomicBool::new(true))
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |  engine     Gateway: mio loop, receive and send handlers      |
//! +----------------------+--------------------+------------------+
//! |  codec               |  transport::udp    |  device          |
//! |  durations -> Frame  |  word-count header |  UIO / simulated |
//! |  Frame <- payload    |  broadcast relay   |  line model      |
//! +----------------------+--------------------+------------------+
//! |  iface      interface block, owner words, buffer grants       |
//! +--------------------------------------------------------------+
//! |  crc        Alto CRC-16                                       |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`codec`] - timing decoder and frame encoder
//! - [`iface`] - memory shared with the PRU and the ownership handshake
//! - [`device`] - UIO backend and in-process simulation
//! - [`transport`] - UDP datagram format and relay
//! - [`engine`] - the event loop

pub mod codec;
pub mod config;
pub mod crc;
pub mod device;
pub mod engine;
pub mod error;
pub mod iface;
pub mod transport;

pub use codec::{decode, encode, Decoder, Frame, ECHO_FRAME};
pub use crc::crc16;
pub use device::{TimingDevice, UioDevice};
pub use engine::{Gateway, GatewayOptions, GatewayStats};
pub use error::{DatagramError, DecodeError, EncodeError, Error, FramingError, IfaceError, Result};
pub use iface::{Direction, Owner, Status};
pub use transport::{RelayConfig, UdpRelay};
