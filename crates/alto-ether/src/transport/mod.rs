// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Network side of the gateway.

pub mod udp;

pub use udp::{unwrap_datagram, wrap_frame, RelayConfig, UdpRelay};
