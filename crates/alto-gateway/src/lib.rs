// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Alto Ethernet gateway daemon
//!
//! Runs the [`alto_ether`] event loop against the PRU (or an in-process
//! loopback device) with settings taken from a TOML file and the command
//! line.
//!
//! # Quick Start
//!
//! ```bash
//! # On the BeagleBone, PRU firmware already loaded
//! alto-gateway
//!
//! # Log every frame, send the echo packet at startup
//! alto-gateway -l --echo
//!
//! # No hardware: every datagram comes straight back
//! alto-gateway --device loopback
//!
//! # Using config file
//! alto-gateway --config gateway.toml
//! ```
//!
//! # Configuration File
//!
//! ```toml
//! log_level = "info"
//!
//! [network]
//! bind_address = "0.0.0.0"
//! recv_port = 42424
//! send_address = "255.255.255.255"
//! send_port = 42425
//!
//! [device]
//! kind = "uio"
//! uio_path = "/dev/uio0"
//!
//! [diagnostics]
//! dump_frames = false
//! dump_bad_status = false
//! echo_on_start = false
//! poll_timeout_secs = 5
//! ```

pub mod config;

pub use config::{ConfigError, DeviceKind, GatewayConfig};

use alto_ether::device::sim::simulated;
use alto_ether::iface::InterfaceLayout;
use alto_ether::{Gateway, GatewayStats, TimingDevice, UdpRelay, UioDevice};
use std::sync::atomic::AtomicBool;

/// Open the configured device and run until `running` goes false.
///
/// Startup failures (device, sockets) are returned; per-frame faults are
/// logged by the loop and counted in the returned statistics.
pub fn run(config: &GatewayConfig, running: &AtomicBool) -> alto_ether::Result<GatewayStats> {
    let relay = UdpRelay::bind(&config.relay_config())?;
    match config.device.kind {
        DeviceKind::Uio => {
            let device = UioDevice::open(&config.device.uio_path)?;
            drive(device, relay, config, running)
        }
        DeviceKind::Loopback => {
            let (device, pru) = simulated(InterfaceLayout::pru())?;
            let loopback = pru.spawn_loopback()?;
            let stats = drive(device, relay, config, running);
            let report = loopback.stop();
            tracing::info!(
                transmitted = report.transmitted,
                echoed = report.echoed,
                truncated = report.truncated,
                "Loopback device stopped"
            );
            stats
        }
    }
}

fn drive<D: TimingDevice>(
    device: D,
    relay: UdpRelay,
    config: &GatewayConfig,
    running: &AtomicBool,
) -> alto_ether::Result<GatewayStats> {
    let local = relay.local_addr()?;
    tracing::info!(
        "Device {} <-> UDP {} -> {}",
        device.name(),
        local,
        relay.destination()
    );
    let mut gateway = Gateway::new(device, relay, config.options())?;
    gateway.run(running)?;
    Ok(*gateway.stats())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn loopback_config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.device.kind = DeviceKind::Loopback;
        config.network.bind_address = IpAddr::V4(Ipv4Addr::LOCALHOST);
        config.network.recv_port = 0;
        config.network.send_address = IpAddr::V4(Ipv4Addr::LOCALHOST);
        config
    }

    #[test]
    fn test_stopped_before_start() {
        let stats = run(&loopback_config(), &AtomicBool::new(false)).unwrap();
        assert_eq!(stats, GatewayStats::default());
    }

    #[test]
    fn test_missing_uio_node_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = loopback_config();
        config.device.kind = DeviceKind::Uio;
        config.device.uio_path = dir.path().join("uio9");

        let result = run(&config, &AtomicBool::new(true));
        assert!(matches!(result, Err(alto_ether::Error::Io(_))));
    }
}
