// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Gateway configuration.
//!
//! Every field has a default, so an empty file (or no file at all) gives a
//! gateway on the PRU listening on 42424 and broadcasting to 42425.

use alto_ether::config::{DEFAULT_POLL_TIMEOUT, UDP_RECV_PORT, UDP_SEND_PORT};
use alto_ether::{GatewayOptions, RelayConfig, UioDevice};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level gateway configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

/// UDP side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Address the receive socket binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Port emulators send to.
    #[serde(default = "default_recv_port")]
    pub recv_port: u16,

    /// Where frames from the Alto are sent (broadcast by default).
    #[serde(default = "default_send_address")]
    pub send_address: IpAddr,

    #[serde(default = "default_send_port")]
    pub send_port: u16,
}

/// Which timing device drives the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// PRU behind a UIO node.
    Uio,
    /// In-process device that echoes every transmitted frame.
    Loopback,
}

impl std::str::FromStr for DeviceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uio" => Ok(Self::Uio),
            "loopback" => Ok(Self::Loopback),
            other => Err(ConfigError::Invalid(format!(
                "unknown device kind '{}' (expected uio or loopback)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_device_kind")]
    pub kind: DeviceKind,

    /// UIO node mapping the PRU subsystem.
    #[serde(default = "default_uio_path")]
    pub uio_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Log every frame crossing the gateway.
    #[serde(default)]
    pub dump_frames: bool,

    /// Dump raw timings of receives that end with a bad status.
    #[serde(default)]
    pub dump_bad_status: bool,

    /// Send the diagnostic echo packet to the Alto at startup.
    #[serde(default)]
    pub echo_on_start: bool,

    /// Idle tick interval (seconds).
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_recv_port() -> u16 {
    UDP_RECV_PORT
}

fn default_send_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::BROADCAST)
}

fn default_send_port() -> u16 {
    UDP_SEND_PORT
}

fn default_device_kind() -> DeviceKind {
    DeviceKind::Uio
}

fn default_uio_path() -> PathBuf {
    PathBuf::from(UioDevice::DEFAULT_PATH)
}

fn default_poll_timeout_secs() -> u64 {
    DEFAULT_POLL_TIMEOUT.as_secs()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            recv_port: default_recv_port(),
            send_address: default_send_address(),
            send_port: default_send_port(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            kind: default_device_kind(),
            uio_path: default_uio_path(),
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            dump_frames: false,
            dump_bad_status: false,
            echo_on_start: false,
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            network: NetworkConfig::default(),
            device: DeviceConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.recv_port == 0 {
            return Err(ConfigError::Invalid("recv_port must not be 0".into()));
        }
        if self.network.send_port == 0 {
            return Err(ConfigError::Invalid("send_port must not be 0".into()));
        }
        if self.diagnostics.poll_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_timeout_secs must be at least 1".into(),
            ));
        }
        if self.device.kind == DeviceKind::Uio && self.device.uio_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("uio_path is empty".into()));
        }
        Ok(())
    }

    /// Socket addresses for the relay.
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            bind: SocketAddr::new(self.network.bind_address, self.network.recv_port),
            destination: SocketAddr::new(self.network.send_address, self.network.send_port),
        }
    }

    /// Event loop options.
    pub fn options(&self) -> GatewayOptions {
        GatewayOptions {
            poll_timeout: Duration::from_secs(self.diagnostics.poll_timeout_secs),
            dump_frames: self.diagnostics.dump_frames,
            dump_bad_status: self.diagnostics.dump_bad_status,
            echo_on_start: self.diagnostics.echo_on_start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = GatewayConfig::from_toml_str("").unwrap();
        assert_eq!(config, GatewayConfig::default());
        assert_eq!(config.device.kind, DeviceKind::Uio);
        assert_eq!(config.device.uio_path, PathBuf::from("/dev/uio0"));
    }

    #[test]
    fn test_default_relay_addresses() {
        let relay = GatewayConfig::default().relay_config();
        assert_eq!(relay.bind, "0.0.0.0:42424".parse().unwrap());
        assert_eq!(relay.destination, "255.255.255.255:42425".parse().unwrap());
    }

    #[test]
    fn test_partial_sections() {
        let config = GatewayConfig::from_toml_str(
            r#"
log_level = "debug"

[network]
send_address = "192.168.1.255"

[device]
kind = "loopback"

[diagnostics]
dump_frames = true
poll_timeout_secs = 2
"#,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.network.recv_port, 42424);
        assert_eq!(
            config.relay_config().destination,
            "192.168.1.255:42425".parse().unwrap()
        );
        assert_eq!(config.device.kind, DeviceKind::Loopback);

        let options = config.options();
        assert!(options.dump_frames);
        assert!(!options.echo_on_start);
        assert_eq!(options.poll_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_validation() {
        let mut config = GatewayConfig::default();
        assert!(config.validate().is_ok());

        config.network.recv_port = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = GatewayConfig::default();
        config.diagnostics.poll_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_unknown_device_kind() {
        let result = GatewayConfig::from_toml_str("[device]\nkind = \"serial\"\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
        assert!("serial".parse::<DeviceKind>().is_err());
        assert_eq!("loopback".parse::<DeviceKind>().unwrap(), DeviceKind::Loopback);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[network]\nrecv_port = 5000\nsend_port = 5001").unwrap();

        let config = GatewayConfig::from_file(file.path()).unwrap();
        assert_eq!(config.relay_config().bind.port(), 5000);
        assert_eq!(config.relay_config().destination.port(), 5001);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = GatewayConfig::from_file(dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_config_serialization() {
        let toml_str = toml::to_string_pretty(&GatewayConfig::default()).unwrap();
        assert!(toml_str.contains("recv_port = 42424"));
        assert!(toml_str.contains("kind = \"uio\""));
        assert_eq!(
            GatewayConfig::from_toml_str(&toml_str).unwrap(),
            GatewayConfig::default()
        );
    }
}
