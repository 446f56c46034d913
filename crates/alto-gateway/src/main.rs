// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Alto Ethernet gateway CLI
//!
//! # Usage
//!
//! ```bash
//! # Defaults: /dev/uio0, receive on 42424, broadcast to 42425
//! alto-gateway
//!
//! # Frame logging and debug output
//! alto-gateway -l -v
//!
//! # Write an example configuration, then check it
//! alto-gateway gen-config --output gateway.toml
//! alto-gateway validate --config gateway.toml
//! ```

use alto_gateway::{ConfigError, DeviceKind, GatewayConfig};
use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Alto 3 Mb/s Ethernet to UDP gateway
#[derive(Parser, Debug)]
#[command(name = "alto-gateway")]
#[command(about = "Alto 3 Mb/s Ethernet to UDP gateway")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log every frame crossing the gateway
    #[arg(short = 'l', long)]
    log_frames: bool,

    /// Dump raw timings of receives with a bad status
    #[arg(long)]
    dump_bad_status: bool,

    /// Send the diagnostic echo packet to the Alto at startup
    #[arg(long)]
    echo: bool,

    /// Timing device (uio or loopback)
    #[arg(long)]
    device: Option<DeviceKind>,

    /// UIO node of the PRU subsystem
    #[arg(long)]
    uio_path: Option<PathBuf>,

    /// Address to receive datagrams on
    #[arg(long)]
    bind_address: Option<IpAddr>,

    /// Port to receive datagrams on
    #[arg(long)]
    recv_port: Option<u16>,

    /// Address frames from the Alto are sent to
    #[arg(long)]
    send_address: Option<IpAddr>,

    /// Port frames from the Alto are sent to
    #[arg(long)]
    send_port: Option<u16>,

    /// Debug output (same as --log-level debug)
    #[arg(short, long)]
    verbose: bool,

    /// Trace output (same as --log-level trace)
    #[arg(short, long)]
    debug: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "gateway.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Some(cmd) = args.command {
        init_logging("info");
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let config = build_config(&args)?;
    init_logging(&config.log_level);

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, shutting down...");
        flag.store(false, Ordering::Release);
    })?;

    println!("Alto Ethernet Gateway v{}", env!("CARGO_PKG_VERSION"));
    println!("==============================");
    println!();
    println!("Press Ctrl+C to stop...");
    println!();

    let stats = alto_gateway::run(&config, &running)?;

    println!("\nFinal Statistics:");
    println!("  Alto -> UDP: {}", stats.packet_summary());
    println!("  {}", stats);
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// File (or defaults) first, then command-line overrides.
fn build_config(args: &Args) -> Result<GatewayConfig, ConfigError> {
    let mut config = match args.config {
        Some(ref path) => GatewayConfig::from_file(path)?,
        None => GatewayConfig::default(),
    };

    if let Some(kind) = args.device {
        config.device.kind = kind;
    }
    if let Some(ref path) = args.uio_path {
        config.device.uio_path = path.clone();
    }
    if let Some(addr) = args.bind_address {
        config.network.bind_address = addr;
    }
    if let Some(port) = args.recv_port {
        config.network.recv_port = port;
    }
    if let Some(addr) = args.send_address {
        config.network.send_address = addr;
    }
    if let Some(port) = args.send_port {
        config.network.send_port = port;
    }
    config.diagnostics.dump_frames |= args.log_frames;
    config.diagnostics.dump_bad_status |= args.dump_bad_status;
    config.diagnostics.echo_on_start |= args.echo;

    if args.debug {
        config.log_level = "trace".into();
    } else if args.verbose {
        config.log_level = "debug".into();
    } else if let Some(ref level) = args.log_level {
        config.log_level = level.clone();
    }

    config.validate()?;
    Ok(config)
}

fn cmd_gen_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = GatewayConfig::default();
    config.diagnostics.dump_bad_status = true;

    let toml_str = toml::to_string_pretty(&config)?;

    let content = format!(
        r#"# Alto Ethernet Gateway Configuration
# Generated by alto-gateway gen-config
#
# [device] kind is "uio" (PRU) or "loopback" (echo every frame, no hardware)

{}
"#,
        toml_str
    );

    std::fs::write(&output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match GatewayConfig::from_file(&config_path) {
        Ok(config) => {
            let relay = config.relay_config();
            println!("Configuration valid!");
            println!();
            println!("Device: {:?} ({})", config.device.kind, config.device.uio_path.display());
            println!("Receive on: {}", relay.bind);
            println!("Send to: {}", relay.destination);
            println!(
                "Tick: {}s, frame dump: {}, echo on start: {}",
                config.diagnostics.poll_timeout_secs,
                config.diagnostics.dump_frames,
                config.diagnostics.echo_on_start
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_defaults() {
        let args = Args::parse_from([
            "alto-gateway",
            "--device",
            "loopback",
            "--recv-port",
            "5000",
            "-l",
            "-v",
        ]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.device.kind, DeviceKind::Loopback);
        assert_eq!(config.network.recv_port, 5000);
        assert!(config.diagnostics.dump_frames);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(&path, "[network]\nsend_port = 6000\nrecv_port = 6001\n").unwrap();

        let args = Args::parse_from([
            "alto-gateway",
            "--config",
            path.to_str().unwrap(),
            "--send-port",
            "7000",
        ]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.network.send_port, 7000);
        assert_eq!(config.network.recv_port, 6001);
    }

    #[test]
    fn test_cli_rejects_port_zero() {
        let args = Args::parse_from(["alto-gateway", "--send-port", "0"]);
        assert!(matches!(build_config(&args), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_gen_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        cmd_gen_config(path.clone()).unwrap();

        let config = GatewayConfig::from_file(&path).unwrap();
        assert!(config.diagnostics.dump_bad_status);
        assert_eq!(config.network, GatewayConfig::default().network);
    }
}
