//! Serial sensor bridge: entry point.
//!
//! Reads sensor frames from a serial device and streams them, with the
//! device's connection status, to browsers over WebSocket.
//!
//! # Usage
//!
//! ```text
//! sensor-bridge [OPTIONS]
//!
//! Options:
//!   --ws-port      <PORT>  WebSocket listener port [default: 8080]
//!   --ws-bind      <ADDR>  WebSocket bind address [default: 0.0.0.0]
//!   --serial-path  <PATH>  Serial device [default: /dev/ttyUSB0]
//!   --baud-rate    <BAUD>  Serial baud rate [default: 115200]
//!   --reconnect-ms <MS>    Delay before reopening a lost port [default: 5000]
//!   --frame-width  <N>     Values per frame [default: 16]
//!   --max-value    <MAX>   Largest accepted value [default: 1023]
//!   --config       <FILE>  Optional TOML config file
//! ```
//!
//! # Precedence
//!
//! Command-line flag, then environment variable, then the config file, then
//! the built-in default.
//!
//! | Variable              | Default        |
//! |-----------------------|----------------|
//! | `SENSOR_WS_PORT`      | `8080`         |
//! | `SENSOR_WS_BIND`      | `0.0.0.0`      |
//! | `SENSOR_SERIAL_PATH`  | `/dev/ttyUSB0` |
//! | `SENSOR_BAUD_RATE`    | `115200`       |
//! | `SENSOR_RECONNECT_MS` | `5000`         |
//! | `SENSOR_FRAME_WIDTH`  | `16`           |
//! | `SENSOR_MAX_VALUE`    | `1023`         |
//! | `SENSOR_CONFIG`       | none           |
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sensor_bridge::domain::BridgeConfig;
use sensor_bridge::infrastructure::config_file::{self, FileConfig};
use sensor_bridge::infrastructure::run_server;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Serial sensor bridge.
///
/// Every option is optional; unset options fall back to the config file and
/// then to the built-in defaults.
#[derive(Debug, Parser)]
#[command(
    name = "sensor-bridge",
    about = "Streams serial sensor frames to browsers over WebSocket",
    version
)]
struct Cli {
    /// TCP port for the WebSocket server.
    #[arg(long, env = "SENSOR_WS_PORT")]
    ws_port: Option<u16>,

    /// IP address to bind the WebSocket server to.
    #[arg(long, env = "SENSOR_WS_BIND")]
    ws_bind: Option<String>,

    /// Serial device path, also reported to viewers as `portName`.
    #[arg(long, env = "SENSOR_SERIAL_PATH")]
    serial_path: Option<String>,

    #[arg(long, env = "SENSOR_BAUD_RATE")]
    baud_rate: Option<u32>,

    /// Milliseconds to wait before reopening a lost serial port.
    #[arg(long, env = "SENSOR_RECONNECT_MS")]
    reconnect_ms: Option<u64>,

    /// Number of values in one frame.
    #[arg(long, env = "SENSOR_FRAME_WIDTH")]
    frame_width: Option<usize>,

    /// Largest accepted value.
    #[arg(long, env = "SENSOR_MAX_VALUE")]
    max_value: Option<u16>,

    /// TOML config file.
    #[arg(long, env = "SENSOR_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    /// Merges the CLI arguments over `file` into a validated [`BridgeConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bind address is not a valid IP address or a
    /// setting fails [`BridgeConfig::validate`].
    fn into_bridge_config(self, file: FileConfig) -> anyhow::Result<BridgeConfig> {
        let ws_bind = self.ws_bind.unwrap_or(file.server.bind_address);
        let ws_port = self.ws_port.unwrap_or(file.server.port);
        let ws_bind_addr: SocketAddr = format!("{ws_bind}:{ws_port}")
            .parse()
            .with_context(|| format!("invalid WebSocket bind address: '{ws_bind}:{ws_port}'"))?;

        let config = BridgeConfig {
            ws_bind_addr,
            serial_path: self.serial_path.unwrap_or(file.serial.path),
            baud_rate: self.baud_rate.unwrap_or(file.serial.baud_rate),
            reconnect_delay: Duration::from_millis(
                self.reconnect_ms.unwrap_or(file.serial.reconnect_ms),
            ),
            frame_width: self.frame_width.unwrap_or(file.serial.frame_width),
            max_value: self.max_value.unwrap_or(file.serial.max_value),
        };
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// 1. Initialise `tracing` from `RUST_LOG`.
/// 2. Parse the CLI and load the optional config file.
/// 3. Spawn the signal watcher that clears the `running` flag.
/// 4. Run the server until the flag is cleared.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut cli = Cli::parse();
    let file = match cli.config.take() {
        Some(path) => config_file::load(&path)
            .with_context(|| format!("failed to load config file {}", path.display()))?,
        None => FileConfig::default(),
    };
    let config = cli.into_bridge_config(file)?;

    info!(
        "sensor bridge starting: ws={}, serial={}",
        config.ws_bind_addr, config.serial_path
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(signal) => {
                info!("received {signal}; initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => error!("failed to listen for shutdown signals: {e}"),
        }
    });

    run_server(config, running).await?;

    info!("sensor bridge stopped");
    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or, on Unix, SIGTERM.
async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.map(|()| "SIGINT"),
            _ = sigterm.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map(|()| "Ctrl+C")
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
