//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! It is built once at startup from CLI arguments, environment variables and
//! an optional TOML file (see `main.rs` and `infrastructure::config_file`)
//! and never changes afterwards.

use std::net::SocketAddr;
use std::time::Duration;

use sensor_core::{FrameDecoder, FRAME_WIDTH, MAX_VALUE};
use thiserror::Error;

pub const DEFAULT_WS_BIND: &str = "0.0.0.0";
pub const DEFAULT_WS_PORT: u16 = 8080;
pub const DEFAULT_SERIAL_PATH: &str = "/dev/ttyUSB0";
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_RECONNECT_MS: u64 = 5000;

/// A setting that parses but cannot work.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("frame width must be at least 1")]
    ZeroFrameWidth,
    #[error("baud rate must be greater than 0")]
    ZeroBaudRate,
    #[error("serial path must not be empty")]
    EmptySerialPath,
}

/// All runtime configuration for the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Address the viewer WebSocket listener binds to.
    pub ws_bind_addr: SocketAddr,

    /// Serial device path (`/dev/ttyUSB0`, `/dev/ttyACM0`, `COM3`, ...).
    ///
    /// Also reported to viewers verbatim as `portName`.
    pub serial_path: String,

    pub baud_rate: u32,

    /// Delay between a link failure and the next open attempt.
    pub reconnect_delay: Duration,

    /// Values per frame.
    pub frame_width: usize,

    /// Largest accepted channel value.
    pub max_value: u16,
}

impl BridgeConfig {
    /// The frame decoder matching this configuration.
    pub fn decoder(&self) -> FrameDecoder {
        FrameDecoder::new(self.frame_width, self.max_value)
    }

    /// Rejects settings that would leave the bridge unable to do anything.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_width == 0 {
            return Err(ConfigError::ZeroFrameWidth);
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::ZeroBaudRate);
        }
        if self.serial_path.trim().is_empty() {
            return Err(ConfigError::EmptySerialPath);
        }
        Ok(())
    }
}

impl Default for BridgeConfig {
    /// | Field           | Default          |
    /// |-----------------|------------------|
    /// | ws_bind_addr    | `0.0.0.0:8080`   |
    /// | serial_path     | `/dev/ttyUSB0`   |
    /// | baud_rate       | 115200           |
    /// | reconnect_delay | 5 seconds        |
    /// | frame_width     | 16               |
    /// | max_value       | 1023             |
    fn default() -> Self {
        Self {
            ws_bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_WS_PORT)),
            serial_path: DEFAULT_SERIAL_PATH.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_MS),
            frame_width: FRAME_WIDTH,
            max_value: MAX_VALUE,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
