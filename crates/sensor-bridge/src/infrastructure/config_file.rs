//! Optional TOML configuration file.
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 8080
//!
//! [serial]
//! path = "/dev/ttyACM0"
//! baud_rate = 115200
//! reconnect_ms = 5000
//! frame_width = 16
//! max_value = 1023
//! ```
//!
//! Every field and section is optional; a missing one takes the built-in
//! default.  Command-line flags and environment variables override the file
//! (see `main.rs`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sensor_core::{FRAME_WIDTH, MAX_VALUE};

use crate::domain::config::{
    DEFAULT_BAUD_RATE, DEFAULT_RECONNECT_MS, DEFAULT_SERIAL_PATH, DEFAULT_WS_BIND,
    DEFAULT_WS_PORT,
};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Schema ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub serial: SerialSection,
}

/// Viewer listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// IP address to bind.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Serial link and frame settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SerialSection {
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Delay before a reconnect attempt, in milliseconds.
    #[serde(default = "default_reconnect_ms")]
    pub reconnect_ms: u64,
    #[serde(default = "default_frame_width")]
    pub frame_width: usize,
    #[serde(default = "default_max_value")]
    pub max_value: u16,
}

fn default_bind_address() -> String {
    DEFAULT_WS_BIND.to_string()
}
fn default_port() -> u16 {
    DEFAULT_WS_PORT
}
fn default_path() -> String {
    DEFAULT_SERIAL_PATH.to_string()
}
fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}
fn default_reconnect_ms() -> u64 {
    DEFAULT_RECONNECT_MS
}
fn default_frame_width() -> usize {
    FRAME_WIDTH
}
fn default_max_value() -> u16 {
    MAX_VALUE
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            path: default_path(),
            baud_rate: default_baud_rate(),
            reconnect_ms: default_reconnect_ms(),
            frame_width: default_frame_width(),
            max_value: default_max_value(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Reads and parses the file at `path`.
///
/// Unlike a settings store, an explicitly named file that is missing is an
/// error, not an empty config.
///
/// # Errors
///
/// Returns [`ConfigFileError::Io`] if the file cannot be read and
/// [`ConfigFileError::Parse`] if the TOML is malformed.
pub fn load(path: &Path) -> Result<FileConfig, ConfigFileError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&content)
}

/// Parses TOML text.
///
/// # Errors
///
/// Returns [`ConfigFileError::Parse`] if the TOML is malformed or names an
/// unknown key.
pub fn parse(content: &str) -> Result<FileConfig, ConfigFileError> {
    Ok(toml::from_str(content)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        // Arrange / Act
        let cfg = parse("").expect("parse");

        // Assert
        assert_eq!(cfg, FileConfig::default());
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.serial.reconnect_ms, 5000);
        assert_eq!(cfg.serial.frame_width, 16);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let cfg = parse(
            r#"
            [serial]
            path = "/dev/ttyACM0"
            "#,
        )
        .expect("parse");

        assert_eq!(cfg.serial.path, "/dev/ttyACM0");
        assert_eq!(cfg.serial.baud_rate, 115_200);
        assert_eq!(cfg.server, ServerSection::default());
    }

    #[test]
    fn test_full_file_is_read() {
        let cfg = parse(
            r#"
            [server]
            bind_address = "127.0.0.1"
            port = 9001

            [serial]
            path = "COM3"
            baud_rate = 9600
            reconnect_ms = 250
            frame_width = 8
            max_value = 4095
            "#,
        )
        .expect("parse");

        assert_eq!(cfg.server.bind_address, "127.0.0.1");
        assert_eq!(cfg.server.port, 9001);
        assert_eq!(cfg.serial.path, "COM3");
        assert_eq!(cfg.serial.baud_rate, 9600);
        assert_eq!(cfg.serial.reconnect_ms, 250);
        assert_eq!(cfg.serial.frame_width, 8);
        assert_eq!(cfg.serial.max_value, 4095);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result = parse("[serial]\nbaud = 9600\n");
        assert!(matches!(result, Err(ConfigFileError::Parse(_))));
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let result = parse("[server]\nport = \"eighty\"\n");
        assert!(matches!(result, Err(ConfigFileError::Parse(_))));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let path = Path::new("/nonexistent/sensor-bridge.toml");

        let err = load(path).expect_err("missing file must fail");

        match err {
            ConfigFileError::Io { path: p, .. } => assert_eq!(p, path),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_reads_file_from_disk() {
        // Arrange
        let path = std::env::temp_dir().join(format!(
            "sensor-bridge-config-{}.toml",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&path, "[server]\nport = 7000\n").expect("write temp config");

        // Act
        let result = load(&path);
        let _ = std::fs::remove_file(&path);

        // Assert
        assert_eq!(result.expect("load").server.port, 7000);
    }
}
