//! Domain layer for sensor-bridge.
//!
//! Holds the runtime configuration.  The frame, status and link-state types
//! live in `sensor-core` because they are shared with anything else that
//! speaks the viewer protocol.

pub mod config;

pub use config::{BridgeConfig, ConfigError};
