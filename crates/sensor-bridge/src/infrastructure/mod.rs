//! Infrastructure layer for sensor-bridge.
//!
//! The infrastructure layer handles all I/O: the serial device, the reconnect
//! timer, the optional config file and the viewer WebSocket listener.
//!
//! # Responsibilities
//!
//! - Opening the serial port and streaming its lines into the control loop
//! - Sleeping on the reconnect delay
//! - Binding the WebSocket listener and running one task per viewer
//! - Reading the TOML configuration file
//!
//! # What does NOT belong here?
//!
//! - Link state decisions, frame decoding and fan-out (application layer)
//! - Command-line parsing (that is done in `main.rs`)

pub mod config_file;
pub mod reconnect_timer;
pub mod serial_link;
pub mod ws_server;

// Re-export the primary entry points so `main.rs` can call them concisely.
pub use ws_server::{run_server, serve};
