//! sensor-bridge library crate.
//!
//! This crate bridges one serial-connected sensor device to any number of
//! browsers.  Lines read from the device are validated as frames and pushed
//! to every viewer over WebSocket, together with the link's connection status.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Serial device (CRLF text lines)
//!         ↓
//! [sensor-bridge]
//!   ├── domain/           BridgeConfig
//!   ├── application/      Link state machine, status tracker, client
//!   │                     registry, single-writer control loop
//!   └── infrastructure/
//!         ├── serial_link/     tokio-serial driver + line reader task
//!         ├── reconnect_timer/ tokio sleep task behind ReconnectScheduler
//!         ├── config_file/     optional TOML configuration
//!         └── ws_server/       WebSocket accept loop (tokio-tungstenite)
//!         ↓
//! Browsers (JSON over WebSocket)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O.
//! - `application` owns all mutable bridge state and only reaches the outside
//!   world through the `LinkDriver`, `ReconnectScheduler` and `ViewerSink`
//!   traits, so it runs in tests without a device or a socket.
//! - `infrastructure` implements those traits with `tokio`, `tokio-serial` and
//!   `tokio-tungstenite`.

/// Domain layer: configuration types (no I/O).
pub mod domain;

/// Application layer: link lifecycle, status and fan-out.
pub mod application;

/// Infrastructure layer: serial port, timers, WebSocket server.
pub mod infrastructure;
