//! # sensor-core
//!
//! Shared library for the serial sensor bridge containing the frame decoder,
//! the CRLF line framer, the browser-facing wire messages and the link state
//! types.
//!
//! It has zero dependencies on OS APIs, serial ports, or network sockets, so
//! every rule in here can be tested with plain strings and byte slices.
//!
//! # Architecture overview
//!
//! A microcontroller samples sixteen analogue channels and prints one line per
//! sweep over USB serial:
//!
//! ```text
//! 512 498 1023 0 77 ... 301\r\n
//! ```
//!
//! The bridge turns that byte stream into frames and pushes them to browsers.
//! This crate holds the pieces of that pipeline that are pure functions:
//!
//! - **`protocol`** – How bytes become frames (`line`, `frame`) and how frames
//!   and status updates look on the WebSocket wire (`messages`).
//!
//! - **`domain`** – The link connectivity state and the status snapshot that
//!   every viewer is told about.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `sensor_core::SensorFrame` instead of `sensor_core::protocol::frame::SensorFrame`.
pub use domain::link::{LinkState, StatusSnapshot};
pub use protocol::frame::{FrameDecoder, FrameError, SensorFrame, FRAME_WIDTH, MAX_VALUE};
pub use protocol::line::{LineError, LineFramer};
pub use protocol::messages::{StatusMessage, ViewerMessage, WireStatus};
