//! Link connectivity state and the derived status snapshot.
//!
//! # State machine (as seen from outside the link manager)
//!
//! ```text
//!                connect attempt
//! Disconnected ─────────────────► Connecting
//!      ▲                              │ open confirmed
//!      │   close / error / open fail  ▼
//!      └─────────────────────────  Connected
//! ```
//!
//! Only link events move the state; viewers never do.

use std::fmt;

/// Connectivity of the physical serial link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// No handle is open and no open is in progress.
    #[default]
    Disconnected,
    /// A handle was created and the open confirmation is pending.
    Connecting,
    /// The port is open and lines are being read.
    Connected,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// The current link state together with the configured port identifier.
///
/// The port name is static configuration (the path the bridge opens), not
/// something read back from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub state: LinkState,
    pub port_name: String,
}

impl StatusSnapshot {
    /// A disconnected snapshot for `port_name`, the state at process start.
    pub fn disconnected(port_name: impl Into<String>) -> Self {
        Self {
            state: LinkState::Disconnected,
            port_name: port_name.into(),
        }
    }
}
