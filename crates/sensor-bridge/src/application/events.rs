//! Events consumed by the bridge control loop.
//!
//! Every I/O task (serial reader, reconnect timer, viewer sessions) talks to
//! the control loop only by sending a [`BridgeEvent`] down one bounded
//! channel.  The loop handles them strictly in arrival order, which is what
//! keeps frames and status updates from overtaking each other.

use std::fmt;
use std::net::SocketAddr;

use tokio::sync::mpsc;

use crate::application::registry::{SessionId, ViewerSink};

/// Capacity of the control loop's event queue.
pub const EVENT_QUEUE_DEPTH: usize = 256;

/// Something that happened on the physical link.
///
/// `attempt` identifies the open attempt that produced the event; the link
/// manager drops events from attempts other than the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The port finished opening.
    Opened { attempt: u64 },
    /// One complete CRLF-terminated line arrived.
    Line { attempt: u64, line: String },
    /// The port closed, with the I/O error text if it failed.
    Closed { attempt: u64, error: Option<String> },
    /// A reconnect timer elapsed.
    ReconnectTimerFired { token: u64 },
}

/// Input to the bridge control loop.
pub enum BridgeEvent {
    Link(LinkEvent),
    ViewerJoined {
        id: SessionId,
        peer: SocketAddr,
        sink: Box<dyn ViewerSink>,
    },
    ViewerLeft {
        id: SessionId,
    },
    /// SIGINT/SIGTERM: run the orderly shutdown and stop the loop.
    Shutdown,
}

impl fmt::Debug for BridgeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeEvent::Link(ev) => f.debug_tuple("Link").field(ev).finish(),
            BridgeEvent::ViewerJoined { id, peer, .. } => f
                .debug_struct("ViewerJoined")
                .field("id", id)
                .field("peer", peer)
                .finish_non_exhaustive(),
            BridgeEvent::ViewerLeft { id } => {
                f.debug_struct("ViewerLeft").field("id", id).finish()
            }
            BridgeEvent::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Creates the control loop's event channel.
pub fn event_channel() -> (mpsc::Sender<BridgeEvent>, mpsc::Receiver<BridgeEvent>) {
    mpsc::channel(EVENT_QUEUE_DEPTH)
}
