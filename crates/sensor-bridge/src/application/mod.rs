//! Application layer for sensor-bridge.
//!
//! The application layer owns every piece of mutable bridge state: the link
//! phase, the reconnect timer, the status snapshot and the viewer set.  All of
//! it is mutated by one control loop ([`bridge_service::Bridge`]) that handles
//! one [`BridgeEvent`] at a time.
//!
//! # Responsibilities
//!
//! - Driving the serial link state machine (open, close, reconnect)
//! - Decoding lines into frames and routing them to viewers
//! - Tracking and announcing link status
//! - Registering, fanning out to, and pruning viewer sessions
//!
//! # What does NOT belong here?
//!
//! - Opening serial ports or sockets (infrastructure implements
//!   [`LinkDriver`] and [`ViewerSink`])
//! - Sleeping on timers (infrastructure implements [`ReconnectScheduler`])

pub mod bridge_service;
pub mod events;
pub mod link_manager;
pub mod registry;
pub mod status_tracker;

pub use bridge_service::Bridge;
pub use events::{event_channel, BridgeEvent, LinkEvent, EVENT_QUEUE_DEPTH};
pub use link_manager::{
    LinkDriver, LinkError, LinkEventSink, LinkOutput, LinkPhase, ReconnectScheduler,
    SerialLinkManager,
};
pub use registry::{BroadcastReport, ClientRegistry, SessionId, ViewerSendError, ViewerSink};
pub use status_tracker::StatusTracker;
