//! StatusTracker: the authoritative link-status snapshot.
//!
//! Viewers only ever see `connected` or `disconnected`.  The transient
//! `Connecting` state is recorded but never announced, so a failed open
//! attempt produces exactly one `disconnected` broadcast, not a flicker.

use sensor_core::{LinkState, StatusMessage, StatusSnapshot, ViewerMessage};

#[derive(Debug, Clone)]
pub struct StatusTracker {
    snapshot: StatusSnapshot,
}

impl StatusTracker {
    /// Starts out `Disconnected` for `port_name`.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            snapshot: StatusSnapshot::disconnected(port_name),
        }
    }

    pub fn snapshot(&self) -> &StatusSnapshot {
        &self.snapshot
    }

    /// The message sent to a viewer right after it registers.
    pub fn current_message(&self) -> ViewerMessage {
        ViewerMessage::from(StatusMessage::from(&self.snapshot))
    }

    /// Records `state` and returns the broadcast it calls for, if any.
    ///
    /// Returns `None` when the state did not change or when the new state is
    /// `Connecting`.
    pub fn apply(&mut self, state: LinkState) -> Option<ViewerMessage> {
        if self.snapshot.state == state {
            return None;
        }
        self.snapshot.state = state;
        match state {
            LinkState::Connecting => None,
            LinkState::Connected | LinkState::Disconnected => Some(self.current_message()),
        }
    }
}
