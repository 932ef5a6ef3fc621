//! ClientRegistry: the set of connected viewers.
//!
//! Viewers are kept in registration order, so a broadcast reaches them in the
//! order they joined.  Each viewer is reached through a [`ViewerSink`], which
//! the WebSocket layer implements on top of a per-session outbound queue;
//! `send_text` never blocks, so one slow browser cannot hold up the rest.
//!
//! A failed send removes only the viewer that failed.

pub mod mock;

use std::fmt;

use sensor_core::{StatusSnapshot, StatusMessage, ViewerMessage};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identifier for one viewer connection, unique for the process lifetime.
pub type SessionId = Uuid;

/// Why a message could not be handed to a viewer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ViewerSendError {
    /// The session's writer has gone away.
    #[error("viewer connection is closed")]
    Closed,
    /// The session's outbound queue is full.
    #[error("viewer outbound queue is full")]
    Backlogged,
}

/// Outbound half of one viewer connection.
pub trait ViewerSink: Send {
    /// Whether the connection can still accept messages.
    fn is_writable(&self) -> bool;
    /// Queues one text frame without blocking.
    fn send_text(&mut self, text: &str) -> Result<(), ViewerSendError>;
    /// Asks the connection to close.
    fn close(&mut self);
}

/// Counts from one [`ClientRegistry::broadcast`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Viewers the message was queued for.
    pub delivered: usize,
    /// Viewers skipped because they were not writable.
    pub skipped: usize,
    /// Viewers removed because the send failed.
    pub dropped: usize,
}

struct Session {
    id: SessionId,
    sink: Box<dyn ViewerSink>,
}

#[derive(Default)]
pub struct ClientRegistry {
    sessions: Vec<Session>,
}

impl fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("sessions", &self.sessions.iter().map(|s| s.id).collect::<Vec<_>>())
            .finish()
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a viewer and sends it the current status snapshot.
    ///
    /// The snapshot is the first message the viewer receives.  If it cannot
    /// be delivered the viewer is not kept.  Registering an id that is
    /// already present replaces the old session.
    ///
    /// # Errors
    ///
    /// Returns the [`ViewerSendError`] from the snapshot send.
    pub fn register(
        &mut self,
        id: SessionId,
        mut sink: Box<dyn ViewerSink>,
        snapshot: &StatusSnapshot,
    ) -> Result<(), ViewerSendError> {
        if self.unregister(id) {
            warn!("viewer {id} registered twice; replacing the old session");
        }

        let message = ViewerMessage::from(StatusMessage::from(snapshot));
        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!("failed to serialise status snapshot: {e}");
                return Err(ViewerSendError::Closed);
            }
        };
        sink.send_text(&text)?;

        self.sessions.push(Session { id, sink });
        info!("viewer {id} registered ({} connected)", self.sessions.len());
        Ok(())
    }

    /// Removes a viewer.  Returns whether it was present.
    pub fn unregister(&mut self, id: SessionId) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id != id);
        let removed = self.sessions.len() != before;
        if removed {
            debug!("viewer {id} unregistered ({} connected)", self.sessions.len());
        }
        removed
    }

    /// Sends `message` to every writable viewer.
    ///
    /// The message is serialised once.  Viewers that are not writable are
    /// skipped; they are removed when their session reports that it left.
    /// A viewer whose send fails is removed immediately and the broadcast
    /// continues with the rest.
    pub fn broadcast(&mut self, message: &ViewerMessage) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        if self.sessions.is_empty() {
            return report;
        }

        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!("failed to serialise {} message: {e}", message.kind());
                return report;
            }
        };

        self.sessions.retain_mut(|session| {
            if !session.sink.is_writable() {
                report.skipped += 1;
                return true;
            }
            match session.sink.send_text(&text) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(e) => {
                    warn!("dropping viewer {}: {e}", session.id);
                    session.sink.close();
                    report.dropped += 1;
                    false
                }
            }
        });
        report
    }

    /// Closes and forgets every viewer.  Returns how many were closed.
    pub fn close_all(&mut self) -> usize {
        let count = self.sessions.len();
        for session in &mut self.sessions {
            session.sink.close();
        }
        self.sessions.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.iter().any(|s| s.id == id)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use sensor_core::{FrameDecoder, LinkState};

    use super::mock::RecordingSink;
    use super::*;

    const PORT: &str = "/dev/ttyUSB0";

    fn frame_message(first: u16) -> ViewerMessage {
        let line = format!("{first} 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15");
        ViewerMessage::from(FrameDecoder::default().decode(&line).expect("valid line"))
    }

    fn connected() -> StatusSnapshot {
        StatusSnapshot {
            state: LinkState::Connected,
            port_name: PORT.to_string(),
        }
    }

    #[test]
    fn test_register_sends_snapshot_first() {
        // Arrange
        let mut registry = ClientRegistry::new();
        let sink = RecordingSink::new();

        // Act
        registry
            .register(Uuid::new_v4(), Box::new(sink.clone()), &connected())
            .expect("register");

        // Assert
        assert_eq!(
            sink.messages(),
            vec![r#"{"type":"serial_status","status":"connected","portName":"/dev/ttyUSB0"}"#]
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_failure_does_not_keep_viewer() {
        let mut registry = ClientRegistry::new();
        let sink = RecordingSink::new();
        sink.fail_sends(ViewerSendError::Closed);

        let result = registry.register(Uuid::new_v4(), Box::new(sink), &connected());

        assert_eq!(result, Err(ViewerSendError::Closed));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_register_replaces_session() {
        let mut registry = ClientRegistry::new();
        let id = Uuid::new_v4();
        let old = RecordingSink::new();
        let new = RecordingSink::new();
        registry
            .register(id, Box::new(old.clone()), &connected())
            .expect("register");

        registry
            .register(id, Box::new(new.clone()), &connected())
            .expect("register again");
        registry.broadcast(&frame_message(7));

        assert_eq!(registry.len(), 1);
        assert_eq!(old.messages().len(), 1);
        assert_eq!(new.messages().len(), 2);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut registry = ClientRegistry::new();
        let id = Uuid::new_v4();
        registry
            .register(id, Box::new(RecordingSink::new()), &connected())
            .expect("register");

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert!(!registry.unregister(Uuid::new_v4()));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_broadcast_reaches_viewers_in_registration_order() {
        // Arrange: all sinks share one log so cross-viewer order is visible
        let log = RecordingSink::new();
        let mut registry = ClientRegistry::new();
        let ids: Vec<_> = (0..3).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            registry
                .register(*id, Box::new(log.clone()), &connected())
                .expect("register");
        }

        // Act
        let report = registry.broadcast(&frame_message(42));

        // Assert
        assert_eq!(report.delivered, 3);
        assert_eq!(log.messages().len(), 6);
        assert!(log.messages()[3..].iter().all(|m| m.starts_with("[42,")));
    }

    #[test]
    fn test_failed_send_drops_only_that_viewer() {
        // Arrange
        let mut registry = ClientRegistry::new();
        let healthy = RecordingSink::new();
        let broken = RecordingSink::new();
        let broken_id = Uuid::new_v4();
        registry
            .register(broken_id, Box::new(broken.clone()), &connected())
            .expect("register");
        registry
            .register(Uuid::new_v4(), Box::new(healthy.clone()), &connected())
            .expect("register");
        broken.fail_sends(ViewerSendError::Backlogged);

        // Act
        let report = registry.broadcast(&frame_message(1));

        // Assert
        assert_eq!(report, BroadcastReport { delivered: 1, skipped: 0, dropped: 1 });
        assert!(!registry.contains(broken_id));
        assert!(broken.is_closed());
        assert_eq!(healthy.messages().len(), 2);
    }

    #[test]
    fn test_unwritable_viewer_is_skipped_not_removed() {
        let mut registry = ClientRegistry::new();
        let sink = RecordingSink::new();
        let id = Uuid::new_v4();
        registry
            .register(id, Box::new(sink.clone()), &connected())
            .expect("register");
        sink.set_writable(false);

        let report = registry.broadcast(&frame_message(1));

        assert_eq!(report.skipped, 1);
        assert!(registry.contains(id));
        assert_eq!(sink.messages().len(), 1);
    }

    #[test]
    fn test_broadcast_with_no_viewers_is_noop() {
        let mut registry = ClientRegistry::new();
        assert_eq!(registry.broadcast(&frame_message(1)), BroadcastReport::default());
    }

    #[test]
    fn test_close_all_closes_every_sink() {
        let mut registry = ClientRegistry::new();
        let a = RecordingSink::new();
        let b = RecordingSink::new();
        registry
            .register(Uuid::new_v4(), Box::new(a.clone()), &connected())
            .expect("register");
        registry
            .register(Uuid::new_v4(), Box::new(b.clone()), &connected())
            .expect("register");

        let closed = registry.close_all();

        assert_eq!(closed, 2);
        assert!(a.is_closed() && b.is_closed());
        assert!(registry.is_empty());
    }
}
