//! Recording viewer sink for unit testing.
//!
//! Lets tests register viewers without a WebSocket, then inspect exactly which
//! text frames each one was given.  Clones share state, so a test keeps one
//! handle and moves another into the registry.

use std::sync::{Arc, Mutex};

use super::{ViewerSendError, ViewerSink};

#[derive(Debug, Default)]
struct SinkState {
    messages: Vec<String>,
    unwritable: bool,
    fail_with: Option<ViewerSendError>,
    closed: bool,
}

/// A [`ViewerSink`] that records every message it is given.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    state: Arc<Mutex<SinkState>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every text frame accepted so far, in order.
    pub fn messages(&self) -> Vec<String> {
        self.state.lock().expect("lock poisoned").messages.clone()
    }

    /// Makes every later `send_text` fail with `error`.
    pub fn fail_sends(&self, error: ViewerSendError) {
        self.state.lock().expect("lock poisoned").fail_with = Some(error);
    }

    pub fn set_writable(&self, writable: bool) {
        self.state.lock().expect("lock poisoned").unwritable = !writable;
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().expect("lock poisoned").closed
    }
}

impl ViewerSink for RecordingSink {
    fn is_writable(&self) -> bool {
        let state = self.state.lock().expect("lock poisoned");
        !state.unwritable && !state.closed
    }

    fn send_text(&mut self, text: &str) -> Result<(), ViewerSendError> {
        let mut state = self.state.lock().expect("lock poisoned");
        if let Some(error) = state.fail_with {
            return Err(error);
        }
        state.messages.push(text.to_string());
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().expect("lock poisoned").closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_recorded_messages() {
        // Arrange
        let sink = RecordingSink::new();
        let mut moved = sink.clone();

        // Act
        moved.send_text("hello").expect("send");

        // Assert
        assert_eq!(sink.messages(), vec!["hello"]);
    }

    #[test]
    fn test_closed_sink_is_not_writable() {
        let sink = RecordingSink::new();
        let mut moved = sink.clone();

        moved.close();

        assert!(sink.is_closed());
        assert!(!sink.is_writable());
    }

    #[test]
    fn test_fail_sends_rejects_without_recording() {
        let mut sink = RecordingSink::new();
        sink.fail_sends(ViewerSendError::Backlogged);

        assert_eq!(sink.send_text("x"), Err(ViewerSendError::Backlogged));
        assert!(sink.messages().is_empty());
    }
}
