//! Tokio implementation of [`ReconnectScheduler`].
//!
//! Each scheduled timer is a task that sleeps and then sends
//! `ReconnectTimerFired { token }` to the control loop.  Cancelling aborts the
//! task.  A firing that races with a cancel is harmless: the link manager
//! ignores tokens that no longer match the armed timer.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::application::events::{BridgeEvent, LinkEvent};
use crate::application::link_manager::ReconnectScheduler;

pub struct TokioReconnectTimer {
    events: mpsc::Sender<BridgeEvent>,
    pending: Option<JoinHandle<()>>,
}

impl TokioReconnectTimer {
    pub fn new(events: mpsc::Sender<BridgeEvent>) -> Self {
        Self {
            events,
            pending: None,
        }
    }
}

impl ReconnectScheduler for TokioReconnectTimer {
    fn schedule(&mut self, delay: Duration, token: u64) {
        self.cancel();
        let events = self.events.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!("reconnect timer {token} fired");
            let _ = events
                .send(BridgeEvent::Link(LinkEvent::ReconnectTimerFired { token }))
                .await;
        }));
    }

    fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

impl Drop for TokioReconnectTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
