//! The bridge control loop.
//!
//! [`Bridge`] owns the link manager, the status tracker and the viewer
//! registry, and is the only code that mutates any of them.  I/O tasks feed it
//! [`BridgeEvent`]s through one channel; it handles them one at a time:
//!
//! ```text
//! serial reader ─┐
//! reconnect timer ├──► mpsc ──► Bridge::dispatch ──► ClientRegistry::broadcast
//! viewer sessions ┘                                   (per-viewer queues)
//! ```
//!
//! Because a status change and the frames around it come out of the same
//! loop, every viewer sees them in the order the serial link produced them.

use std::ops::ControlFlow;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::application::events::BridgeEvent;
use crate::application::link_manager::{
    LinkDriver, LinkOutput, ReconnectScheduler, SerialLinkManager,
};
use crate::application::registry::ClientRegistry;
use crate::application::status_tracker::StatusTracker;
use crate::domain::config::BridgeConfig;

pub struct Bridge {
    link: SerialLinkManager,
    status: StatusTracker,
    registry: ClientRegistry,
    events: mpsc::Receiver<BridgeEvent>,
}

impl Bridge {
    /// Builds a bridge around `driver` and `scheduler`.
    ///
    /// `events_tx` must be the sender half of `events_rx`; the link manager
    /// hands clones of it to the driver for each open attempt.
    pub fn new(
        config: &BridgeConfig,
        driver: Box<dyn LinkDriver>,
        scheduler: Box<dyn ReconnectScheduler>,
        events_tx: mpsc::Sender<BridgeEvent>,
        events_rx: mpsc::Receiver<BridgeEvent>,
    ) -> Self {
        Self {
            link: SerialLinkManager::new(config, driver, scheduler, events_tx),
            status: StatusTracker::new(config.serial_path.clone()),
            registry: ClientRegistry::new(),
            events: events_rx,
        }
    }

    /// Makes the initial connect attempt.
    pub fn start(&mut self) {
        let outputs = self.link.connect();
        self.apply(outputs);
    }

    /// Starts the link and processes events until `Shutdown` arrives or every
    /// sender is dropped.
    pub async fn run(mut self) {
        self.start();
        while let Some(event) = self.events.recv().await {
            if self.dispatch(event).is_break() {
                return;
            }
        }
        warn!("event channel closed without a shutdown request");
        self.shutdown();
    }

    /// Handles one event.  Returns `Break` after shutdown.
    pub fn dispatch(&mut self, event: BridgeEvent) -> ControlFlow<()> {
        match event {
            BridgeEvent::Link(link_event) => {
                let outputs = self.link.handle(link_event);
                self.apply(outputs);
            }
            BridgeEvent::ViewerJoined { id, peer, sink } => {
                match self.registry.register(id, sink, self.status.snapshot()) {
                    Ok(()) => info!("viewer {id} connected from {peer}"),
                    Err(e) => warn!("could not send status to new viewer {id} ({peer}): {e}"),
                }
            }
            BridgeEvent::ViewerLeft { id } => {
                if self.registry.unregister(id) {
                    info!("viewer {id} disconnected");
                }
            }
            BridgeEvent::Shutdown => {
                self.shutdown();
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Cancels the reconnect timer, closes every viewer, then closes the port.
    fn shutdown(&mut self) {
        info!("shutting down bridge");
        self.link.shutdown();
        let closed = self.registry.close_all();
        debug!("closed {closed} viewer connection(s)");
        self.link.close_handle();
    }

    fn apply(&mut self, outputs: Vec<LinkOutput>) {
        for output in outputs {
            match output {
                LinkOutput::StateChanged(state) => {
                    if let Some(message) = self.status.apply(state) {
                        let report = self.registry.broadcast(&message);
                        debug!("status {state} sent to {} viewer(s)", report.delivered);
                    }
                }
                LinkOutput::Frame(frame) => {
                    self.registry.broadcast(&frame.into());
                }
            }
        }
    }

    pub fn link(&self) -> &SerialLinkManager {
        &self.link
    }

    pub fn status(&self) -> &StatusTracker {
        &self.status
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
