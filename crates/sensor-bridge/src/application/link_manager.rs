//! SerialLinkManager: lifecycle of the physical serial link.
//!
//! The manager is an explicit state machine.  It never touches a serial port
//! or a clock itself; it calls a [`LinkDriver`] to open and close the port and
//! a [`ReconnectScheduler`] to arm and cancel the reconnect timer.  Everything
//! else arrives as a [`LinkEvent`], so each transition can be driven from a
//! test by injecting synthetic events.
//!
//! # Phases
//!
//! ```text
//!            connect()                 Opened
//!   Closed ────────────► Opening ───────────────► Open
//!     ▲                     │                       │
//!     │  open error /       │                       │ Closed (EOF or I/O error)
//!     │  Closed             ▼                       │
//!     └──────────────── arm reconnect timer ◄───────┘
//!
//!   any phase ── shutdown() ──► Closing (terminal)
//! ```
//!
//! # Reconnect timer
//!
//! At most one timer is armed.  Arming while one is armed is a no-op, the
//! timer is cancelled when the port opens and when a connect attempt starts
//! from anywhere other than the timer itself, and a firing whose token does
//! not match the armed timer is ignored.
//!
//! # Stale events
//!
//! Each open attempt gets a fresh attempt id.  The driver tags every event it
//! sends with that id, and the manager drops events from earlier attempts, so
//! a reader task that outlives its port cannot flip the state of a newer one.

use std::time::Duration;

use sensor_core::{FrameDecoder, LinkState, SensorFrame};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::application::events::{BridgeEvent, LinkEvent};
use crate::domain::config::BridgeConfig;

/// Errors reported by a [`LinkDriver`].
#[derive(Debug, Error)]
pub enum LinkError {
    /// The port could not be opened (device absent, busy, no permission).
    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: std::io::Error,
    },

    /// The port could not be closed cleanly.
    #[error("failed to close serial port {port}: {source}")]
    Close {
        port: String,
        #[source]
        source: std::io::Error,
    },
}

/// Internal phase of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    /// No handle.
    Closed,
    /// Handle created, waiting for the open confirmation.
    Opening,
    /// Reading lines.
    Open,
    /// Shutdown requested; terminal.
    Closing,
}

impl LinkPhase {
    /// The connectivity state viewers are told about.
    pub fn link_state(self) -> LinkState {
        match self {
            LinkPhase::Closed | LinkPhase::Closing => LinkState::Disconnected,
            LinkPhase::Opening => LinkState::Connecting,
            LinkPhase::Open => LinkState::Connected,
        }
    }
}

/// What a transition produced for the rest of the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutput {
    StateChanged(LinkState),
    Frame(SensorFrame),
}

/// Handle a [`LinkDriver`] uses to report events for one open attempt.
#[derive(Debug, Clone)]
pub struct LinkEventSink {
    attempt: u64,
    tx: mpsc::Sender<BridgeEvent>,
}

impl LinkEventSink {
    pub fn new(attempt: u64, tx: mpsc::Sender<BridgeEvent>) -> Self {
        Self { attempt, tx }
    }

    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Reports that the port is open.  Returns `false` once the control loop
    /// has gone away, which tells the reader task to stop.
    pub async fn opened(&self) -> bool {
        self.send(LinkEvent::Opened {
            attempt: self.attempt,
        })
        .await
    }

    pub async fn line(&self, line: String) -> bool {
        self.send(LinkEvent::Line {
            attempt: self.attempt,
            line,
        })
        .await
    }

    pub async fn closed(&self, error: Option<String>) -> bool {
        self.send(LinkEvent::Closed {
            attempt: self.attempt,
            error,
        })
        .await
    }

    async fn send(&self, event: LinkEvent) -> bool {
        self.tx.send(BridgeEvent::Link(event)).await.is_ok()
    }
}

/// Opens and closes the physical port.
///
/// `open` must either fail synchronously or arrange for `Opened`, then any
/// number of `Line`s, then exactly one `Closed` to be sent through `sink`.
#[cfg_attr(test, mockall::automock)]
pub trait LinkDriver: Send {
    /// Starts opening the port.
    fn open(&mut self, sink: LinkEventSink) -> Result<(), LinkError>;
    /// Closes the port if it is open.
    fn close(&mut self) -> Result<(), LinkError>;
}

/// Arms and cancels the single reconnect timer.
///
/// When a scheduled timer elapses the implementation sends
/// `LinkEvent::ReconnectTimerFired { token }` to the control loop.
pub trait ReconnectScheduler: Send {
    fn schedule(&mut self, delay: Duration, token: u64);
    fn cancel(&mut self);
}

/// Owner of the link phase, the open attempt counter and the reconnect timer.
pub struct SerialLinkManager {
    port_name: String,
    reconnect_delay: Duration,
    decoder: FrameDecoder,
    driver: Box<dyn LinkDriver>,
    scheduler: Box<dyn ReconnectScheduler>,
    events: mpsc::Sender<BridgeEvent>,
    phase: LinkPhase,
    attempt: u64,
    armed_timer: Option<u64>,
    last_timer_token: u64,
    holds_handle: bool,
}

impl SerialLinkManager {
    pub fn new(
        config: &BridgeConfig,
        driver: Box<dyn LinkDriver>,
        scheduler: Box<dyn ReconnectScheduler>,
        events: mpsc::Sender<BridgeEvent>,
    ) -> Self {
        Self {
            port_name: config.serial_path.clone(),
            reconnect_delay: config.reconnect_delay,
            decoder: config.decoder(),
            driver,
            scheduler,
            events,
            phase: LinkPhase::Closed,
            attempt: 0,
            armed_timer: None,
            last_timer_token: 0,
            holds_handle: false,
        }
    }

    pub fn phase(&self) -> LinkPhase {
        self.phase
    }

    pub fn state(&self) -> LinkState {
        self.phase.link_state()
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Whether a reconnect timer is currently armed.
    pub fn reconnect_armed(&self) -> bool {
        self.armed_timer.is_some()
    }

    /// Id of the most recent open attempt (0 before the first one).
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Explicit connect attempt (startup).  No-op unless the link is closed.
    pub fn connect(&mut self) -> Vec<LinkOutput> {
        let mut out = Vec::new();
        self.attempt_connect(false, &mut out);
        out
    }

    /// Applies one link event.
    pub fn handle(&mut self, event: LinkEvent) -> Vec<LinkOutput> {
        let mut out = Vec::new();
        if self.phase == LinkPhase::Closing {
            debug!("ignoring link event during shutdown: {event:?}");
            return out;
        }
        match event {
            LinkEvent::Opened { attempt } => self.on_opened(attempt, &mut out),
            LinkEvent::Line { attempt, line } => self.on_line(attempt, &line, &mut out),
            LinkEvent::Closed { attempt, error } => self.on_closed(attempt, error, &mut out),
            LinkEvent::ReconnectTimerFired { token } => self.on_timer_fired(token, &mut out),
        }
        out
    }

    /// Enters the terminal `Closing` phase and cancels the reconnect timer.
    ///
    /// The port itself stays open until [`close_handle`](Self::close_handle)
    /// so the caller can close viewers first.
    pub fn shutdown(&mut self) {
        if self.phase == LinkPhase::Closing {
            return;
        }
        self.cancel_reconnect();
        self.holds_handle = matches!(self.phase, LinkPhase::Opening | LinkPhase::Open);
        self.phase = LinkPhase::Closing;
    }

    /// Closes the port if one was open when shutdown began.  Errors are
    /// logged, never returned: shutdown must not stall on a wedged device.
    pub fn close_handle(&mut self) {
        if !self.holds_handle {
            return;
        }
        self.holds_handle = false;
        match self.driver.close() {
            Ok(()) => info!("serial port {} closed during shutdown", self.port_name),
            Err(e) => error!("error closing serial port during shutdown: {e}"),
        }
    }

    // ── Transitions ───────────────────────────────────────────────────────────

    fn attempt_connect(&mut self, from_timer: bool, out: &mut Vec<LinkOutput>) {
        match self.phase {
            LinkPhase::Closing => {
                debug!("ignoring connect attempt during shutdown");
                return;
            }
            LinkPhase::Opening | LinkPhase::Open => {
                debug!("serial port {} is already open", self.port_name);
                return;
            }
            LinkPhase::Closed => {}
        }

        if !from_timer {
            self.cancel_reconnect();
        }

        self.attempt += 1;
        info!(
            "attempting to open serial port {} (attempt {})",
            self.port_name, self.attempt
        );
        self.set_phase(LinkPhase::Opening, out);

        let sink = LinkEventSink::new(self.attempt, self.events.clone());
        if let Err(e) = self.driver.open(sink) {
            warn!("{e}");
            self.enter_closed(out);
        }
    }

    fn on_opened(&mut self, attempt: u64, out: &mut Vec<LinkOutput>) {
        if self.is_stale(attempt) || self.phase != LinkPhase::Opening {
            debug!("ignoring open confirmation for attempt {attempt}");
            return;
        }
        info!("serial port {} opened", self.port_name);
        self.cancel_reconnect();
        self.set_phase(LinkPhase::Open, out);
    }

    fn on_line(&mut self, attempt: u64, line: &str, out: &mut Vec<LinkOutput>) {
        if self.is_stale(attempt) || self.phase != LinkPhase::Open {
            return;
        }
        trace!("serial line: {line}");
        match self.decoder.decode(line) {
            Ok(frame) => out.push(LinkOutput::Frame(frame)),
            Err(e) => warn!("malformed frame on {}: {e} (line {line:?})", self.port_name),
        }
    }

    fn on_closed(&mut self, attempt: u64, error: Option<String>, out: &mut Vec<LinkOutput>) {
        if self.is_stale(attempt) || !matches!(self.phase, LinkPhase::Opening | LinkPhase::Open)
        {
            debug!("ignoring close for attempt {attempt}");
            return;
        }
        match error {
            Some(e) => warn!("serial port {} closed due to error: {e}", self.port_name),
            None => info!("serial port {} closed", self.port_name),
        }
        self.enter_closed(out);
    }

    fn on_timer_fired(&mut self, token: u64, out: &mut Vec<LinkOutput>) {
        if self.armed_timer != Some(token) {
            debug!("ignoring stale reconnect timer {token}");
            return;
        }
        self.armed_timer = None;
        self.attempt_connect(true, out);
    }

    fn enter_closed(&mut self, out: &mut Vec<LinkOutput>) {
        self.set_phase(LinkPhase::Closed, out);
        self.arm_reconnect();
    }

    // ── Timer ─────────────────────────────────────────────────────────────────

    fn arm_reconnect(&mut self) {
        if self.armed_timer.is_some() {
            debug!("reconnect already scheduled");
            return;
        }
        self.last_timer_token += 1;
        self.armed_timer = Some(self.last_timer_token);
        info!(
            "will attempt to reconnect to {} in {:.1}s",
            self.port_name,
            self.reconnect_delay.as_secs_f64()
        );
        self.scheduler
            .schedule(self.reconnect_delay, self.last_timer_token);
    }

    fn cancel_reconnect(&mut self) {
        if self.armed_timer.take().is_some() {
            self.scheduler.cancel();
        }
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn is_stale(&self, attempt: u64) -> bool {
        attempt != self.attempt
    }

    fn set_phase(&mut self, phase: LinkPhase, out: &mut Vec<LinkOutput>) {
        let before = self.state();
        self.phase = phase;
        let after = self.state();
        if before != after {
            out.push(LinkOutput::StateChanged(after));
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
