//! WebSocket server: accept loop, viewer sessions and shutdown.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Spawning the bridge control loop.
//! 3. Accepting browser connections and upgrading each to a WebSocket session.
//! 4. Connecting every session to the control loop through a bounded outbound
//!    queue (the session's [`ViewerSink`]).
//! 5. Stopping when the `running` flag is cleared: the control loop runs its
//!    shutdown sequence, then sessions get a short grace period to send their
//!    close frames.
//!
//! # Sessions
//!
//! Each session task runs two futures under `tokio::select!`:
//!
//! - **writer** drains the outbound queue into the socket;
//! - **reader** consumes inbound frames, which the bridge ignores, until the
//!   browser closes the connection.
//!
//! When either side finishes the session reports `ViewerLeft`.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message as WsMessage};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::bridge_service::Bridge;
use crate::application::events::{event_channel, BridgeEvent};
use crate::application::registry::{SessionId, ViewerSendError, ViewerSink};
use crate::domain::config::BridgeConfig;
use crate::infrastructure::reconnect_timer::TokioReconnectTimer;
use crate::infrastructure::serial_link::SerialPortDriver;

/// Messages a session may have queued before it counts as backlogged.
pub const SESSION_QUEUE_DEPTH: usize = 64;

/// How often the accept loop re-checks the `running` flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// Grace period for sessions to finish after shutdown.
const SESSION_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds the listener, wires up the serial driver, and serves until
/// `running` is set to `false`.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (e.g., the port is
/// already in use or the process lacks permission to bind).
pub async fn run_server(config: BridgeConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.ws_bind_addr)
        .await
        .with_context(|| {
            format!(
                "failed to bind WebSocket listener on {}",
                config.ws_bind_addr
            )
        })?;

    info!("WebSocket server listening on {}", config.ws_bind_addr);
    info!(
        "serial port {} at {} baud, reconnect every {} ms",
        config.serial_path,
        config.baud_rate,
        config.reconnect_delay.as_millis()
    );

    let (events_tx, events_rx) = event_channel();
    let bridge = Bridge::new(
        &config,
        Box::new(SerialPortDriver::new(
            config.serial_path.clone(),
            config.baud_rate,
        )),
        Box::new(TokioReconnectTimer::new(events_tx.clone())),
        events_tx.clone(),
        events_rx,
    );

    serve(listener, bridge, events_tx, running).await
}

/// Runs `bridge` and the accept loop on an already bound `listener`.
///
/// `events` must feed the same channel `bridge` reads from.
///
/// # Errors
///
/// Currently always returns `Ok`; accept errors are logged and the loop
/// continues.
pub async fn serve(
    listener: TcpListener,
    bridge: Bridge,
    events: mpsc::Sender<BridgeEvent>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let control = tokio::spawn(bridge.run());
    let mut sessions = JoinSet::new();

    loop {
        // Polling stops here, but the listener stays bound until the control
        // loop has closed the viewers and the port.
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Reap finished sessions so the set does not grow without bound.
        while sessions.try_join_next().is_some() {}

        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("new viewer connection from {peer_addr}");
                sessions.spawn(handle_viewer_session(stream, peer_addr, events.clone()));
            }
            Ok(Err(e)) => {
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }

    if events.send(BridgeEvent::Shutdown).await.is_err() {
        warn!("bridge control loop had already stopped");
    }
    if let Err(e) = control.await {
        error!("bridge control loop failed: {e}");
    }
    drop(listener);
    debug!("WebSocket listener closed");

    let drained = timeout(SESSION_DRAIN_TIMEOUT, async {
        while sessions.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(
            "{} viewer session(s) did not close in time; aborting",
            sessions.len()
        );
        sessions.abort_all();
    }

    info!("bridge stopped");
    Ok(())
}

// ── Viewer sink ───────────────────────────────────────────────────────────────

/// What a session's writer is asked to do.
#[derive(Debug)]
enum Outbound {
    Text(String),
    Close,
}

/// [`ViewerSink`] backed by a session's bounded outbound queue.
struct ChannelSink {
    tx: mpsc::Sender<Outbound>,
}

impl ViewerSink for ChannelSink {
    fn is_writable(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send_text(&mut self, text: &str) -> Result<(), ViewerSendError> {
        self.tx
            .try_send(Outbound::Text(text.to_string()))
            .map_err(|e| match e {
                TrySendError::Full(_) => ViewerSendError::Backlogged,
                TrySendError::Closed(_) => ViewerSendError::Closed,
            })
    }

    fn close(&mut self) {
        // A full queue is fine: the writer also stops once this sender drops.
        let _ = self.tx.try_send(Outbound::Close);
    }
}

// ── Per-session handler ───────────────────────────────────────────────────────

async fn handle_viewer_session(
    stream: TcpStream,
    peer_addr: SocketAddr,
    events: mpsc::Sender<BridgeEvent>,
) {
    match run_session(stream, peer_addr, events).await {
        Ok(()) => debug!("viewer session {peer_addr} closed"),
        Err(e) => warn!("viewer session {peer_addr} closed with error: {e:#}"),
    }
}

async fn run_session(
    stream: TcpStream,
    peer_addr: SocketAddr,
    events: mpsc::Sender<BridgeEvent>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    let id: SessionId = Uuid::new_v4();
    let (out_tx, mut out_rx) = mpsc::channel(SESSION_QUEUE_DEPTH);
    events
        .send(BridgeEvent::ViewerJoined {
            id,
            peer: peer_addr,
            sink: Box::new(ChannelSink { tx: out_tx }),
        })
        .await
        .map_err(|_| anyhow::anyhow!("bridge control loop is not running"))?;

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let writer = async {
        while let Some(outbound) = out_rx.recv().await {
            match outbound {
                Outbound::Text(text) => {
                    if let Err(e) = ws_tx.send(WsMessage::Text(text)).await {
                        debug!("viewer {id}: send failed: {e}");
                        return;
                    }
                }
                Outbound::Close => break,
            }
        }
        if let Err(e) = ws_tx.close().await {
            debug!("viewer {id}: close failed: {e}");
        }
    };

    let reader = async {
        while let Some(frame) = ws_rx.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => {
                    debug!("viewer {id}: ignoring inbound text ({} bytes)", text.len());
                }
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!("viewer {id}: read error: {e}");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = writer => debug!("viewer {id}: writer finished"),
        _ = reader => debug!("viewer {id}: browser closed the connection"),
    }

    // The control loop is gone during shutdown; nothing left to unregister.
    let _ = events.send(BridgeEvent::ViewerLeft { id }).await;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
