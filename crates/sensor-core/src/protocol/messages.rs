//! JSON message types for the browser-facing WebSocket protocol.
//!
//! The bridge only talks in one direction.  Two shapes travel to the browser:
//!
//! ```json
//! {"type":"serial_status","status":"connected","portName":"/dev/ttyUSB0"}
//! [512,498,1023,0,77,12,9,640,333,101,0,0,1023,256,700,301]
//! ```
//!
//! There is no envelope around frames, so the browser distinguishes the two
//! by shape: an array is a frame, an object with a `type` field is a status
//! update.  [`ViewerMessage`] is `#[serde(untagged)]` for the same reason.

use serde::{Deserialize, Serialize};

use crate::domain::link::{LinkState, StatusSnapshot};
use crate::protocol::frame::SensorFrame;

/// Link status as the browser understands it.
///
/// The wire only knows two values; a link that is still opening is reported
/// as `disconnected` because no frames can flow yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireStatus {
    Connected,
    Disconnected,
}

impl From<LinkState> for WireStatus {
    fn from(state: LinkState) -> Self {
        match state {
            LinkState::Connected => WireStatus::Connected,
            LinkState::Connecting | LinkState::Disconnected => WireStatus::Disconnected,
        }
    }
}

/// Status update object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
// `tag = "type"` writes the variant name into a `"type"` field, which is the
// discriminant the browser checks for.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusMessage {
    SerialStatus {
        status: WireStatus,
        #[serde(rename = "portName")]
        port_name: String,
    },
}

impl From<&StatusSnapshot> for StatusMessage {
    fn from(snapshot: &StatusSnapshot) -> Self {
        StatusMessage::SerialStatus {
            status: snapshot.state.into(),
            port_name: snapshot.port_name.clone(),
        }
    }
}

/// Everything the bridge sends to a viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ViewerMessage {
    Status(StatusMessage),
    Frame(SensorFrame),
}

impl ViewerMessage {
    /// Serialises the message into the text of one WebSocket frame.
    ///
    /// # Errors
    ///
    /// Propagates `serde_json` errors; none are expected for these types.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Short name for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            ViewerMessage::Status(_) => "serial_status",
            ViewerMessage::Frame(_) => "frame",
        }
    }
}

impl From<StatusMessage> for ViewerMessage {
    fn from(msg: StatusMessage) -> Self {
        ViewerMessage::Status(msg)
    }
}

impl From<SensorFrame> for ViewerMessage {
    fn from(frame: SensorFrame) -> Self {
        ViewerMessage::Frame(frame)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
