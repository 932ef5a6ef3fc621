//! Serial framing, frame decoding and the viewer wire protocol.

pub mod frame;
pub mod line;
pub mod messages;
