//! Domain types: link connectivity and the status snapshot shown to viewers.
//!
//! Nothing in here performs I/O; the bridge's link manager decides *when* the
//! state changes, these types only describe *what* it is.

pub mod link;

pub use link::{LinkState, StatusSnapshot};
