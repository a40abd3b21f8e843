//! Transport seam between sessions and the WebSocket library.
//!
//! A [`Transport`] is a client instance: it establishes one connection and
//! reports its lifecycle through [`TransportEvents`]. The live connection is
//! a [`TransportHandle`] handed to the session on open.

use crate::result::ProbeResult;
use std::fmt;
use std::sync::Arc;

/// Normal closure status code
pub const NORMAL_CLOSURE: u16 = 1000;

/// Reported when a close frame carried no status code
pub const NO_STATUS: u16 = 1005;

/// Reported when the connection dropped without a close frame
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Lifecycle callbacks from a transport.
///
/// Events for one connection are delivered in order by a single producer.
pub trait TransportEvents: Send + Sync {
    /// Connection established
    fn on_open(&self, handle: Arc<dyn TransportHandle>);
    /// Text frame received
    fn on_message(&self, text: &str);
    /// Connection terminated, locally or remotely
    fn on_close(&self, code: u16, reason: &str);
}

/// A live connection
pub trait TransportHandle: Send + Sync + fmt::Debug {
    /// Queue a text frame
    fn send_text(&self, text: &str) -> ProbeResult<()>;
    /// Start a close handshake
    fn close(&self, code: u16, reason: &str);
    /// Whether frames can still be sent
    fn is_open(&self) -> bool;
}

/// A client instance owning one connection
pub trait Transport: Send + Sync + fmt::Debug {
    /// Start connecting to `uri`.
    ///
    /// URI problems are reported immediately; everything after that is
    /// reported through `events`, which eventually receives `on_open` or
    /// `on_close`.
    fn connect(&self, uri: &str, events: Arc<dyn TransportEvents>) -> ProbeResult<()>;

    /// Release the client and its connection tasks
    fn stop(&self) -> ProbeResult<()>;
}
