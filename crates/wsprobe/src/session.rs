//! Connection Session
//!
//! Owns one logical WebSocket connection for a sampler: open, classify
//! inbound messages, gate the sample flow, close.
//!
//! ## Synchronization
//!
//! Transport events arrive on the transport's task while the sample flow
//! sends and waits on its own task. Everything mutable (diagnostic log,
//! backlog, counters, handle) sits behind one mutex per session; the four
//! gates are lock-free signals:
//!
//! ```text
//! opened ──► connected ──► subscribed (counting) ──► closed
//! ```
//!
//! Whenever `closed` fires, the three others have already fired, so no
//! waiter outlives a terminal close. No lock is held while calling into the
//! transport.

use crate::backlog::ResponseBacklog;
use crate::gate::Gate;
use crate::pattern::{Classification, PatternSet};
use crate::result::ProbeResult;
use crate::transport::{Transport, TransportEvents, TransportHandle, NORMAL_CLOSURE};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Reason sent with client-initiated close frames
pub const CLIENT_CLOSE_REASON: &str = "wsprobe closed session.";

/// Owner-resolved settings applied on every (re)initialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Pattern releasing the connected gate (empty = any message)
    pub connect_pattern: String,
    /// Pattern counting down the subscribed gate (empty = any message)
    pub subscribe_pattern: String,
    /// Pattern closing the session (empty = never)
    pub disconnect_pattern: String,
    /// Subscribe matches required to release the subscribed gate
    pub response_count: usize,
    /// Keep the connection open across samples
    pub streaming: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            connect_pattern: String::new(),
            subscribe_pattern: String::new(),
            disconnect_pattern: String::new(),
            response_count: 1,
            streaming: false,
        }
    }
}

/// Observable session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Transport has not reported an open connection yet
    NotYetOpen,
    /// Connection is open
    Open,
    /// Closed by the server with a non-normal status code
    Error,
    /// Closed normally, locally or remotely
    Closed,
}

/// Snapshot of the four gates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateStates {
    /// Open gate released
    pub opened: bool,
    /// Connected gate released
    pub connected: bool,
    /// Subscribed gate released
    pub subscribed: bool,
    /// Closed gate released
    pub closed: bool,
}

impl GateStates {
    /// Whether every gate is released
    #[must_use]
    pub const fn all_released(&self) -> bool {
        self.opened && self.connected && self.subscribed && self.closed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    New,
    Open,
    Closed,
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    connected: bool,
    streaming: bool,
    transport: Arc<dyn Transport>,
    handle: Option<Arc<dyn TransportHandle>>,
    client_stopped: bool,
    patterns: PatternSet,
    backlog: ResponseBacklog,
    message_counter: u64,
    error_code: u16,
    log: String,
    subscribed: Arc<Gate>,
}

impl Inner {
    fn note(&mut self, line: &str) {
        self.log.push_str(line);
        self.log.push('\n');
    }
}

/// One logical WebSocket connection
#[derive(Debug)]
pub struct ConnectionSession {
    id: String,
    inner: Mutex<Inner>,
    opened: Gate,
    connected: Gate,
    closed: Gate,
}

impl ConnectionSession {
    /// Create a session bound to `transport` and initialize it
    pub fn new(
        id: impl Into<String>,
        options: &SessionOptions,
        transport: Arc<dyn Transport>,
    ) -> Arc<Self> {
        let session = Arc::new(Self {
            id: id.into(),
            inner: Mutex::new(Inner {
                phase: Phase::New,
                connected: false,
                streaming: options.streaming,
                transport,
                handle: None,
                client_stopped: false,
                patterns: PatternSet::default(),
                backlog: ResponseBacklog::new(),
                message_counter: 1,
                error_code: 0,
                log: String::new(),
                subscribed: Arc::new(Gate::new(options.response_count)),
            }),
            opened: Gate::one_shot(),
            connected: Gate::one_shot(),
            closed: Gate::one_shot(),
        });
        session.initialize(options, None, false);
        let line = format!(" Session id : {}", session.id);
        session.lock().note(&line);
        session
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind owner options, optionally swapping the client.
    ///
    /// Reuse resets the diagnostic log, message counter and error code.
    /// The subscribed gate is re-armed with the configured response count;
    /// the open, connected and closed gates live as long as the connection.
    pub fn initialize(
        &self,
        options: &SessionOptions,
        transport: Option<Arc<dyn Transport>>,
        is_reuse: bool,
    ) {
        let patterns = PatternSet::compile(
            &options.connect_pattern,
            &options.subscribe_pattern,
            &options.disconnect_pattern,
        );

        let mut inner = self.lock();
        if let Some(transport) = transport {
            inner.transport = transport;
            inner.client_stopped = false;
        }
        inner.streaming = options.streaming;
        inner.backlog.clear();

        let subscribed = Gate::new(options.response_count);
        if inner.phase == Phase::Closed {
            subscribed.release_all();
        }
        inner.subscribed = Arc::new(subscribed);

        if is_reuse {
            inner.log.clear();
            inner.note("\n\n[Execution Flow]");
            inner.note(" - Reusing existing connection");
            inner.message_counter = 1;
            inner.error_code = 0;
        } else {
            inner.note("\n\n[Execution Flow]");
            inner.note(" - Opening new connection");
        }
        for line in patterns.diagnostics() {
            inner.note(line);
        }
        inner.patterns = patterns;
    }

    /// Start connecting this session's client to `uri`
    pub fn connect(self: &Arc<Self>, uri: &str) -> ProbeResult<()> {
        let transport = Arc::clone(&self.lock().transport);
        tracing::debug!(session = %self.id, uri, "connecting");
        let events: Arc<dyn TransportEvents> = Arc::<Self>::clone(self);
        transport.connect(uri, events)
    }

    /// Wait for the transport to open (or fail) the connection
    pub async fn await_open(&self, timeout: Duration) -> bool {
        let line = format!(
            " - Waiting for the server connection for {} ms",
            timeout.as_millis()
        );
        self.lock().note(&line);
        let signaled = self.opened.wait(timeout).await;

        let mut inner = self.lock();
        if inner.connected {
            inner.note(" - Connection established");
        } else {
            inner.note(" - Cannot connect to the remote server");
        }
        signaled
    }

    /// Wait for a message matching the connect pattern
    pub async fn await_connected(&self, timeout: Duration) -> bool {
        self.await_gate(&self.connected, timeout).await
    }

    /// Wait for the configured number of subscribe matches
    pub async fn await_subscribed(&self, timeout: Duration) -> bool {
        let gate = Arc::clone(&self.lock().subscribed);
        self.await_gate(&gate, timeout).await
    }

    /// Wait for the connection to close
    pub async fn await_closed(&self, timeout: Duration) -> bool {
        self.await_gate(&self.closed, timeout).await
    }

    async fn await_gate(&self, gate: &Gate, timeout: Duration) -> bool {
        let line = format!(" - Waiting for messages for {} ms", timeout.as_millis());
        self.lock().note(&line);
        let signaled = gate.wait(timeout).await;

        if self.is_streaming() {
            self.lock().note(" - Leaving streaming connection open");
        } else {
            self.close(NORMAL_CLOSURE, CLIENT_CLOSE_REASON);
        }
        signaled
    }

    /// Send a text frame; without a live connection this only logs
    pub fn send(&self, text: &str) -> ProbeResult<()> {
        tracing::debug!(session = %self.id, bytes = text.len(), "send message");
        let handle = {
            let mut inner = self.lock();
            let line = format!(" - Sending message ({} bytes): {text}", text.len());
            inner.note(&line);
            inner.handle.clone()
        };
        match handle {
            Some(handle) if handle.is_open() => handle.send_text(text),
            _ => {
                tracing::warn!(session = %self.id, "cannot send, connection is not available");
                self.lock()
                    .note(" - Can't send message, session is not available");
                Ok(())
            }
        }
    }

    /// Close the connection and stop the client; repeated calls do nothing.
    ///
    /// The session is marked closed and every gate released before the
    /// transport is touched, so a concurrent or re-entrant second call
    /// already observes the terminal state.
    pub fn close(&self, code: u16, reason: &str) {
        let (handle, transport, stop) = {
            let mut inner = self.lock();
            let stop = !inner.client_stopped;
            inner.client_stopped = true;
            inner.phase = Phase::Closed;
            inner.connected = false;
            (inner.handle.take(), Arc::clone(&inner.transport), stop)
        };
        self.release_all();
        if handle.is_none() && !stop {
            return;
        }
        tracing::debug!(session = %self.id, code, reason, "closing session");

        let mut notes = Vec::with_capacity(2);
        match handle {
            Some(handle) => {
                handle.close(code, reason);
                notes.push(" - WebSocket session closed by the client".to_string());
            }
            None => notes.push(" - WebSocket session wasn't started".to_string()),
        }
        if stop {
            match transport.stop() {
                Ok(()) => notes.push(" - WebSocket client closed by the client".to_string()),
                Err(e) => {
                    tracing::debug!(session = %self.id, error = %e, "client stop failed");
                    notes.push(format!(" - WebSocket client wasn't started: {e}"));
                }
            }
        }

        let mut inner = self.lock();
        for line in &notes {
            inner.note(line);
        }
    }

    fn release_all(&self) {
        let subscribed = Arc::clone(&self.lock().subscribed);
        self.opened.release_all();
        self.connected.release_all();
        subscribed.release_all();
        self.closed.release_all();
    }

    /// Concatenated backlog
    #[must_use]
    pub fn response_text(&self) -> String {
        self.lock().backlog.render()
    }

    /// Abnormal close code, 0 when none
    #[must_use]
    pub fn error_code(&self) -> u16 {
        self.lock().error_code
    }

    /// Diagnostic trace followed by the variables section
    #[must_use]
    pub fn log_message(&self) -> String {
        let inner = self.lock();
        format!(
            "{}\n\n[Variables]\n - Message count: {}\n",
            inner.log,
            inner.message_counter - 1
        )
    }

    /// Messages received since the last (re)initialization
    #[must_use]
    pub fn message_count(&self) -> u64 {
        self.lock().message_counter - 1
    }

    /// Whether the connection is open
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Whether the session reached its terminal state
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().phase == Phase::Closed
    }

    /// Whether the session is kept open across samples
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.lock().streaming
    }

    /// Whether a usable subscribe pattern is set
    #[must_use]
    pub fn has_subscribe_pattern(&self) -> bool {
        self.lock().patterns.has_subscribe()
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        let inner = self.lock();
        match inner.phase {
            Phase::New => SessionState::NotYetOpen,
            Phase::Open => SessionState::Open,
            Phase::Closed if inner.error_code != 0 => SessionState::Error,
            Phase::Closed => SessionState::Closed,
        }
    }

    /// Snapshot of the gates
    #[must_use]
    pub fn gates(&self) -> GateStates {
        GateStates {
            opened: self.opened.is_released(),
            connected: self.connected.is_released(),
            subscribed: self.lock().subscribed.is_released(),
            closed: self.closed.is_released(),
        }
    }

    /// Connection identifier
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl TransportEvents for ConnectionSession {
    fn on_open(&self, handle: Arc<dyn TransportHandle>) {
        let mut inner = self.lock();
        match inner.phase {
            Phase::New => {}
            Phase::Open => {
                tracing::debug!(session = %self.id, "duplicate open ignored");
                return;
            }
            Phase::Closed => {
                drop(inner);
                tracing::debug!(session = %self.id, "opened after close, closing again");
                handle.close(NORMAL_CLOSURE, CLIENT_CLOSE_REASON);
                return;
            }
        }
        tracing::debug!(session = %self.id, "connection opened");
        inner.note(" - WebSocket connection has been opened");
        inner.phase = Phase::Open;
        inner.connected = true;
        inner.handle = Some(handle);
        drop(inner);
        self.opened.release();
    }

    fn on_message(&self, text: &str) {
        tracing::trace!(session = %self.id, bytes = text.len(), "received message");
        let classification = {
            let mut inner = self.lock();
            let sequence = inner.message_counter;
            inner.message_counter += 1;
            inner.backlog.push(sequence, text);

            let classification = inner.patterns.classify(text);
            let line = format!(
                " - Received message #{sequence} ({} bytes): {text}; {}",
                text.len(),
                classification.describe()
            );
            inner.note(&line);

            match classification {
                Classification::Connected => self.connected.release(),
                Classification::Subscribed => inner.subscribed.release(),
                Classification::Disconnect | Classification::Unmatched => {}
            }
            classification
        };

        if classification == Classification::Disconnect {
            self.release_all();
            self.close(NORMAL_CLOSURE, CLIENT_CLOSE_REASON);
        }
    }

    fn on_close(&self, code: u16, reason: &str) {
        {
            let mut inner = self.lock();
            if code == NORMAL_CLOSURE {
                tracing::debug!(session = %self.id, code, reason, "closed by server");
                inner.note(" - WebSocket connection has been successfully closed by the server");
            } else {
                tracing::error!(session = %self.id, code, reason, "connection closed unexpectedly");
                let line = format!(
                    " - WebSocket connection closed unexpectedly by the server: [{code}] {reason}"
                );
                inner.note(&line);
                inner.error_code = code;
            }
            inner.connected = false;
            inner.phase = Phase::Closed;
            inner.handle = None;
        }
        self.release_all();
    }
}
