//! WebSocket transport over `tokio-tungstenite`.
//!
//! Each client runs one connection task: handshake, then a single reader
//! loop delivering events in arrival order. Outbound frames go through an
//! unbounded channel to a separate writer task so sends never block the
//! caller.

use crate::result::{ProbeError, ProbeResult};
use crate::transport::{
    Transport, TransportEvents, TransportHandle, ABNORMAL_CLOSURE, NO_STATUS,
};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::tungstenite::Message;

/// Largest inbound text message accepted (256 MiB)
pub const MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

#[derive(Debug, Default)]
struct ClientState {
    connection: Option<JoinHandle<()>>,
    stopped: bool,
}

/// Client instance backed by `tokio-tungstenite`
#[derive(Debug, Default)]
pub struct TungsteniteTransport {
    state: Mutex<ClientState>,
}

impl TungsteniteTransport {
    /// Create an idle client
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for TungsteniteTransport {
    fn connect(&self, uri: &str, events: Arc<dyn TransportEvents>) -> ProbeResult<()> {
        let request = uri
            .into_client_request()
            .map_err(|e| ProbeError::invalid_uri(uri, e.to_string()))?;

        let mut state = self.state();
        if state.stopped {
            return Err(ProbeError::invalid_state("client already stopped"));
        }
        if state.connection.is_some() {
            return Err(ProbeError::invalid_state("client already connected"));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ProbeError::invalid_state(e.to_string()))?;
        state.connection = Some(runtime.spawn(run_connection(request, events)));
        Ok(())
    }

    fn stop(&self) -> ProbeResult<()> {
        let mut state = self.state();
        if state.stopped {
            return Err(ProbeError::invalid_state("client already stopped"));
        }
        state.stopped = true;
        match state.connection.take() {
            Some(task) => {
                task.abort();
                Ok(())
            }
            None => Err(ProbeError::invalid_state("client was never started")),
        }
    }
}

#[derive(Debug)]
struct TungsteniteHandle {
    outbound: mpsc::UnboundedSender<Message>,
    open: AtomicBool,
}

impl TransportHandle for TungsteniteHandle {
    fn send_text(&self, text: &str) -> ProbeResult<()> {
        if !self.is_open() {
            return Err(ProbeError::transport("connection is closed"));
        }
        self.outbound
            .send(Message::Text(text.to_owned().into()))
            .map_err(|_| ProbeError::transport("writer task has stopped"))
    }

    fn close(&self, code: u16, reason: &str) {
        if self.open.swap(false, Ordering::SeqCst) {
            let frame = CloseFrame {
                code: CloseCode::from(code),
                reason: reason.to_owned().into(),
            };
            let _ = self.outbound.send(Message::Close(Some(frame)));
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

async fn run_connection(request: Request, events: Arc<dyn TransportEvents>) {
    let config = WebSocketConfig::default().max_message_size(Some(MAX_MESSAGE_SIZE));
    let stream = match tokio_tungstenite::connect_async_with_config(request, Some(config), false)
        .await
    {
        Ok((stream, _response)) => stream,
        Err(e) => {
            tracing::debug!(error = %e, "websocket handshake failed");
            events.on_close(ABNORMAL_CLOSURE, &e.to_string());
            return;
        }
    };

    let (mut sink, mut source) = stream.split();
    let (outbound, mut queue) = mpsc::unbounded_channel::<Message>();
    let writer = tokio::spawn(async move {
        while let Some(message) = queue.recv().await {
            let closing = matches!(message, Message::Close(_));
            if let Err(e) = sink.send(message).await {
                tracing::trace!(error = %e, "websocket write failed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    let link = Arc::new(TungsteniteHandle {
        outbound,
        open: AtomicBool::new(true),
    });
    events.on_open(Arc::clone(&link) as Arc<dyn TransportHandle>);

    let (code, reason) = loop {
        match source.next().await {
            Some(Ok(Message::Text(text))) => events.on_message(text.as_str()),
            Some(Ok(Message::Close(frame))) => {
                break frame.map_or_else(
                    || (NO_STATUS, String::new()),
                    |f| (u16::from(f.code), f.reason.to_string()),
                );
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => break (ABNORMAL_CLOSURE, e.to_string()),
            None => break (ABNORMAL_CLOSURE, "connection dropped".to_string()),
        }
    };

    link.open.store(false, Ordering::SeqCst);
    events.on_close(code, &reason);
    writer.abort();
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ignore;

    impl TransportEvents for Ignore {
        fn on_open(&self, _handle: Arc<dyn TransportHandle>) {}
        fn on_message(&self, _text: &str) {}
        fn on_close(&self, _code: u16, _reason: &str) {}
    }

    #[test]
    fn test_invalid_uri_rejected_up_front() {
        let transport = TungsteniteTransport::new();
        let err = transport.connect("not a uri", Arc::new(Ignore)).unwrap_err();
        assert!(matches!(err, ProbeError::InvalidUri { .. }));
    }

    #[test]
    fn test_connect_outside_runtime() {
        let transport = TungsteniteTransport::new();
        let err = transport
            .connect("ws://127.0.0.1:9/", Arc::new(Ignore))
            .unwrap_err();
        assert!(matches!(err, ProbeError::InvalidState { .. }));
    }

    #[test]
    fn test_stop_before_connect() {
        let transport = TungsteniteTransport::new();
        assert!(transport.stop().is_err());
        assert!(transport.stop().is_err());
    }

    #[tokio::test]
    async fn test_stop_after_connect_then_again() {
        let transport = TungsteniteTransport::new();
        transport
            .connect("ws://127.0.0.1:9/", Arc::new(Ignore))
            .unwrap();
        assert!(transport.stop().is_ok());
        assert!(transport.stop().is_err());
        let err = transport
            .connect("ws://127.0.0.1:9/", Arc::new(Ignore))
            .unwrap_err();
        assert!(matches!(err, ProbeError::InvalidState { .. }));
    }

    #[test]
    fn test_handle_close_only_once() {
        let (outbound, mut queue) = mpsc::unbounded_channel();
        let handle = TungsteniteHandle {
            outbound,
            open: AtomicBool::new(true),
        };
        handle.close(1000, "bye");
        handle.close(1000, "bye");
        assert!(!handle.is_open());
        assert!(matches!(queue.try_recv(), Ok(Message::Close(Some(_)))));
        assert!(queue.try_recv().is_err());
        assert!(handle.send_text("late").is_err());
    }
}
