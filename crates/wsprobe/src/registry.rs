//! Streaming connection registry.
//!
//! Created at test-run start, shared by every virtual user, drained at
//! run end. Only streaming sessions are registered.

use crate::session::{ConnectionSession, SessionOptions, CLIENT_CLOSE_REASON};
use crate::transport::NORMAL_CLOSURE;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Map from connection id to a live streaming session
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: Mutex<HashMap<String, Arc<ConnectionSession>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Arc<ConnectionSession>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registered session for `id`, re-initialized for reuse
    pub fn acquire(&self, id: &str, options: &SessionOptions) -> Option<Arc<ConnectionSession>> {
        let session = self.sessions().get(id).cloned()?;
        tracing::debug!(connection_id = id, "reusing streaming connection");
        session.initialize(options, None, true);
        Some(session)
    }

    /// Registered session for `id` without touching it
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<ConnectionSession>> {
        self.sessions().get(id).cloned()
    }

    /// Register a session, returning the one it replaced
    pub fn register(
        &self,
        id: impl Into<String>,
        session: Arc<ConnectionSession>,
    ) -> Option<Arc<ConnectionSession>> {
        self.sessions().insert(id.into(), session)
    }

    /// Register `session` under `id` unless a live session already holds it.
    ///
    /// Check and insert happen under one lock. When a live session exists it
    /// is returned re-initialized for reuse and `session` is left untouched
    /// for the caller to discard. A closed session holding `id` is replaced
    /// and closed.
    pub fn register_if_vacant(
        &self,
        id: &str,
        session: Arc<ConnectionSession>,
        options: &SessionOptions,
    ) -> Option<Arc<ConnectionSession>> {
        let (live, replaced) = match self.sessions().entry(id.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_closed() {
                    (None, Some(entry.insert(session)))
                } else {
                    (Some(Arc::clone(entry.get())), None)
                }
            }
            Entry::Vacant(entry) => {
                let _ = entry.insert(session);
                (None, None)
            }
        };
        if let Some(stale) = replaced {
            tracing::debug!(connection_id = id, "replacing closed streaming connection");
            stale.close(NORMAL_CLOSURE, CLIENT_CLOSE_REASON);
        }
        if let Some(live) = &live {
            tracing::debug!(connection_id = id, "streaming connection already registered");
            live.initialize(options, None, true);
        }
        live
    }

    /// Forget a session without closing it
    pub fn remove(&self, id: &str) -> Option<Arc<ConnectionSession>> {
        self.sessions().remove(id)
    }

    /// Close and remove every session; returns how many were drained
    pub fn drain_all(&self) -> usize {
        let drained: Vec<_> = self.sessions().drain().collect();
        for (id, session) in &drained {
            tracing::debug!(connection_id = %id, "closing streaming connection");
            session.close(NORMAL_CLOSURE, CLIENT_CLOSE_REASON);
        }
        drained.len()
    }

    /// Whether `id` is registered
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.sessions().contains_key(id)
    }

    /// Number of registered sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    /// Whether nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use crate::transport::{TransportEvents, ABNORMAL_CLOSURE};

    fn streaming() -> SessionOptions {
        SessionOptions {
            connect_pattern: "CONNECTED".to_string(),
            subscribe_pattern: "MESSAGE".to_string(),
            streaming: true,
            ..SessionOptions::default()
        }
    }

    fn session(transport: &Arc<MockTransport>) -> Arc<ConnectionSession> {
        let session = ConnectionSession::new("stream-1", &streaming(), transport.clone());
        session.connect("ws://localhost/").unwrap();
        session
    }

    #[test]
    fn test_acquire_unknown_is_none() {
        let registry = ConnectionRegistry::new();
        assert!(registry.acquire("missing", &streaming()).is_none());
    }

    #[test]
    fn test_acquire_returns_same_instance_reset() {
        let registry = ConnectionRegistry::new();
        let transport = Arc::new(MockTransport::new());
        let first = session(&transport);
        assert!(registry.register("stream-1", first.clone()).is_none());

        first.on_message("CONNECTED");
        first.on_message("MESSAGE");
        first.on_close(ABNORMAL_CLOSURE, "blip");
        assert_eq!(first.message_count(), 2);
        assert_eq!(first.error_code(), ABNORMAL_CLOSURE);

        let second = registry.acquire("stream-1", &streaming()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.message_count(), 0);
        assert_eq!(second.error_code(), 0);

        second.on_message("MESSAGE");
        assert!(second.response_text().starts_with("[Message 1]\n"));
    }

    #[test]
    fn test_drain_closes_everything() {
        let registry = ConnectionRegistry::new();
        let t1 = Arc::new(MockTransport::new());
        let t2 = Arc::new(MockTransport::new().silent().failing_stop());
        let s1 = session(&t1);
        let s2 = ConnectionSession::new("never-opened", &streaming(), t2.clone());
        let _ = registry.register("a", s1.clone());
        let _ = registry.register("b", s2.clone());

        assert_eq!(registry.drain_all(), 2);
        assert!(registry.is_empty());
        assert!(s1.is_closed());
        assert!(s2.is_closed());
        assert_eq!(t1.stop_count(), 1);
        assert_eq!(t2.stop_count(), 1);
        assert_eq!(registry.drain_all(), 0);
    }

    #[test]
    fn test_register_if_vacant_keeps_live_session() {
        let registry = ConnectionRegistry::new();
        let transport = Arc::new(MockTransport::new());
        let first = session(&transport);
        assert!(registry
            .register_if_vacant("stream-1", first.clone(), &streaming())
            .is_none());

        let latecomer = ConnectionSession::new("stream-1", &streaming(), transport.clone());
        let live = registry
            .register_if_vacant("stream-1", latecomer.clone(), &streaming())
            .unwrap();
        assert!(Arc::ptr_eq(&live, &first));
        assert!(live.log_message().contains(" - Reusing existing connection"));
        assert!(Arc::ptr_eq(&registry.get("stream-1").unwrap(), &first));
        assert!(!latecomer.is_closed());
    }

    #[test]
    fn test_register_if_vacant_replaces_and_closes_dead_session() {
        let registry = ConnectionRegistry::new();
        let stale_transport = Arc::new(MockTransport::new());
        let stale = session(&stale_transport);
        let _ = registry.register("stream-1", stale.clone());
        stale.on_close(ABNORMAL_CLOSURE, "gone");

        let fresh = ConnectionSession::new("stream-1", &streaming(), Arc::new(MockTransport::new()));
        assert!(registry
            .register_if_vacant("stream-1", fresh.clone(), &streaming())
            .is_none());
        assert!(Arc::ptr_eq(&registry.get("stream-1").unwrap(), &fresh));
        assert_eq!(stale_transport.stop_count(), 1);
    }

    #[test]
    fn test_remove_does_not_close() {
        let registry = ConnectionRegistry::new();
        let transport = Arc::new(MockTransport::new());
        let s = session(&transport);
        let _ = registry.register("a", s.clone());
        assert!(registry.contains("a"));
        let removed = registry.remove("a").unwrap();
        assert!(Arc::ptr_eq(&removed, &s));
        assert!(!s.is_closed());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_concurrent_register_and_acquire() {
        let registry = Arc::new(ConnectionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let transport = Arc::new(MockTransport::new().silent());
                    let id = format!("conn-{}", n % 4);
                    if registry.acquire(&id, &streaming()).is_none() {
                        let s = ConnectionSession::new(id.clone(), &streaming(), transport);
                        let _ = registry.register(id, s);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.drain_all(), 4);
    }
}
