//! Sample orchestration.
//!
//! [`SessionRunner`] executes one sample: obtain a session (new, or a reused
//! streaming one), send the payloads, wait on the gates and assemble a
//! [`SampleResult`]. Failures never escape a sample; they are folded into
//! the result's problem list.

use crate::config::SamplerConfig;
use crate::registry::ConnectionRegistry;
use crate::result::{ProbeError, ProbeResult};
use crate::session::{ConnectionSession, CLIENT_CLOSE_REASON};
use crate::transport::{Transport, NORMAL_CLOSURE};
use crate::tungstenite::TungsteniteTransport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Builds a fresh client per new connection
pub type ClientFactory = Arc<dyn Fn() -> Arc<dyn Transport> + Send + Sync>;

/// Outcome of one sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleResult {
    /// Sample label
    pub label: String,
    /// Payloads sent, connect then subscribe
    pub sampler_data: String,
    /// `200`, the abnormal close code, or `500`
    pub response_code: String,
    /// Concatenated response backlog
    pub response_data: String,
    /// Connection information, diagnostic trace and problems
    pub response_message: String,
    /// Whether the sample succeeded
    pub successful: bool,
    /// Whether the connection was open when the sample ended
    pub connected: bool,
    /// Abnormal close code, 0 when none
    pub error_code: u16,
    /// Messages received during the sample
    pub message_count: u64,
    /// Wall time of the sample
    pub elapsed_ms: u64,
}

impl SampleResult {
    fn new(label: &str, sampler_data: String) -> Self {
        Self {
            label: label.to_string(),
            sampler_data,
            response_code: String::new(),
            response_data: String::new(),
            response_message: String::new(),
            successful: false,
            connected: false,
            error_code: 0,
            message_count: 0,
            elapsed_ms: 0,
        }
    }

    /// Pretty-printed JSON form of the result
    pub fn to_json(&self) -> ProbeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs samples against a shared streaming registry
pub struct SessionRunner {
    registry: Arc<ConnectionRegistry>,
    client_factory: ClientFactory,
}

impl fmt::Debug for SessionRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRunner")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl SessionRunner {
    /// Create a runner with a custom client factory
    pub fn new<F>(registry: Arc<ConnectionRegistry>, client_factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Transport> + Send + Sync + 'static,
    {
        Self {
            registry,
            client_factory: Arc::new(client_factory),
        }
    }

    /// Create a runner whose clients use `tokio-tungstenite`
    #[must_use]
    pub fn tungstenite(registry: Arc<ConnectionRegistry>) -> Self {
        Self::new(registry, || {
            Arc::new(TungsteniteTransport::new()) as Arc<dyn Transport>
        })
    }

    /// Registry of streaming sessions
    #[must_use]
    pub const fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Execute one sample
    pub async fn sample(&self, config: &SamplerConfig) -> SampleResult {
        let start = Instant::now();
        let connect_message = config.connect_message();
        let subscribe_message = config.subscribe_message();
        let mut result =
            SampleResult::new(&config.name, format!("{connect_message}\n{subscribe_message}"));
        let mut info = String::from("\n\n[CONNECTION INFORMATION]");
        let mut problems = String::from("\n\n[Problems]\n");

        let mut failures = Vec::new();
        let session = match self.obtain_session(config, &mut info, &mut failures).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(sample = %config.name, error = %e, "no session for sample");
                problems.push_str(&fold_problem(&e));
                result.response_code = "500".to_string();
                result.response_message = format!("{info}{problems}");
                result.elapsed_ms = elapsed_ms(start);
                return result;
            }
        };

        if failures.is_empty() {
            if let Err(e) = exchange(&session, config, &connect_message, &subscribe_message).await
            {
                tracing::warn!(sample = %config.name, error = %e, "sample exchange failed");
                failures.push(e);
            }
        }
        for failure in &failures {
            problems.push_str(&fold_problem(failure));
        }

        result.error_code = session.error_code();
        result.response_data = session.response_text();
        result.message_count = session.message_count();
        result.connected = session.is_connected();
        if result.error_code != 0 {
            result.response_code = result.error_code.to_string();
        } else if failures.is_empty() {
            result.response_code = "200".to_string();
            result.successful = true;
        } else {
            result.response_code = "500".to_string();
        }

        if !session.is_streaming() || !result.successful || session.is_closed() {
            self.retire(&session);
        }

        result.response_message = format!("{info}{}{problems}", session.log_message());
        result.elapsed_ms = elapsed_ms(start);
        result
    }

    async fn obtain_session(
        &self,
        config: &SamplerConfig,
        info: &mut String,
        failures: &mut Vec<ProbeError>,
    ) -> ProbeResult<Arc<ConnectionSession>> {
        let uri = config.uri()?;
        let id = config.resolved_connection_id()?;
        info.push_str(&format!("\nURI {uri}\nconnection id {id}"));
        let options = config.session_options();

        if options.streaming {
            let live = self.registry.get(&id).filter(|existing| !existing.is_closed());
            if live.is_some() {
                if let Some(session) = self.registry.acquire(&id, &options) {
                    return Ok(session);
                }
            }
        }

        let session = ConnectionSession::new(id.clone(), &options, (self.client_factory)());
        if options.streaming {
            if let Some(live) = self
                .registry
                .register_if_vacant(&id, Arc::clone(&session), &options)
            {
                session.close(NORMAL_CLOSURE, CLIENT_CLOSE_REASON);
                let _ = live.await_open(config.connection_timeout()).await;
                return Ok(live);
            }
        }
        if let Err(e) = session.connect(&uri) {
            self.retire(&session);
            return Err(e);
        }

        let timeout = config.connection_timeout();
        let _ = session.await_open(timeout).await;
        if !session.is_connected() && !session.is_closed() {
            failures.push(ProbeError::connection_failed(format!(
                "no connection to {uri} within {} ms",
                timeout.as_millis()
            )));
        }
        Ok(session)
    }

    /// Unregister `session` if it is the registered one, then close it
    fn retire(&self, session: &Arc<ConnectionSession>) {
        if let Some(registered) = self.registry.get(session.id()) {
            if Arc::ptr_eq(&registered, session) {
                tracing::debug!(connection_id = %session.id(), "removing streaming connection");
                let _ = self.registry.remove(session.id());
            }
        }
        session.close(NORMAL_CLOSURE, CLIENT_CLOSE_REASON);
    }

    /// End of run: close every streaming session; returns how many
    pub fn finish(&self) -> usize {
        self.registry.drain_all()
    }
}

async fn exchange(
    session: &ConnectionSession,
    config: &SamplerConfig,
    connect_message: &str,
    subscribe_message: &str,
) -> ProbeResult<()> {
    let timeout = config.response_timeout();
    if !connect_message.trim().is_empty() {
        session.send(connect_message)?;
        let _ = session.await_connected(timeout).await;
    }
    if !subscribe_message.trim().is_empty() {
        session.send(subscribe_message)?;
    }
    if session.has_subscribe_pattern() {
        let _ = session.await_subscribed(timeout).await;
    }
    Ok(())
}

fn fold_problem(error: &ProbeError) -> String {
    format!(" - {}: {error}\n", error.category())
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
