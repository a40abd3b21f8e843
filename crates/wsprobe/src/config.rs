//! Sampler and test-plan configuration.
//!
//! Numeric fields are kept as text, the way a user typed them, and parsed on
//! use. Unparseable values fall back to the documented defaults with a
//! warning instead of failing the sample.

use crate::result::{ProbeError, ProbeResult};
use crate::session::SessionOptions;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default connection timeout (20 seconds)
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 20_000;

/// Default response timeout (20 seconds)
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 20_000;

/// Default number of subscribe matches
pub const DEFAULT_RESPONSE_COUNT: usize = 1;

const DEFAULT_PROTOCOL: &str = "ws";
const DEFAULT_WS_PORT: u16 = 80;
const DEFAULT_WSS_PORT: u16 = 443;

const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// One query string parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParameter {
    /// Parameter name; blank names are skipped
    pub name: String,
    /// Parameter value
    #[serde(default, deserialize_with = "loose_string")]
    pub value: String,
}

/// Settings for one WebSocket sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Sample label
    pub name: String,
    /// Host name or address
    pub server_address: String,
    /// Port; empty or 0 means the protocol default
    #[serde(deserialize_with = "loose_string")]
    pub server_port: String,
    /// `ws` or `wss`
    pub protocol: String,
    /// Path, or a full `ws://`/`wss://` URL
    pub context_path: String,
    /// Query string parameters
    pub query_parameters: Vec<QueryParameter>,
    /// Connection identifier; derived from the URI when empty
    pub connection_id: String,
    /// Keep the connection open and share it across samples
    pub streaming_connection: bool,
    /// Wrap payloads in a SockJS STOMP frame
    pub stomp_framing: bool,
    /// Payload sent first, followed by a wait for the connect pattern
    pub connect_payload: String,
    /// Payload sent second, followed by a wait for the subscribe pattern
    pub subscribe_payload: String,
    /// Regular expression for the connect acknowledgement
    pub connect_pattern: String,
    /// Regular expression for subscribed responses
    pub subscribe_pattern: String,
    /// Regular expression that closes the connection
    pub close_connection_pattern: String,
    /// Subscribe matches to wait for
    #[serde(deserialize_with = "loose_string")]
    pub responses_count: String,
    /// Connection timeout in milliseconds
    #[serde(deserialize_with = "loose_string")]
    pub connection_timeout: String,
    /// Response timeout in milliseconds
    #[serde(deserialize_with = "loose_string")]
    pub response_timeout: String,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            name: "WebSocket sampler".to_string(),
            server_address: String::new(),
            server_port: String::new(),
            protocol: DEFAULT_PROTOCOL.to_string(),
            context_path: String::new(),
            query_parameters: Vec::new(),
            connection_id: String::new(),
            streaming_connection: false,
            stomp_framing: true,
            connect_payload: String::new(),
            subscribe_payload: String::new(),
            connect_pattern: String::new(),
            subscribe_pattern: String::new(),
            close_connection_pattern: String::new(),
            responses_count: DEFAULT_RESPONSE_COUNT.to_string(),
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT_MS.to_string(),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT_MS.to_string(),
        }
    }
}

impl SamplerConfig {
    /// Config targeting a full `ws://` or `wss://` URL
    #[must_use]
    pub fn for_url(url: &str) -> Self {
        Self {
            context_path: url.to_string(),
            ..Self::default()
        }
    }

    /// Lowercased protocol, `ws` when unset
    #[must_use]
    pub fn protocol(&self) -> String {
        let protocol = self.protocol.trim();
        if protocol.is_empty() {
            DEFAULT_PROTOCOL.to_string()
        } else {
            protocol.to_ascii_lowercase()
        }
    }

    /// Port to connect to, resolving 0/empty to the protocol default
    #[must_use]
    pub fn effective_port(&self) -> u16 {
        let port = self.server_port.trim().parse::<u16>().unwrap_or(0);
        if port != 0 {
            return port;
        }
        match self.protocol().as_str() {
            "wss" => DEFAULT_WSS_PORT,
            "ws" => DEFAULT_WS_PORT,
            _ => 0,
        }
    }

    /// Whether the effective port is the protocol default
    #[must_use]
    pub fn is_default_port(&self) -> bool {
        let port = self.effective_port();
        match self.protocol().as_str() {
            "ws" => port == DEFAULT_WS_PORT,
            "wss" => port == DEFAULT_WSS_PORT,
            _ => false,
        }
    }

    /// Percent-encoded query string, without the leading `?`
    #[must_use]
    pub fn query_string(&self) -> String {
        self.query_parameters
            .iter()
            .filter(|p| !p.name.trim().is_empty())
            .map(|p| {
                format!(
                    "{}={}",
                    utf8_percent_encode(&p.name, QUERY_VALUE),
                    utf8_percent_encode(&p.value, QUERY_VALUE)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Target URI
    pub fn uri(&self) -> ProbeResult<String> {
        let path = self.context_path.trim();
        if path.starts_with("ws://") || path.starts_with("wss://") {
            return Ok(path.to_string());
        }

        let host = self.server_address.trim();
        let protocol = self.protocol();
        if host.is_empty() {
            return Err(ProbeError::invalid_uri(
                format!("{protocol}://"),
                "server address is empty",
            ));
        }

        let mut uri = format!("{protocol}://{host}");
        if !self.is_default_port() {
            uri.push_str(&format!(":{}", self.effective_port()));
        }
        if !path.starts_with('/') {
            uri.push('/');
        }
        uri.push_str(path);
        let query = self.query_string();
        if !query.is_empty() {
            uri.push('?');
            uri.push_str(&query);
        }
        Ok(uri)
    }

    /// Connection id, falling back to the target URI
    pub fn resolved_connection_id(&self) -> ProbeResult<String> {
        let id = self.connection_id.trim();
        if id.is_empty() {
            self.uri()
        } else {
            Ok(id.to_string())
        }
    }

    /// Connection timeout, default 20s when unparseable
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        parse_millis(
            &self.connection_timeout,
            DEFAULT_CONNECTION_TIMEOUT_MS,
            "connection timeout",
        )
    }

    /// Response timeout, default 20s when unparseable
    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        parse_millis(
            &self.response_timeout,
            DEFAULT_RESPONSE_TIMEOUT_MS,
            "response timeout",
        )
    }

    /// Subscribe matches to wait for, default 1 when unparseable
    #[must_use]
    pub fn response_count(&self) -> usize {
        self.responses_count.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(
                value = %self.responses_count,
                default = DEFAULT_RESPONSE_COUNT,
                "response count is not a number; using the default"
            );
            DEFAULT_RESPONSE_COUNT
        })
    }

    /// Connect payload as it goes on the wire
    #[must_use]
    pub fn connect_message(&self) -> String {
        self.frame(&self.connect_payload)
    }

    /// Subscribe payload as it goes on the wire
    #[must_use]
    pub fn subscribe_message(&self) -> String {
        self.frame(&self.subscribe_payload)
    }

    fn frame(&self, payload: &str) -> String {
        if self.stomp_framing {
            stomp_payload(payload)
        } else {
            payload.to_string()
        }
    }

    /// Options handed to the session on (re)initialization
    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            connect_pattern: self.connect_pattern.clone(),
            subscribe_pattern: self.subscribe_pattern.clone(),
            disconnect_pattern: self.close_connection_pattern.clone(),
            response_count: self.response_count(),
            streaming: self.streaming_connection,
        }
    }
}

/// Wrap a payload as a SockJS STOMP frame: `["<payload>\n\n\u0000"]`.
///
/// Blank payloads become empty; already-framed payloads pass through.
#[must_use]
pub fn stomp_payload(payload: &str) -> String {
    if payload.trim().is_empty() {
        return String::new();
    }
    if payload.ends_with("\\u0000\"]") {
        return payload.to_string();
    }
    format!("[\"{payload}\\n\\n\\u0000\"]")
}

fn parse_millis(value: &str, default_ms: u64, what: &str) -> Duration {
    let ms = value.trim().parse::<u64>().unwrap_or_else(|_| {
        tracing::warn!(
            value,
            default_ms,
            "{what} is not a number; using the default"
        );
        default_ms
    });
    Duration::from_millis(ms)
}

/// Accept strings, numbers and booleans for text-typed fields
fn loose_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Text(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(match Loose::deserialize(deserializer)? {
        Loose::Text(s) => s,
        Loose::Int(n) => n.to_string(),
        Loose::Float(f) => f.to_string(),
        Loose::Bool(b) => b.to_string(),
    })
}

/// A load-test plan: virtual users repeatedly running an ordered sample list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestPlan {
    /// Plan name
    #[serde(default = "default_plan_name")]
    pub name: String,
    /// Concurrent virtual users
    #[serde(default = "default_one")]
    pub users: usize,
    /// Passes over the sample list per user
    #[serde(default = "default_one")]
    pub iterations: usize,
    /// Samples, in execution order
    #[serde(default)]
    pub samples: Vec<SamplerConfig>,
}

fn default_plan_name() -> String {
    "WebSocket plan".to_string()
}

const fn default_one() -> usize {
    1
}

impl TestPlan {
    /// Parse a plan from YAML
    pub fn from_yaml_str(yaml: &str) -> ProbeResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load a plan from a YAML file
    pub fn from_path(path: impl AsRef<Path>) -> ProbeResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Reject plans that cannot run
    pub fn validate(&self) -> ProbeResult<()> {
        if self.samples.is_empty() {
            return Err(ProbeError::invalid_config("plan has no samples"));
        }
        if self.users == 0 {
            return Err(ProbeError::invalid_config("users must be at least 1"));
        }
        if self.iterations == 0 {
            return Err(ProbeError::invalid_config("iterations must be at least 1"));
        }
        for (index, sample) in self.samples.iter().enumerate() {
            sample.uri().map_err(|e| {
                ProbeError::invalid_config(format!("sample #{} ({}): {e}", index + 1, sample.name))
            })?;
        }
        Ok(())
    }

    /// Total samples the plan will execute
    #[must_use]
    pub fn total_samples(&self) -> usize {
        self.users * self.iterations * self.samples.len()
    }
}
