//! wsprobe: WebSocket sampler sessions for load testing
//!
//! A sample opens (or reuses) a WebSocket connection, sends an optional
//! connect payload and an optional subscribe payload, classifies inbound
//! messages against configurable regular expressions, and reports what it
//! saw together with a diagnostic trace of the session.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   sample()   ┌──────────────────┐  connect/send  ┌───────────┐
//! │ SessionRunner│─────────────►│ ConnectionSession│───────────────►│ Transport │
//! │              │◄─────────────│  gates, backlog, │◄───────────────│ (tungst.) │
//! └──────┬───────┘ SampleResult │  PatternSet, log │  on_open/msg/  └───────────┘
//!        │                      └──────────────────┘  on_close
//!        ▼
//! ┌──────────────────┐
//! │ConnectionRegistry│  streaming sessions, drained at run end
//! └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wsprobe::{ConnectionRegistry, SamplerConfig, SessionRunner};
//!
//! # async fn demo() {
//! let runner = SessionRunner::tungstenite(Arc::new(ConnectionRegistry::new()));
//! let mut config = SamplerConfig::for_url("ws://localhost:8080/stomp");
//! config.connect_payload = "CONNECT\\naccept-version:1.1,1.0".to_string();
//! config.connect_pattern = "CONNECTED".to_string();
//! let result = runner.sample(&config).await;
//! println!("{} {}", result.response_code, result.response_data);
//! runner.finish();
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

/// Inbound message backlog (last 25 messages)
pub mod backlog;
/// Sampler and test-plan configuration
pub mod config;
/// Counting completion gates
pub mod gate;
/// Connect / subscribe / disconnect classification
pub mod pattern;
/// Plan execution and reports
pub mod plan;
/// Streaming connection registry
pub mod registry;
mod result;
/// Sample orchestration
pub mod runner;
/// Per-connection session state
pub mod session;
/// Transport abstraction
pub mod transport;
/// `tokio-tungstenite` transport
pub mod tungstenite;

pub use backlog::{MessageRecord, ResponseBacklog, RESPONSE_BACKLOG_CAPACITY};
pub use config::{stomp_payload, QueryParameter, SamplerConfig, TestPlan};
pub use gate::Gate;
pub use pattern::{Classification, PatternSet};
pub use plan::{render_text, run_plan, LabelStats, PlanReport};
pub use registry::ConnectionRegistry;
pub use result::{ProbeError, ProbeResult};
pub use runner::{ClientFactory, SampleResult, SessionRunner};
pub use session::{
    ConnectionSession, GateStates, SessionOptions, SessionState, CLIENT_CLOSE_REASON,
};
pub use transport::{
    Transport, TransportEvents, TransportHandle, ABNORMAL_CLOSURE, NORMAL_CLOSURE, NO_STATUS,
};
pub use tungstenite::{TungsteniteTransport, MAX_MESSAGE_SIZE};
