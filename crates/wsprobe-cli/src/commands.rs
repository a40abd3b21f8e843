//! CLI command definitions using clap

use crate::output::OutputFormat;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use wsprobe::config::{DEFAULT_CONNECTION_TIMEOUT_MS, DEFAULT_RESPONSE_TIMEOUT_MS};
use wsprobe::SamplerConfig;

/// wsprobe: WebSocket sampler for load tests
#[derive(Parser, Debug)]
#[command(name = "wsprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a YAML test plan
    Run(RunArgs),

    /// Run a single ad-hoc sample against a WebSocket URL
    Sample(SampleArgs),

    /// Parse and validate a YAML test plan without connecting
    Validate(ValidateArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Plan file
    pub plan: PathBuf,

    /// Override the plan's virtual user count
    #[arg(short, long)]
    pub users: Option<usize>,

    /// Override the plan's iteration count
    #[arg(short = 'n', long)]
    pub iterations: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Include every sample result in the report
    #[arg(long)]
    pub results: bool,
}

/// Arguments for the sample command
#[derive(Parser, Debug)]
pub struct SampleArgs {
    /// Target URL (ws:// or wss://)
    pub url: String,

    /// Payload sent after the connection opens
    #[arg(long)]
    pub connect_payload: Option<String>,

    /// Payload sent after the connect acknowledgement
    #[arg(long)]
    pub subscribe_payload: Option<String>,

    /// Regular expression marking the connect acknowledgement
    #[arg(long)]
    pub connect_pattern: Option<String>,

    /// Regular expression marking subscribed responses
    #[arg(long)]
    pub subscribe_pattern: Option<String>,

    /// Regular expression that closes the connection
    #[arg(long)]
    pub disconnect_pattern: Option<String>,

    /// Subscribed responses to wait for
    #[arg(long, default_value = "1")]
    pub responses: usize,

    /// Connection timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_CONNECTION_TIMEOUT_MS)]
    pub connection_timeout: u64,

    /// Response timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_RESPONSE_TIMEOUT_MS)]
    pub response_timeout: u64,

    /// Connection identifier reported with the result
    #[arg(long)]
    pub connection_id: Option<String>,

    /// Send payloads as-is instead of STOMP frames
    #[arg(long)]
    pub no_stomp: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl SampleArgs {
    /// Sampler settings for this invocation
    #[must_use]
    pub fn to_config(&self) -> SamplerConfig {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        SamplerConfig {
            name: "sample".to_string(),
            connection_id: text(&self.connection_id),
            stomp_framing: !self.no_stomp,
            connect_payload: text(&self.connect_payload),
            subscribe_payload: text(&self.subscribe_payload),
            connect_pattern: text(&self.connect_pattern),
            subscribe_pattern: text(&self.subscribe_pattern),
            close_connection_pattern: text(&self.disconnect_pattern),
            responses_count: self.responses.to_string(),
            connection_timeout: self.connection_timeout.to_string(),
            response_timeout: self.response_timeout.to_string(),
            ..SamplerConfig::for_url(&self.url)
        }
    }
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Plan file
    pub plan: PathBuf,
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Detect from the terminal
    #[default]
    Auto,
    /// Always color
    Always,
    /// Never color
    Never,
}
