//! wsprobe CLI library
//!
//! Command-line front end for [`wsprobe`]: run YAML test plans, fire a
//! single ad-hoc sample, or validate a plan without connecting.

#![warn(missing_docs)]

mod commands;
mod config;
mod error;
pub mod handlers;
mod output;

pub use commands::{Cli, ColorArg, Commands, RunArgs, SampleArgs, ValidateArgs};
pub use config::{init_tracing, CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{
    failing_labels, render_plan_summary, render_sample_text, OutputFormat, Reporter,
};
