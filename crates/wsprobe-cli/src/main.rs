//! wsprobe CLI: WebSocket sampler for load tests
//!
//! ## Usage
//!
//! ```bash
//! wsprobe validate plan.yaml              # Check a plan
//! wsprobe run plan.yaml --users 10        # Run a plan
//! wsprobe sample ws://localhost:8080/ws \
//!     --connect-payload CONNECT --connect-pattern CONNECTED
//! ```

use clap::Parser;
use std::process::ExitCode;
use wsprobe_cli::{handlers, init_tracing, Cli, CliConfig, CliResult, Commands, Reporter};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = CliConfig::from_cli(&cli);
    init_tracing(config.verbosity);
    let reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());

    match cli.command {
        Commands::Validate(args) => handlers::validate(&args, &reporter),
        Commands::Run(args) => runtime()?.block_on(handlers::run(&args, &reporter)),
        Commands::Sample(args) => runtime()?.block_on(handlers::sample(&args, &reporter)),
    }
}

fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}
