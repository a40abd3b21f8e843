//! Subcommand handlers

use crate::commands::{RunArgs, SampleArgs, ValidateArgs};
use crate::error::{CliError, CliResult};
use crate::output::{
    failing_labels, render_plan_summary, render_sample_text, OutputFormat, Reporter,
};
use std::sync::Arc;
use wsprobe::{render_text, run_plan, ConnectionRegistry, SessionRunner, TestPlan};

/// `wsprobe run`: execute a plan and print its report
pub async fn run(args: &RunArgs, reporter: &Reporter) -> CliResult<()> {
    let mut plan = TestPlan::from_path(&args.plan)?;
    if let Some(users) = args.users {
        if users == 0 {
            return Err(CliError::invalid_argument("--users must be at least 1"));
        }
        plan.users = users;
    }
    if let Some(iterations) = args.iterations {
        if iterations == 0 {
            return Err(CliError::invalid_argument("--iterations must be at least 1"));
        }
        plan.iterations = iterations;
    }

    let runner = Arc::new(SessionRunner::tungstenite(Arc::new(ConnectionRegistry::new())));
    let report = run_plan(&plan, runner).await?;
    let report = if args.results {
        report
    } else {
        report.without_results()
    };

    match args.format {
        OutputFormat::Text => reporter.print(&render_text(&report)),
        OutputFormat::Json => reporter.print(&report.to_json()?),
    }

    if report.all_passed() {
        reporter.success(&format!("{} samples passed", report.total));
        Ok(())
    } else {
        for line in failing_labels(&report) {
            reporter.failure(&line);
        }
        Err(CliError::test_execution(format!(
            "{} of {} samples failed",
            report.failed, report.total
        )))
    }
}

/// `wsprobe sample`: run one sample and print the result
pub async fn sample(args: &SampleArgs, reporter: &Reporter) -> CliResult<()> {
    let config = args.to_config();
    let runner = SessionRunner::tungstenite(Arc::new(ConnectionRegistry::new()));
    let result = runner.sample(&config).await;
    let _ = runner.finish();

    match args.format {
        OutputFormat::Text => reporter.print(&render_sample_text(&result)),
        OutputFormat::Json => reporter.print(&result.to_json()?),
    }

    if result.successful {
        reporter.success(&format!("sample completed in {} ms", result.elapsed_ms));
        Ok(())
    } else {
        reporter.failure(&format!("{}: response code {}", result.label, result.response_code));
        Err(CliError::test_execution(format!(
            "sample failed with response code {}",
            result.response_code
        )))
    }
}

/// `wsprobe validate`: parse and check a plan
pub fn validate(args: &ValidateArgs, reporter: &Reporter) -> CliResult<()> {
    let plan = TestPlan::from_path(&args.plan)?;
    plan.validate()?;
    reporter.print(&render_plan_summary(&plan));
    reporter.success(&format!("{} is valid", args.plan.display()));
    Ok(())
}
