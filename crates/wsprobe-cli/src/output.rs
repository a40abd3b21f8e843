//! Output formatting

use console::{style, Term};
use std::fmt::Write as _;
use wsprobe::{PlanReport, SampleResult, TestPlan};

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Writes results to stdout and status lines to stderr
#[derive(Debug)]
pub struct Reporter {
    out: Term,
    err: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Reporter {
    /// Create a reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            out: Term::stdout(),
            err: Term::stderr(),
            use_color,
            quiet,
        }
    }

    /// Print a result body to stdout
    pub fn print(&self, text: &str) {
        let _ = self.out.write_str(text);
        if !text.ends_with('\n') {
            let _ = self.out.write_line("");
        }
    }

    /// Print a success line
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };
        let _ = self.err.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure line, even in quiet mode
    pub fn failure(&self, message: &str) {
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };
        let _ = self.err.write_line(&format!("{prefix} {message}"));
    }
}

/// Text rendering of one sample result
#[must_use]
pub fn render_sample_text(result: &SampleResult) -> String {
    let mut out = String::new();
    let status = if result.successful { "ok" } else { "failed" };
    let _ = writeln!(out, "Sample: {} ({status})", result.label);
    let _ = writeln!(out, "Response code: {}", result.response_code);
    let _ = writeln!(
        out,
        "Messages: {}  Elapsed: {} ms  Connected: {}",
        result.message_count, result.elapsed_ms, result.connected
    );
    if !result.response_data.is_empty() {
        let _ = writeln!(out, "\n[Response]\n{}", result.response_data.trim_end());
    }
    let _ = writeln!(out, "{}", result.response_message.trim_end());
    out
}

/// Text summary of a validated plan
#[must_use]
pub fn render_plan_summary(plan: &TestPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Plan '{}': {} samples, {} users, {} iterations ({} samples total)",
        plan.name,
        plan.samples.len(),
        plan.users,
        plan.iterations,
        plan.total_samples()
    );
    for sample in &plan.samples {
        let uri = sample.uri().unwrap_or_default();
        let mode = if sample.streaming_connection {
            "streaming"
        } else {
            "single"
        };
        let _ = writeln!(out, "  - {} -> {uri} ({mode})", sample.name);
    }
    out
}

/// One line per label that had failing samples
#[must_use]
pub fn failing_labels(report: &PlanReport) -> Vec<String> {
    report
        .labels
        .iter()
        .filter(|(_, stats)| stats.failed > 0)
        .map(|(label, stats)| format!("{label}: {} of {} failed", stats.failed, stats.total))
        .collect()
}
