//! Test-plan execution and reporting.
//!
//! Spawns one task per virtual user, runs the plan's samples for the
//! configured iterations, and aggregates percentile-based latency figures.

use crate::config::TestPlan;
use crate::result::ProbeResult;
use crate::runner::{SampleResult, SessionRunner};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

/// Per-label sample counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelStats {
    /// Samples run under this label
    pub total: u64,
    /// Successful samples
    pub successful: u64,
    /// Failed samples
    pub failed: u64,
}

/// Aggregated outcome of a plan run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanReport {
    /// Plan name
    pub name: String,
    /// Unique id of this run
    pub run_id: String,
    /// RFC 3339 start timestamp
    pub timestamp: String,
    /// Concurrent virtual users
    pub users: usize,
    /// Iterations per user
    pub iterations: usize,
    /// Samples executed
    pub total: u64,
    /// Successful samples
    pub successful: u64,
    /// Failed samples
    pub failed: u64,
    /// Median latency of successful samples (ms)
    pub latency_p50_ms: f64,
    /// 95th percentile latency (ms)
    pub latency_p95_ms: f64,
    /// 99th percentile latency (ms)
    pub latency_p99_ms: f64,
    /// Wall time of the run (seconds)
    pub elapsed_secs: f64,
    /// Successful samples per second
    pub throughput_sps: f64,
    /// Counts per sample label
    pub labels: BTreeMap<String, LabelStats>,
    /// Streaming sessions closed at run end
    pub drained_connections: usize,
    /// Individual results, when kept
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<SampleResult>,
}

impl PlanReport {
    /// Whether every sample succeeded
    #[must_use]
    pub const fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Drop the individual results
    #[must_use]
    pub fn without_results(mut self) -> Self {
        self.results.clear();
        self
    }

    /// Pretty-printed JSON report
    pub fn to_json(&self) -> ProbeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Run every sample of `plan` for each virtual user, then drain the registry
pub async fn run_plan(plan: &TestPlan, runner: Arc<SessionRunner>) -> ProbeResult<PlanReport> {
    plan.validate()?;
    let timestamp = chrono::Utc::now().to_rfc3339();
    let run_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(
        plan = %plan.name,
        run_id = %run_id,
        users = plan.users,
        iterations = plan.iterations,
        "starting plan"
    );

    let start = Instant::now();
    let samples = Arc::new(plan.samples.clone());
    let iterations = plan.iterations;
    let mut handles = Vec::with_capacity(plan.users);
    for user in 0..plan.users {
        let runner = Arc::clone(&runner);
        let samples = Arc::clone(&samples);
        handles.push(tokio::spawn(async move {
            let mut results = Vec::with_capacity(iterations * samples.len());
            for iteration in 0..iterations {
                for config in samples.iter() {
                    let result = runner.sample(config).await;
                    tracing::debug!(
                        user,
                        iteration,
                        sample = %result.label,
                        code = %result.response_code,
                        elapsed_ms = result.elapsed_ms,
                        "sample finished"
                    );
                    results.push(result);
                }
            }
            results
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(user_results) => results.extend(user_results),
            Err(e) => tracing::error!(error = %e, "virtual user task failed"),
        }
    }

    let drained = runner.finish();
    let elapsed_secs = start.elapsed().as_secs_f64();
    let mut report = aggregate(plan, &results, elapsed_secs);
    report.run_id = run_id;
    report.timestamp = timestamp;
    report.drained_connections = drained;
    report.results = results;
    tracing::info!(
        plan = %report.name,
        total = report.total,
        failed = report.failed,
        elapsed_secs = report.elapsed_secs,
        "plan finished"
    );
    Ok(report)
}

fn aggregate(plan: &TestPlan, results: &[SampleResult], elapsed_secs: f64) -> PlanReport {
    let total = results.len() as u64;
    let successful = results.iter().filter(|r| r.successful).count() as u64;

    let mut latencies: Vec<f64> = results
        .iter()
        .filter(|r| r.successful)
        .map(|r| r.elapsed_ms as f64)
        .collect();
    latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut labels: BTreeMap<String, LabelStats> = BTreeMap::new();
    for result in results {
        let stats = labels.entry(result.label.clone()).or_default();
        stats.total += 1;
        if result.successful {
            stats.successful += 1;
        } else {
            stats.failed += 1;
        }
    }

    let throughput_sps = if elapsed_secs > 0.0 {
        successful as f64 / elapsed_secs
    } else {
        0.0
    };

    PlanReport {
        name: plan.name.clone(),
        run_id: String::new(),
        timestamp: String::new(),
        users: plan.users,
        iterations: plan.iterations,
        total,
        successful,
        failed: total - successful,
        latency_p50_ms: percentile(&latencies, 0.50),
        latency_p95_ms: percentile(&latencies, 0.95),
        latency_p99_ms: percentile(&latencies, 0.99),
        elapsed_secs,
        throughput_sps,
        labels,
        drained_connections: 0,
        results: Vec::new(),
    }
}

/// Percentile of a sorted slice; 0.0 when empty
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Human-readable summary of a report
#[must_use]
pub fn render_text(report: &PlanReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Plan: {} (run {})", report.name, report.run_id);
    let _ = writeln!(out, "Started: {}", report.timestamp);
    let _ = writeln!(
        out,
        "Users: {}  Iterations: {}",
        report.users, report.iterations
    );
    let _ = writeln!(
        out,
        "Samples: {} total, {} ok, {} failed",
        report.total, report.successful, report.failed
    );
    let _ = writeln!(
        out,
        "Latency: p50 {:.1} ms, p95 {:.1} ms, p99 {:.1} ms",
        report.latency_p50_ms, report.latency_p95_ms, report.latency_p99_ms
    );
    let _ = writeln!(
        out,
        "Elapsed: {:.2} s  Throughput: {:.2} samples/s",
        report.elapsed_secs, report.throughput_sps
    );
    if !report.labels.is_empty() {
        let _ = writeln!(out, "Labels:");
        for (label, stats) in &report.labels {
            let _ = writeln!(
                out,
                "  {label}: {} total, {} ok, {} failed",
                stats.total, stats.successful, stats.failed
            );
        }
    }
    let _ = writeln!(
        out,
        "Streaming connections closed: {}",
        report.drained_connections
    );
    out
}
