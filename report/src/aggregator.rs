//! Running totals across a sweep

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use bench_sweep_core::{round2, MetricRecord, ScenarioSpec};

/// Maximum number of error lines kept per failed scenario
const EXCERPT_LINES: usize = 3;

fn error_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)error|exception|fail").expect("error pattern is valid"))
}

/// Sum of reported values plus how many values went into it
///
/// Absent values are skipped rather than counted as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningSum {
    /// Sum of the reported values
    pub total: f64,
    /// Number of values summed
    pub samples: usize,
}

impl RunningSum {
    /// Add a value if one was reported
    pub fn add(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.total += v;
            self.samples += 1;
        }
    }

    /// Mean of the added values, rounded to two decimals
    pub fn mean(&self) -> Option<f64> {
        (self.samples > 0).then(|| round2(self.total / self.samples as f64))
    }
}

/// A scenario that exited unsuccessfully
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureDetail {
    /// 1-based position in the sweep
    pub index: usize,
    /// Scenario as it was run
    pub spec: ScenarioSpec,
    /// First error lines of the raw log, or the exit reason
    pub error_summary: String,
}

/// Running totals, owned by the report aggregator for the whole sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateState {
    /// Output tokens/s per concurrency slot
    pub sum_per_concurrency_output_throughput: RunningSum,
    /// Total tokens/s per concurrency slot
    pub sum_per_concurrency_token_throughput: RunningSum,
    /// Successful request percentage
    pub sum_success_rate: RunningSum,
    /// Scenarios that exited with code zero
    pub succeeded_count: usize,
    /// Scenarios that exited nonzero, timed out or never started
    pub failed_count: usize,
    /// One entry per failed scenario, in sweep order
    pub failure_details: Vec<FailureDetail>,
}

impl AggregateState {
    /// Create zeroed state
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in a scenario that exited with code zero
    pub fn record_success(&mut self, metrics: &MetricRecord) {
        self.sum_success_rate.add(metrics.successful_pct);
        self.sum_per_concurrency_output_throughput
            .add(metrics.per_concurrency_output_throughput);
        self.sum_per_concurrency_token_throughput
            .add(metrics.per_concurrency_total_throughput);
        self.succeeded_count += 1;
    }

    /// Record a failed scenario; it contributes nothing to the sums
    pub fn record_failure(&mut self, index: usize, spec: &ScenarioSpec, error_summary: String) {
        self.failure_details.push(FailureDetail {
            index,
            spec: spec.clone(),
            error_summary,
        });
        self.failed_count += 1;
    }

    /// Scenarios folded in so far
    pub fn processed(&self) -> usize {
        self.succeeded_count + self.failed_count
    }

    /// Normalize the sums; reports [`AverageMetrics::NoData`] when nothing succeeded
    pub fn finalize(&self) -> AverageMetrics {
        if self.succeeded_count == 0 {
            return AverageMetrics::NoData;
        }
        AverageMetrics::Averages(Averages {
            scenarios: self.succeeded_count,
            success_rate: self.sum_success_rate.mean(),
            per_concurrency_output_throughput: self.sum_per_concurrency_output_throughput.mean(),
            per_concurrency_token_throughput: self.sum_per_concurrency_token_throughput.mean(),
        })
    }
}

/// Averages over successful scenarios
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Averages {
    /// Number of successful scenarios
    pub scenarios: usize,
    /// Mean successful request percentage
    pub success_rate: Option<f64>,
    /// Mean output tokens/s per concurrency slot
    pub per_concurrency_output_throughput: Option<f64>,
    /// Mean total tokens/s per concurrency slot
    pub per_concurrency_token_throughput: Option<f64>,
}

/// Result of normalizing an [`AggregateState`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AverageMetrics {
    /// No scenario succeeded
    NoData,
    /// At least one scenario succeeded
    Averages(Averages),
}

impl AverageMetrics {
    /// The averages, if any scenario succeeded
    pub fn averages(&self) -> Option<&Averages> {
        match self {
            Self::NoData => None,
            Self::Averages(a) => Some(a),
        }
    }
}

/// First few error-looking lines of a failed run, or a generic fallback
pub fn error_excerpt(output: &str, exit_code: i32, timed_out: bool) -> String {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|line| error_line_regex().is_match(line))
        .take(EXCERPT_LINES)
        .collect();

    if !lines.is_empty() {
        lines.join("\n")
    } else if timed_out {
        "timed out".to_string()
    } else {
        format!("exit code {exit_code}")
    }
}
