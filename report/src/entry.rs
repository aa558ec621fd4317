//! One processed scenario as seen by the report writers

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use bench_sweep_core::{MetricRecord, RunResult, ScenarioSpec};

/// Everything the report formats need about one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioEntry {
    /// 1-based position in the sweep
    pub index: usize,
    /// Sweep length
    pub total: usize,
    /// Scenario after clamping
    pub spec: ScenarioSpec,
    pub exit_code: i32,
    pub duration_seconds: u64,
    pub timed_out: bool,
    pub raw_output_path: PathBuf,
    /// Present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricRecord>,
    /// Present on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_summary: Option<String>,
}

impl ScenarioEntry {
    /// Entry for a scenario that exited with code zero
    pub fn success(index: usize, total: usize, result: &RunResult, metrics: MetricRecord) -> Self {
        Self::from_result(index, total, result, Some(metrics), None)
    }

    /// Entry for a scenario that failed
    pub fn failure(index: usize, total: usize, result: &RunResult, error_summary: String) -> Self {
        Self::from_result(index, total, result, None, Some(error_summary))
    }

    fn from_result(
        index: usize,
        total: usize,
        result: &RunResult,
        metrics: Option<MetricRecord>,
        error_summary: Option<String>,
    ) -> Self {
        Self {
            index,
            total,
            spec: result.spec.clone(),
            exit_code: result.exit_code,
            duration_seconds: result.duration_seconds,
            timed_out: result.timed_out,
            raw_output_path: result.raw_output_path.clone(),
            metrics,
            error_summary,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.metrics.is_some()
    }

    /// `scenario N/M input=.. output=.. concurrency=..`
    pub fn heading(&self) -> String {
        format!(
            "scenario {}/{} input={} output={} concurrency={}",
            self.index,
            self.total,
            self.spec.input_length,
            self.spec.output_length,
            self.spec.concurrency
        )
    }

    /// Outcome word used in tables and logs
    pub fn status(&self) -> &'static str {
        if self.succeeded() {
            "succeeded"
        } else if self.timed_out {
            "timed out"
        } else {
            "failed"
        }
    }
}
