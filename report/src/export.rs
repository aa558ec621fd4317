//! CSV and JSON exports written when a sweep finishes

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Local};
use csv::Writer;
use serde::{Deserialize, Serialize};

use crate::aggregator::{AggregateState, AverageMetrics};
use crate::entry::ScenarioEntry;
use crate::error::Result;

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub struct CsvExporter;

impl CsvExporter {
    /// One row per processed scenario; empty cells mean "not reported"
    pub fn export(entries: &[ScenarioEntry], path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut wtr = Writer::from_writer(file);

        wtr.write_record([
            "index",
            "name",
            "input_length",
            "output_length",
            "concurrency",
            "num_prompts",
            "range_ratio",
            "prefix_length",
            "burstiness",
            "status",
            "exit_code",
            "duration_s",
            "successful_requests",
            "successful_pct",
            "failed_requests",
            "total_requests",
            "request_throughput",
            "output_token_throughput",
            "total_token_throughput",
            "output_throughput_per_concurrency",
            "total_throughput_per_concurrency",
            "mean_ttft_ms",
            "median_ttft_ms",
            "p99_ttft_ms",
            "mean_tpot_ms",
            "median_tpot_ms",
            "p99_tpot_ms",
            "mean_itl_ms",
            "median_itl_ms",
            "p99_itl_ms",
        ])?;

        for entry in entries {
            let m = entry.metrics.clone().unwrap_or_default();
            let spec = &entry.spec;
            wtr.write_record([
                entry.index.to_string(),
                spec.name.clone().unwrap_or_default(),
                spec.input_length.to_string(),
                spec.output_length.to_string(),
                spec.concurrency.to_string(),
                spec.num_prompts.to_string(),
                spec.range_ratio.to_string(),
                spec.prefix_length.to_string(),
                spec.burstiness.to_string(),
                entry.status().to_string(),
                entry.exit_code.to_string(),
                entry.duration_seconds.to_string(),
                cell(m.successful_requests),
                cell(m.successful_pct),
                cell(m.failed_requests),
                cell(m.total_requests),
                cell(m.request_throughput),
                cell(m.output_token_throughput),
                cell(m.total_token_throughput),
                cell(m.per_concurrency_output_throughput),
                cell(m.per_concurrency_total_throughput),
                cell(m.ttft.mean),
                cell(m.ttft.median),
                cell(m.ttft.p99),
                cell(m.tpot.mean),
                cell(m.tpot.median),
                cell(m.tpot.p99),
                cell(m.itl.mean),
                cell(m.itl.median),
                cell(m.itl.p99),
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }
}

/// Machine-readable record of a finished sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub state: AggregateState,
    pub averages: AverageMetrics,
    pub scenarios: Vec<ScenarioEntry>,
}

pub struct JsonExporter;

impl JsonExporter {
    /// Export the full summary, pretty-printed
    pub fn export(summary: &SweepSummary, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, summary)?;
        Ok(())
    }
}
