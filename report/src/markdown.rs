//! Markdown rendering for the per-scenario and cumulative reports

use std::fmt::Write as _;

use chrono::{DateTime, Local};

use crate::aggregator::{AggregateState, AverageMetrics};
use crate::entry::ScenarioEntry;
use crate::sections::{fmt_f64, fmt_unit, metric_sections, Section};

/// Static information printed at the top of the cumulative report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportHeader {
    pub title: String,
    pub generated_at: DateTime<Local>,
    /// Sweep settings shown as a key/value table
    pub config: Vec<(String, String)>,
    /// Pre-rendered Markdown block describing the host
    pub system_info_markdown: Option<String>,
}

impl ReportHeader {
    pub fn new(title: impl Into<String>, generated_at: DateTime<Local>) -> Self {
        Self {
            title: title.into(),
            generated_at,
            config: Vec::new(),
            system_info_markdown: None,
        }
    }

    pub fn with_config(mut self, config: Vec<(String, String)>) -> Self {
        self.config = config;
        self
    }

    pub fn with_system_info(mut self, markdown: impl Into<String>) -> Self {
        self.system_info_markdown = Some(markdown.into());
        self
    }
}

fn push_table(out: &mut String, header: (&str, &str), rows: &[(&str, String)]) {
    let _ = writeln!(out, "| {} | {} |", header.0, header.1);
    out.push_str("|---|---|\n");
    for (label, value) in rows {
        let _ = writeln!(out, "| {label} | {value} |");
    }
    out.push('\n');
}

fn push_section(out: &mut String, level: &str, section: &Section) {
    let _ = writeln!(out, "{level} {}\n", section.title);
    push_table(out, ("Metric", "Value"), &section.rows);
}

fn push_entry_body(out: &mut String, entry: &ScenarioEntry, level: &str) {
    let spec = &entry.spec;
    let params = [
        ("Input length", spec.input_length.to_string()),
        ("Output length", spec.output_length.to_string()),
        ("Concurrency", spec.concurrency.to_string()),
        ("Prompts", spec.num_prompts.to_string()),
        ("Range ratio", spec.range_ratio.to_string()),
        ("Prefix length", spec.prefix_length.to_string()),
        ("Burstiness", spec.burstiness.to_string()),
        ("Duration", format!("{} s", entry.duration_seconds)),
        ("Status", entry.status().to_string()),
    ];
    push_table(out, ("Parameter", "Value"), &params);

    match (&entry.metrics, &entry.error_summary) {
        (Some(metrics), _) => {
            for section in metric_sections(metrics) {
                push_section(out, level, &section);
            }
        }
        (None, summary) => {
            let _ = writeln!(out, "Exit code: `{}`\n", entry.exit_code);
            if let Some(summary) = summary {
                out.push_str("```text\n");
                out.push_str(summary);
                out.push_str("\n```\n\n");
            }
            let _ = writeln!(out, "Raw log: `{}`\n", entry.raw_output_path.display());
        }
    }
}

/// Standalone report for one scenario
pub fn render_scenario(entry: &ScenarioEntry) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", entry.heading());
    if let Some(name) = &entry.spec.name {
        let _ = writeln!(out, "_{name}_\n");
    }
    push_entry_body(&mut out, entry, "##");
    out
}

/// Rows for the averages table, or `None` when nothing succeeded
pub fn average_rows(averages: &AverageMetrics) -> Option<Vec<(&'static str, String)>> {
    averages.averages().map(|a| {
        vec![
            ("Successful scenarios", a.scenarios.to_string()),
            ("Average success rate", fmt_unit(a.success_rate, "%")),
            (
                "Average output token throughput per concurrency",
                fmt_unit(a.per_concurrency_output_throughput, "tok/s"),
            ),
            (
                "Average total token throughput per concurrency",
                fmt_unit(a.per_concurrency_token_throughput, "tok/s"),
            ),
        ]
    })
}

/// Cumulative report; `finished` is set once the sweep is over
pub fn render_summary(
    header: &ReportHeader,
    entries: &[ScenarioEntry],
    state: &AggregateState,
    finished: Option<DateTime<Local>>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", header.title);
    let _ = writeln!(
        out,
        "Started: {}  ",
        header.generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    match finished {
        Some(end) => {
            let _ = writeln!(out, "Finished: {}\n", end.format("%Y-%m-%d %H:%M:%S"));
        }
        None => out.push_str("Status: in progress\n\n"),
    }

    if !header.config.is_empty() {
        out.push_str("## Configuration\n\n");
        let rows: Vec<(&str, String)> = header
            .config
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        push_table(&mut out, ("Setting", "Value"), &rows);
    }

    if let Some(system) = &header.system_info_markdown {
        out.push_str("## System\n\n");
        out.push_str(system.trim_end());
        out.push_str("\n\n");
    }

    out.push_str("## Overview\n\n");
    let _ = writeln!(
        out,
        "Processed {} scenario(s): {} succeeded, {} failed.\n",
        state.processed(),
        state.succeeded_count,
        state.failed_count
    );

    out.push_str("| # | Input | Output | Concurrency | Prompts | Status | Duration (s) | Output tok/s per concurrency |\n");
    out.push_str("|---|---|---|---|---|---|---|---|\n");
    for entry in entries {
        let per_conc = entry
            .metrics
            .as_ref()
            .and_then(|m| m.per_concurrency_output_throughput);
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} | {} |",
            entry.index,
            entry.spec.input_length,
            entry.spec.output_length,
            entry.spec.concurrency,
            entry.spec.num_prompts,
            entry.status(),
            entry.duration_seconds,
            fmt_f64(per_conc)
        );
    }
    out.push('\n');

    if finished.is_some() {
        out.push_str("## Averages\n\n");
        match average_rows(&state.finalize()) {
            Some(rows) => push_table(&mut out, ("Metric", "Value"), &rows),
            None => out.push_str("No data: no scenario succeeded.\n\n"),
        }
    }

    if !state.failure_details.is_empty() {
        out.push_str("## Failures\n\n");
        for failure in &state.failure_details {
            let _ = writeln!(out, "- Scenario {}: {}", failure.index, failure.spec.label());
            for line in failure.error_summary.lines() {
                let _ = writeln!(out, "  - `{line}`");
            }
        }
        out.push('\n');
    }

    for entry in entries {
        let _ = writeln!(out, "## {}\n", entry.heading());
        push_entry_body(&mut out, entry, "###");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bench_sweep_core::{MetricRecord, RunResult, ScenarioSpec};
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn run(exit_code: i32) -> RunResult {
        RunResult {
            spec: ScenarioSpec::new(50, 1024, 4, 20),
            exit_code,
            duration_seconds: 30,
            raw_output_path: PathBuf::from("scenario_01.log"),
            timed_out: false,
        }
    }

    fn header() -> ReportHeader {
        ReportHeader::new("Benchmark sweep", Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
            .with_config(vec![("Model".into(), "test".into())])
    }

    #[test]
    fn test_scenario_report_sections_in_order() {
        let metrics = MetricRecord {
            successful_requests: Some(20),
            successful_pct: Some(100.0),
            ..Default::default()
        };
        let entry = ScenarioEntry::success(1, 1, &run(0), metrics);
        let md = render_scenario(&entry);

        let positions: Vec<usize> = [
            "## Request statistics",
            "## Throughput metrics",
            "## Time to first token (TTFT)",
            "## Time per output token",
            "## Inter-token latency (ITL)",
        ]
        .iter()
        .map(|title| md.find(title).unwrap())
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(md.contains("| Successful requests | 20 (100.00%) |"));
    }

    #[test]
    fn test_failed_scenario_report_has_excerpt() {
        let entry = ScenarioEntry::failure(1, 1, &run(2), "Error: connection refused".into());
        let md = render_scenario(&entry);
        assert!(md.contains("Exit code: `2`"));
        assert!(md.contains("Error: connection refused"));
        assert!(!md.contains("Throughput metrics"));
    }

    #[test]
    fn test_summary_in_progress_has_no_averages() {
        let state = AggregateState::new();
        let md = render_summary(&header(), &[], &state, None);
        assert!(md.contains("Status: in progress"));
        assert!(md.contains("| Model | test |"));
        assert!(!md.contains("## Averages"));
    }

    #[test]
    fn test_summary_no_data_when_everything_failed() {
        let mut state = AggregateState::new();
        state.record_failure(1, &ScenarioSpec::new(50, 1024, 4, 20), "exit code 1".into());
        let entries = vec![ScenarioEntry::failure(1, 1, &run(1), "exit code 1".into())];
        let end = Local.with_ymd_and_hms(2024, 1, 2, 4, 0, 0).unwrap();

        let md = render_summary(&header(), &entries, &state, Some(end));
        assert!(md.contains("No data: no scenario succeeded."));
        assert!(md.contains("## Failures"));
        assert!(md.contains("1 failed"));
    }
}
