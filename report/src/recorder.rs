//! Stateful report writer driven once per scenario

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{debug, info};

use bench_sweep_core::{MetricRecord, RunResult};

use crate::aggregator::{error_excerpt, AggregateState, AverageMetrics};
use crate::email::{render_final_body, render_round_body};
use crate::entry::ScenarioEntry;
use crate::error::Result;
use crate::export::{CsvExporter, JsonExporter, SweepSummary};
use crate::layout::RunLayout;
use crate::markdown::{render_scenario, render_summary, ReportHeader};

/// Files written for one scenario
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioArtifacts {
    pub entry: ScenarioEntry,
    pub report_path: PathBuf,
    pub email_body_path: PathBuf,
    /// Report on success, raw log on failure
    pub attachment_path: PathBuf,
}

/// Files written when the sweep finishes
#[derive(Debug, Clone, PartialEq)]
pub struct FinalReport {
    pub averages: AverageMetrics,
    pub summary_path: PathBuf,
    pub email_body_path: PathBuf,
    pub csv_path: PathBuf,
    pub json_path: PathBuf,
}

/// Folds scenario results into [`AggregateState`] and keeps every report
/// artifact on disk current
///
/// The cumulative Markdown report is rewritten after each scenario, so an
/// interrupted sweep still leaves a usable summary behind.
#[derive(Debug)]
pub struct ReportAggregator {
    layout: RunLayout,
    header: ReportHeader,
    total: usize,
    preface: Option<String>,
    state: AggregateState,
    entries: Vec<ScenarioEntry>,
}

impl ReportAggregator {
    /// Create an aggregator for a sweep of `total` scenarios
    pub fn new(layout: RunLayout, header: ReportHeader, total: usize) -> Self {
        Self {
            layout,
            header,
            total,
            preface: None,
            state: AggregateState::new(),
            entries: Vec::new(),
        }
    }

    /// Text prepended to every email body
    pub fn with_preface(mut self, preface: Option<String>) -> Self {
        self.preface = preface;
        self
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    pub fn state(&self) -> &AggregateState {
        &self.state
    }

    pub fn entries(&self) -> &[ScenarioEntry] {
        &self.entries
    }

    /// Fold one finished scenario into the aggregate and keep its entry
    ///
    /// A run that exited with code zero counts as a success even when no
    /// metrics could be extracted; its values are then all "not reported".
    /// Nothing is written here, so the aggregate and the entry list always
    /// move together even when the artifacts cannot be written afterwards.
    pub fn record(&mut self, result: &RunResult, metrics: Option<MetricRecord>) -> ScenarioEntry {
        let index = self.entries.len() + 1;

        let entry = if result.succeeded() {
            let metrics = metrics.unwrap_or_default();
            self.state.record_success(&metrics);
            ScenarioEntry::success(index, self.total, result, metrics)
        } else {
            let output = read_lossy(&result.raw_output_path);
            let summary = error_excerpt(&output, result.exit_code, result.timed_out);
            self.state.record_failure(index, &result.spec, summary.clone());
            ScenarioEntry::failure(index, self.total, result, summary)
        };
        self.entries.push(entry.clone());

        debug!(index, status = entry.status(), "Recorded scenario");
        entry
    }

    /// Write the email body and report for a recorded scenario, then rewrite
    /// the cumulative summary
    ///
    /// The email body goes first so a round notification can still be sent
    /// when the report itself cannot be written.
    pub fn write_scenario(&self, entry: &ScenarioEntry) -> Result<ScenarioArtifacts> {
        let email_body_path = self.layout.scenario_email(entry.index);
        std::fs::write(
            &email_body_path,
            render_round_body(self.preface.as_deref(), entry),
        )?;

        let report_path = self.layout.scenario_report(entry.index);
        std::fs::write(&report_path, render_scenario(entry))?;

        self.write_summary(None)?;

        let attachment_path = if entry.succeeded() {
            report_path.clone()
        } else {
            entry.raw_output_path.clone()
        };

        Ok(ScenarioArtifacts {
            entry: entry.clone(),
            report_path,
            email_body_path,
            attachment_path,
        })
    }

    fn write_summary(&self, finished: Option<DateTime<Local>>) -> Result<PathBuf> {
        let path = self.layout.summary_report();
        std::fs::write(
            &path,
            render_summary(&self.header, &self.entries, &self.state, finished),
        )?;
        Ok(path)
    }

    /// Compute averages and write the final report, email body and exports
    pub fn finalize(&self, finished: DateTime<Local>) -> Result<FinalReport> {
        let averages = self.state.finalize();
        let summary_path = self.write_summary(Some(finished))?;

        let email_body_path = self.layout.final_email();
        std::fs::write(
            &email_body_path,
            render_final_body(
                self.preface.as_deref(),
                self.header.generated_at,
                finished,
                &self.state,
                &self.entries,
            ),
        )?;

        let csv_path = self.layout.scenarios_csv();
        CsvExporter::export(&self.entries, &csv_path)?;

        let json_path = self.layout.summary_json();
        JsonExporter::export(
            &SweepSummary {
                started_at: self.header.generated_at,
                finished_at: finished,
                state: self.state.clone(),
                averages,
                scenarios: self.entries.clone(),
            },
            &json_path,
        )?;

        info!(
            succeeded = self.state.succeeded_count,
            failed = self.state.failed_count,
            summary = %summary_path.display(),
            "Sweep report finalized"
        );

        Ok(FinalReport {
            averages,
            summary_path,
            email_body_path,
            csv_path,
            json_path,
        })
    }
}

fn read_lossy(path: &Path) -> String {
    std::fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bench_sweep_core::ScenarioSpec;

    fn aggregator(dir: &Path, total: usize) -> ReportAggregator {
        let header = ReportHeader::new("Benchmark sweep", Local::now());
        ReportAggregator::new(RunLayout::at(dir), header, total)
    }

    fn result(dir: &Path, index: usize, exit_code: i32, log: &str) -> RunResult {
        let path = dir.join(format!("scenario_{index:02}.log"));
        std::fs::write(&path, log).unwrap();
        RunResult {
            spec: ScenarioSpec::new(50, 1024, 4, 20),
            exit_code,
            duration_seconds: 5,
            raw_output_path: path,
            timed_out: false,
        }
    }

    fn metrics() -> MetricRecord {
        MetricRecord {
            successful_requests: Some(20),
            successful_pct: Some(100.0),
            output_token_throughput: Some(400.0),
            per_concurrency_output_throughput: Some(100.0),
            per_concurrency_total_throughput: Some(120.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_success_writes_report_and_attaches_it() {
        let dir = tempfile::tempdir().unwrap();
        let mut agg = aggregator(dir.path(), 2);

        let entry = agg.record(&result(dir.path(), 1, 0, "ok\n"), Some(metrics()));
        let artifacts = agg.write_scenario(&entry).unwrap();

        assert!(artifacts.entry.succeeded());
        assert_eq!(artifacts.attachment_path, artifacts.report_path);
        assert!(artifacts.report_path.ends_with("scenario_01_report.md"));
        assert!(std::fs::read_to_string(&artifacts.email_body_path)
            .unwrap()
            .contains("scenario 1/2"));

        let summary = std::fs::read_to_string(dir.path().join("benchmark_summary.md")).unwrap();
        assert!(summary.contains("Status: in progress"));
        assert!(summary.contains("1 succeeded, 0 failed"));
    }

    #[test]
    fn test_failure_attaches_raw_log_with_excerpt() {
        let dir = tempfile::tempdir().unwrap();
        let mut agg = aggregator(dir.path(), 1);

        let run = result(dir.path(), 1, 1, "loading\nValueError: bad prompt\n");
        let entry = agg.record(&run, None);
        let artifacts = agg.write_scenario(&entry).unwrap();

        assert!(!artifacts.entry.succeeded());
        assert_eq!(artifacts.attachment_path, run.raw_output_path);
        assert_eq!(agg.state().failed_count, 1);
        assert_eq!(
            agg.state().failure_details[0].error_summary,
            "ValueError: bad prompt"
        );
    }

    #[test]
    fn test_finalize_writes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mut agg = aggregator(dir.path(), 2).with_preface(Some("weekly".into()));

        for (index, exit_code, metrics) in [(1, 0, Some(metrics())), (2, 1, None)] {
            let entry = agg.record(&result(dir.path(), index, exit_code, ""), metrics);
            agg.write_scenario(&entry).unwrap();
        }
        assert_eq!(agg.entries().len(), 2);

        let report = agg.finalize(Local::now()).unwrap();
        let averages = report.averages.averages().copied().unwrap();
        assert_eq!(averages.scenarios, 1);
        assert_eq!(averages.success_rate, Some(100.0));
        assert_eq!(averages.per_concurrency_output_throughput, Some(100.0));

        assert!(report.csv_path.exists());
        assert!(report.json_path.exists());
        let body = std::fs::read_to_string(&report.email_body_path).unwrap();
        assert!(body.starts_with("weekly\n"));
        assert!(body.contains("1 succeeded, 1 failed"));
        let summary = std::fs::read_to_string(&report.summary_path).unwrap();
        assert!(summary.contains("## Averages"));
        assert!(summary.contains("exit code 1"));
    }

    #[test]
    fn test_success_without_metrics_counts_as_success() {
        let dir = tempfile::tempdir().unwrap();
        let mut agg = aggregator(dir.path(), 1);
        agg.record(&result(dir.path(), 1, 0, ""), None);

        assert_eq!(agg.state().succeeded_count, 1);
        let report = agg.finalize(Local::now()).unwrap();
        let averages = report.averages.averages().copied().unwrap();
        assert_eq!(averages.success_rate, None);
    }

    #[test]
    fn test_unwritable_report_keeps_state_and_entries_aligned() {
        let dir = tempfile::tempdir().unwrap();
        let mut agg = aggregator(dir.path(), 2);
        // a directory where the first report should go
        std::fs::create_dir(dir.path().join("scenario_01_report.md")).unwrap();

        let first = agg.record(&result(dir.path(), 1, 0, ""), Some(metrics()));
        assert!(agg.write_scenario(&first).is_err());
        assert_eq!(agg.state().processed(), 1);
        assert_eq!(agg.entries().len(), 1);
        // the email body is written before the report
        assert!(dir.path().join("scenario_01_email.txt").exists());

        let second = agg.record(&result(dir.path(), 2, 1, "Error: boom\n"), None);
        assert_eq!(second.index, 2);
        agg.write_scenario(&second).unwrap();
        assert_eq!(agg.state().processed(), 2);
        assert_eq!(agg.entries().len(), 2);

        let report = agg.finalize(Local::now()).unwrap();
        let csv = std::fs::read_to_string(&report.csv_path).unwrap();
        assert_eq!(csv.lines().count(), 3);
        let summary = std::fs::read_to_string(&report.summary_path).unwrap();
        assert!(summary.contains("1 succeeded, 1 failed"));
    }
}
