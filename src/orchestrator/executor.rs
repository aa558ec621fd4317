//! Orchestrator execution logic

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tokio::sync::watch;

use bench_sweep_core::{
    build, probe, MetricExtractor, MetricRecord, RunResult, ScenarioRunner, ScenarioSpec, SweepConfig,
};
use bench_sweep_notify::NotificationDispatcher;
use bench_sweep_report::{
    final_subject, round_subject, AggregateState, AverageMetrics, FinalReport, ReportAggregator,
    ReportHeader, RunLayout, SummaryLog, Tone,
};

use crate::keys::API_KEY_ENV;
use crate::sysinfo::SystemInventory;

const REPORT_TITLE: &str = "Benchmark sweep report";

/// What a finished sweep produced
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    /// Timestamped run directory
    pub run_dir: PathBuf,
    pub state: AggregateState,
    pub report: FinalReport,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    /// Stopped early by Ctrl+C
    pub interrupted: bool,
}

impl SweepOutcome {
    pub fn averages(&self) -> &AverageMetrics {
        &self.report.averages
    }
}

#[derive(Debug, Default)]
struct NotifyTally {
    sent: usize,
    failed: usize,
}

/// Drives a sweep from capability probe to final notification
///
/// Scenarios run strictly one after another. Only the capability probe can
/// abort a sweep; every later failure is scoped to its scenario.
pub struct Orchestrator {
    pub(crate) config: SweepConfig,
    pub(crate) scenarios: Vec<ScenarioSpec>,
    pub(crate) extractor: MetricExtractor,
    pub(crate) dispatcher: NotificationDispatcher,
    pub(crate) system: Option<SystemInventory>,
    pub(crate) api_key: Option<String>,
    pub(crate) shutdown_tx: watch::Sender<bool>,
}

impl Orchestrator {
    /// Get the sweep configuration
    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn scenarios(&self) -> &[ScenarioSpec] {
        &self.scenarios
    }

    /// Stop after the scenario in progress
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    fn header(&self, started: chrono::DateTime<Local>) -> ReportHeader {
        let base = &self.config.base;
        let mut rows = vec![
            ("Benchmark command".to_string(), base.program.display()),
            ("Base URL".to_string(), base.base_url.clone()),
            ("Model".to_string(), base.model.clone()),
            ("Backend".to_string(), base.backend.clone()),
            ("Dataset".to_string(), base.dataset_name.clone()),
            ("Request rate".to_string(), base.request_rate.clone()),
            ("Scenarios".to_string(), self.scenarios.len().to_string()),
            (
                "Cooldown".to_string(),
                format!("{} s", self.config.cooldown.as_secs()),
            ),
        ];
        if let Some(tokenizer) = &base.tokenizer {
            rows.insert(3, ("Tokenizer".to_string(), tokenizer.clone()));
        }
        if let Some(timeout) = self.config.scenario_timeout {
            rows.push((
                "Scenario timeout".to_string(),
                format!("{} s", timeout.as_secs()),
            ));
        }

        let header = ReportHeader::new(REPORT_TITLE, started).with_config(rows);
        match &self.system {
            Some(system) => header.with_system_info(system.render_markdown()),
            None => header,
        }
    }

    async fn notify(
        &self,
        tally: &mut NotifyTally,
        subject: &str,
        body: &Path,
        attachment: Option<&Path>,
    ) {
        match self.dispatcher.send(subject, body, attachment).await {
            Ok(()) => tally.sent += 1,
            // already logged by the dispatcher
            Err(_) => tally.failed += 1,
        }
    }

    fn extract(&self, result: &RunResult) -> Option<MetricRecord> {
        if !result.succeeded() {
            return None;
        }
        match self
            .extractor
            .extract_file(&result.raw_output_path, result.spec.concurrency)
        {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                tracing::warn!(
                    log = %result.raw_output_path.display(),
                    error = %e,
                    "Could not read scenario output for metrics"
                );
                None
            }
        }
    }

    /// Run the sweep
    pub async fn run(&self) -> Result<SweepOutcome> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let help_args: Vec<&str> = self.config.help_args.iter().map(String::as_str).collect();

        let capabilities = probe(&self.config.base.program, &help_args)
            .await
            .context("Cannot start sweep")?;
        tracing::info!(
            options = capabilities.len(),
            program = %self.config.base.program.display(),
            "Discovered benchmark tool options"
        );

        let started = Local::now();
        let layout = RunLayout::create(&self.config.output_root, started)
            .context("Failed to create run directory")?;
        let mut log = SummaryLog::open(&layout.summary_color_log(), &layout.summary_plain_log())
            .context("Failed to open summary log")?
            .with_console(self.config.echo_output);

        if let Some(system) = &self.system {
            if let Err(e) = std::fs::write(layout.system_info(), system.render_text()) {
                tracing::warn!(error = %e, "Failed to write system info");
            }
        }

        let total = self.scenarios.len();
        let mut aggregator = ReportAggregator::new(layout.clone(), self.header(started), total)
            .with_preface(self.dispatcher.config().preface.clone());
        let runner = ScenarioRunner::new()
            .with_echo(self.config.echo_output)
            .with_timeout(self.config.scenario_timeout);
        let mut tally = NotifyTally::default();
        let mut interrupted = false;

        write_line(
            &mut log,
            Tone::Heading,
            &format!("Sweep of {total} scenario(s) started; output in {}", layout.root().display()),
        );

        for (idx, spec) in self.scenarios.iter().enumerate() {
            if *shutdown_rx.borrow() {
                interrupted = true;
                break;
            }

            let index = idx + 1;
            write_line(
                &mut log,
                Tone::Heading,
                &format!("Scenario {index}/{total}: {}", spec.label()),
            );

            let built = build(spec, &capabilities, &self.config.base);
            for warning in &built.warnings {
                write_line(&mut log, Tone::Warning, &format!("  {warning}"));
            }

            let mut arguments = built.arguments;
            if let Some(key) = &self.api_key {
                arguments.env.push((API_KEY_ENV.to_string(), key.clone()));
            }
            tracing::info!(index, command = %arguments.display(), "Running scenario");

            let result = runner
                .run(&built.effective, &arguments, &layout.scenario_log(index))
                .await;
            let metrics = self.extract(&result);

            let entry = aggregator.record(&result, metrics);
            if entry.succeeded() {
                let per_conc = entry
                    .metrics
                    .as_ref()
                    .and_then(|m| m.per_concurrency_output_throughput)
                    .map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"));
                write_line(
                    &mut log,
                    Tone::Success,
                    &format!(
                        "  succeeded in {} s, {per_conc} output tok/s per concurrency",
                        entry.duration_seconds
                    ),
                );
            } else {
                write_line(
                    &mut log,
                    Tone::Failure,
                    &format!(
                        "  {} (exit code {}) after {} s",
                        entry.status(),
                        entry.exit_code,
                        entry.duration_seconds
                    ),
                );
            }

            let (body, attachment) = match aggregator.write_scenario(&entry) {
                Ok(artifacts) => (artifacts.email_body_path, artifacts.attachment_path),
                Err(e) => {
                    tracing::error!(index, error = %e, "Failed to write scenario report");
                    write_line(
                        &mut log,
                        Tone::Failure,
                        &format!("  could not write scenario report: {e}"),
                    );
                    // fall back to the raw log when even the body is missing
                    let body = layout.scenario_email(index);
                    let body = if body.exists() {
                        body
                    } else {
                        entry.raw_output_path.clone()
                    };
                    (body, entry.raw_output_path.clone())
                }
            };

            if self.dispatcher.config().notify_each() {
                self.notify(
                    &mut tally,
                    &round_subject(&entry),
                    &body,
                    Some(attachment.as_path()),
                )
                .await;
            }

            if !self.config.cooldown.is_zero() {
                tracing::debug!(secs = self.config.cooldown.as_secs(), "Cooling down");
                tokio::select! {
                    _ = tokio::time::sleep(self.config.cooldown) => {}
                    _ = shutdown_rx.changed() => {
                        interrupted = index < total;
                        break;
                    }
                }
            }
        }

        if interrupted {
            write_line(
                &mut log,
                Tone::Warning,
                "Sweep interrupted; remaining scenarios skipped",
            );
        }

        let report = aggregator
            .finalize(Local::now())
            .context("Failed to write final report")?;
        let state = aggregator.state().clone();

        let tone = if state.failed_count == 0 {
            Tone::Success
        } else {
            Tone::Warning
        };
        write_line(
            &mut log,
            tone,
            &format!(
                "Sweep finished: {} succeeded, {} failed",
                state.succeeded_count, state.failed_count
            ),
        );
        match report.averages.averages() {
            Some(a) => write_line(
                &mut log,
                Tone::Info,
                &format!(
                    "  average success rate {}, output {} / total {} tok/s per concurrency",
                    fmt_opt(a.success_rate, "%"),
                    fmt_opt(a.per_concurrency_output_throughput, ""),
                    fmt_opt(a.per_concurrency_token_throughput, "")
                ),
            ),
            None => write_line(&mut log, Tone::Info, "  no data: no scenario succeeded"),
        }
        write_line(
            &mut log,
            Tone::Info,
            &format!("  report: {}", report.summary_path.display()),
        );

        if self.dispatcher.config().notify_final() {
            self.notify(
                &mut tally,
                &final_subject(&state),
                &report.email_body_path,
                Some(report.summary_path.as_path()),
            )
            .await;
        }

        Ok(SweepOutcome {
            run_dir: layout.root().to_path_buf(),
            state,
            report,
            notifications_sent: tally.sent,
            notifications_failed: tally.failed,
            interrupted,
        })
    }

    /// Run with Ctrl+C signal handling
    ///
    /// Ctrl+C stops the sweep after the current scenario; the report is
    /// still finalized over the scenarios that ran.
    pub async fn run_with_signal_handling(&self) -> Result<SweepOutcome> {
        let shutdown_tx = self.shutdown_tx.clone();

        let signal_handle = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Received Ctrl+C, stopping after the current scenario...");
                    shutdown_tx.send_replace(true);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                }
            }
        });

        let result = self.run().await;
        signal_handle.abort();
        result
    }
}

fn fmt_opt(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{v:.2}{unit}"),
        None => "n/a".to_string(),
    }
}

fn write_line(log: &mut SummaryLog, tone: Tone, text: &str) {
    if let Err(e) = log.line(tone, text) {
        tracing::warn!(error = %e, "Failed to write summary log");
    }
}
