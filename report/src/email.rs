//! Plain-text notification bodies and subject lines

use std::fmt::Write as _;

use chrono::{DateTime, Local};

use crate::aggregator::AggregateState;
use crate::entry::ScenarioEntry;
use crate::markdown::average_rows;
use crate::sections::metric_sections;

/// Prefix on every subject line
pub const SUBJECT_PREFIX: &str = "[bench-sweep]";

const RULE_WIDTH: usize = 60;

fn rule(ch: char) -> String {
    std::iter::repeat(ch).take(RULE_WIDTH).collect()
}

fn push_preface(out: &mut String, preface: Option<&str>) {
    if let Some(text) = preface.map(str::trim).filter(|t| !t.is_empty()) {
        out.push_str(text);
        out.push('\n');
        out.push_str(&rule('='));
        out.push_str("\n\n");
    }
}

fn push_rows(out: &mut String, rows: &[(&str, String)]) {
    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    for (label, value) in rows {
        let _ = writeln!(out, "  {label:<width$}  {value}");
    }
}

fn push_round(out: &mut String, entry: &ScenarioEntry) {
    let _ = writeln!(out, "{}", entry.heading());
    let _ = writeln!(
        out,
        "prompts={} range_ratio={} prefix={} burstiness={}",
        entry.spec.num_prompts, entry.spec.range_ratio, entry.spec.prefix_length, entry.spec.burstiness
    );
    let _ = writeln!(out, "Duration: {} s", entry.duration_seconds);
    let _ = writeln!(out, "Status: {}\n", entry.status());

    match &entry.metrics {
        Some(metrics) => {
            for section in metric_sections(metrics) {
                let _ = writeln!(out, "{}", section.title);
                let _ = writeln!(out, "{}", rule('-'));
                push_rows(out, &section.rows);
                out.push('\n');
            }
        }
        None => {
            let _ = writeln!(out, "Exit code: {}", entry.exit_code);
            if let Some(summary) = &entry.error_summary {
                out.push_str("Error:\n");
                for line in summary.lines() {
                    let _ = writeln!(out, "  {line}");
                }
            }
            out.push('\n');
        }
    }
}

/// Body of the per-scenario notification
pub fn render_round_body(preface: Option<&str>, entry: &ScenarioEntry) -> String {
    let mut out = String::new();
    push_preface(&mut out, preface);
    push_round(&mut out, entry);
    out
}

/// Body of the end-of-sweep notification
pub fn render_final_body(
    preface: Option<&str>,
    started: DateTime<Local>,
    finished: DateTime<Local>,
    state: &AggregateState,
    entries: &[ScenarioEntry],
) -> String {
    let mut out = String::new();
    push_preface(&mut out, preface);

    let _ = writeln!(out, "Benchmark sweep complete");
    let _ = writeln!(out, "Started:  {}", started.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "Finished: {}", finished.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(
        out,
        "Scenarios: {} succeeded, {} failed\n",
        state.succeeded_count, state.failed_count
    );

    let _ = writeln!(out, "Averages over successful scenarios");
    let _ = writeln!(out, "{}", rule('-'));
    match average_rows(&state.finalize()) {
        Some(rows) => push_rows(&mut out, &rows),
        None => out.push_str("  no data: no scenario succeeded\n"),
    }
    out.push('\n');

    if !state.failure_details.is_empty() {
        let _ = writeln!(out, "Failures");
        let _ = writeln!(out, "{}", rule('-'));
        for failure in &state.failure_details {
            let _ = writeln!(out, "  #{} {}", failure.index, failure.spec.label());
            for line in failure.error_summary.lines() {
                let _ = writeln!(out, "      {line}");
            }
        }
        out.push('\n');
    }

    for entry in entries {
        out.push_str(&rule('='));
        out.push('\n');
        push_round(&mut out, entry);
    }
    out
}

/// Subject for a per-scenario notification
pub fn round_subject(entry: &ScenarioEntry) -> String {
    let mut subject = format!("{SUBJECT_PREFIX} {}", entry.heading());
    if !entry.succeeded() {
        subject.push_str(" (failed)");
    }
    subject
}

/// Subject for the final notification
pub fn final_subject(state: &AggregateState) -> String {
    format!(
        "{SUBJECT_PREFIX} sweep complete: {} succeeded, {} failed",
        state.succeeded_count, state.failed_count
    )
}
