//! Aggregation and report rendering for benchmark sweeps
//!
//! This crate turns per-scenario run results into:
//!
//! - Running aggregate state and final averages
//! - Per-scenario and cumulative Markdown reports
//! - Plain-text notification bodies and subject lines
//! - CSV and JSON exports
//! - A colorized progress log with a plain twin

#![warn(clippy::all)]

pub mod aggregator;
pub mod email;
pub mod entry;
pub mod error;
pub mod export;
pub mod layout;
pub mod markdown;
pub mod recorder;
pub mod sections;
pub mod summary_log;

pub use aggregator::{
    error_excerpt, AggregateState, AverageMetrics, Averages, FailureDetail, RunningSum,
};
pub use email::{final_subject, render_final_body, render_round_body, round_subject};
pub use entry::ScenarioEntry;
pub use error::{ReportError, Result};
pub use export::{CsvExporter, JsonExporter, SweepSummary};
pub use layout::RunLayout;
pub use markdown::{render_scenario, render_summary, ReportHeader};
pub use recorder::{FinalReport, ReportAggregator, ScenarioArtifacts};
pub use sections::{metric_sections, Section, NOT_REPORTED};
pub use summary_log::{strip_ansi, SummaryLog, Tone};
