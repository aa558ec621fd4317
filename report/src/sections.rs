//! Fixed-order metric sections shared by every report format

use bench_sweep_core::{LatencyStats, MetricRecord};

/// Text used for values the benchmark tool did not report
pub const NOT_REPORTED: &str = "n/a";

/// One titled block of label/value rows
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: &'static str,
    pub rows: Vec<(&'static str, String)>,
}

/// Format an optional float with two decimals
pub fn fmt_f64(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_REPORTED.to_string(), |v| format!("{v:.2}"))
}

/// Format an optional float with two decimals and a unit
pub fn fmt_unit(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| NOT_REPORTED.to_string(), |v| format!("{v:.2} {unit}"))
}

fn fmt_count_pct(count: Option<u64>, pct: Option<f64>) -> String {
    match (count, pct) {
        (Some(c), Some(p)) => format!("{c} ({p:.2}%)"),
        (Some(c), None) => c.to_string(),
        (None, Some(p)) => format!("{NOT_REPORTED} ({p:.2}%)"),
        (None, None) => NOT_REPORTED.to_string(),
    }
}

fn fmt_count(count: Option<u64>) -> String {
    count.map_or_else(|| NOT_REPORTED.to_string(), |c| c.to_string())
}

fn latency(title: &'static str, stats: &LatencyStats) -> Section {
    Section {
        title,
        rows: vec![
            ("Mean (ms)", fmt_f64(stats.mean)),
            ("Median (ms)", fmt_f64(stats.median)),
            ("P99 (ms)", fmt_f64(stats.p99)),
        ],
    }
}

/// Request statistics, throughput, TTFT, TPOT, ITL, in that order
pub fn metric_sections(metrics: &MetricRecord) -> Vec<Section> {
    vec![
        Section {
            title: "Request statistics",
            rows: vec![
                (
                    "Successful requests",
                    fmt_count_pct(metrics.successful_requests, metrics.successful_pct),
                ),
                (
                    "Failed requests",
                    fmt_count_pct(metrics.failed_requests, metrics.failed_pct),
                ),
                ("Total requests", fmt_count(metrics.total_requests)),
                ("Benchmark duration", fmt_unit(metrics.benchmark_duration_s, "s")),
                ("Total input tokens", fmt_count(metrics.total_input_tokens)),
                ("Total generated tokens", fmt_count(metrics.total_generated_tokens)),
            ],
        },
        Section {
            title: "Throughput metrics",
            rows: vec![
                ("Request throughput", fmt_unit(metrics.request_throughput, "req/s")),
                (
                    "Output token throughput",
                    fmt_unit(metrics.output_token_throughput, "tok/s"),
                ),
                (
                    "Output token throughput per concurrency",
                    fmt_unit(metrics.per_concurrency_output_throughput, "tok/s"),
                ),
                (
                    "Total token throughput",
                    fmt_unit(metrics.total_token_throughput, "tok/s"),
                ),
                (
                    "Total token throughput per concurrency",
                    fmt_unit(metrics.per_concurrency_total_throughput, "tok/s"),
                ),
            ],
        },
        latency("Time to first token (TTFT)", &metrics.ttft),
        latency("Time per output token (TPOT, excl. first token)", &metrics.tpot),
        latency("Inter-token latency (ITL)", &metrics.itl),
    ]
}
