//! Metric extraction from the benchmark tool's free-form output
//!
//! A table of `{field, label, token}` rules drives a single line scanner:
//! the first line containing `label` is located, the text after the first
//! `:` that follows the label is split on whitespace, and token number
//! `token` is parsed as a number. Every field is independently optional.
//!
//! The table can be loaded from JSON so that changes in the tool's output
//! phrasing only need a new table.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Every value the extractor knows how to look for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    /// Successful request count
    SuccessfulRequests,
    /// Successful request percentage
    SuccessfulPct,
    /// Failed request count
    FailedRequests,
    /// Failed request percentage
    FailedPct,
    /// Total request count
    TotalRequests,
    /// Benchmark wall time in seconds, as reported by the tool
    BenchmarkDuration,
    /// Total prompt tokens sent
    TotalInputTokens,
    /// Total tokens generated
    TotalGeneratedTokens,
    /// Requests per second
    RequestThroughput,
    /// Output tokens per second
    OutputTokenThroughput,
    /// Input + output tokens per second
    TotalTokenThroughput,
    /// Mean time to first token (ms)
    TtftMean,
    /// Median time to first token (ms)
    TtftMedian,
    /// P99 time to first token (ms)
    TtftP99,
    /// Mean time per output token (ms)
    TpotMean,
    /// Median time per output token (ms)
    TpotMedian,
    /// P99 time per output token (ms)
    TpotP99,
    /// Mean inter-token latency (ms)
    ItlMean,
    /// Median inter-token latency (ms)
    ItlMedian,
    /// P99 inter-token latency (ms)
    ItlP99,
}

/// How to find one field in the output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRule {
    /// Field this rule fills
    pub field: MetricField,
    /// Exact text that identifies the line
    pub label: String,
    /// Index of the whitespace-separated token after the colon
    #[serde(default)]
    pub token: usize,
}

impl LabelRule {
    fn new(field: MetricField, label: &str, token: usize) -> Self {
        Self {
            field,
            label: label.to_string(),
            token,
        }
    }
}

/// Ordered set of extraction rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionTable {
    /// Rules, applied independently
    pub rules: Vec<LabelRule>,
}

impl Default for ExtractionTable {
    fn default() -> Self {
        use MetricField::*;
        Self {
            rules: vec![
                LabelRule::new(SuccessfulRequests, "Successful requests", 0),
                LabelRule::new(SuccessfulPct, "Successful requests", 1),
                LabelRule::new(FailedRequests, "Failed requests", 0),
                LabelRule::new(FailedPct, "Failed requests", 1),
                LabelRule::new(TotalRequests, "Total requests", 0),
                LabelRule::new(BenchmarkDuration, "Benchmark duration", 0),
                LabelRule::new(TotalInputTokens, "Total input tokens", 0),
                LabelRule::new(TotalGeneratedTokens, "Total generated tokens", 0),
                LabelRule::new(RequestThroughput, "Request throughput", 0),
                LabelRule::new(OutputTokenThroughput, "Output token throughput", 0),
                LabelRule::new(TotalTokenThroughput, "Total Token throughput", 0),
                LabelRule::new(TtftMean, "Mean TTFT", 0),
                LabelRule::new(TtftMedian, "Median TTFT", 0),
                LabelRule::new(TtftP99, "P99 TTFT", 0),
                LabelRule::new(TpotMean, "Mean TPOT", 0),
                LabelRule::new(TpotMedian, "Median TPOT", 0),
                LabelRule::new(TpotP99, "P99 TPOT", 0),
                LabelRule::new(ItlMean, "Mean ITL", 0),
                LabelRule::new(ItlMedian, "Median ITL", 0),
                LabelRule::new(ItlP99, "P99 ITL", 0),
            ],
        }
    }
}

impl ExtractionTable {
    /// Load a table from a JSON file: either `{"rules": [...]}` or a bare array
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse a table from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            Table(ExtractionTable),
            Rules(Vec<LabelRule>),
        }
        Ok(match serde_json::from_str::<Shape>(text)? {
            Shape::Table(table) => table,
            Shape::Rules(rules) => Self { rules },
        })
    }
}

/// Mean / median / p99 of one latency distribution, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    /// Mean
    pub mean: Option<f64>,
    /// Median
    pub median: Option<f64>,
    /// 99th percentile
    pub p99: Option<f64>,
}

/// Parsed metrics of one scenario; `None` means "not reported"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Requests that completed
    pub successful_requests: Option<u64>,
    /// Completed share of all requests, in percent
    pub successful_pct: Option<f64>,
    /// Requests that errored
    pub failed_requests: Option<u64>,
    /// Errored share of all requests, in percent
    pub failed_pct: Option<f64>,
    /// Requests sent
    pub total_requests: Option<u64>,
    /// Wall time reported by the tool, in seconds
    pub benchmark_duration_s: Option<f64>,
    /// Prompt tokens sent
    pub total_input_tokens: Option<u64>,
    /// Tokens generated by the server
    pub total_generated_tokens: Option<u64>,
    /// Requests per second
    pub request_throughput: Option<f64>,
    /// Generated tokens per second
    pub output_token_throughput: Option<f64>,
    /// Prompt plus generated tokens per second
    pub total_token_throughput: Option<f64>,
    /// `output_token_throughput / configured concurrency`
    pub per_concurrency_output_throughput: Option<f64>,
    /// `total_token_throughput / configured concurrency`
    pub per_concurrency_total_throughput: Option<f64>,
    /// Time to first token, ms
    pub ttft: LatencyStats,
    /// Time per output token, ms
    pub tpot: LatencyStats,
    /// Inter-token latency, ms
    pub itl: LatencyStats,
}

/// Round to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Line-scanning extractor driven by an [`ExtractionTable`]
#[derive(Debug, Clone, Default)]
pub struct MetricExtractor {
    table: ExtractionTable,
}

impl MetricExtractor {
    /// Create an extractor over the given table
    pub fn new(table: ExtractionTable) -> Self {
        Self { table }
    }

    /// The table in use
    pub fn table(&self) -> &ExtractionTable {
        &self.table
    }

    /// Read a raw output artifact and extract its metrics
    pub fn extract_file(&self, path: &Path, concurrency: u32) -> Result<MetricRecord> {
        let bytes = std::fs::read(path)?;
        Ok(self.extract(&String::from_utf8_lossy(&bytes), concurrency))
    }

    /// Extract metrics from output text
    ///
    /// `concurrency` is the scenario's configured level; per-concurrency
    /// throughput is always divided by it.
    pub fn extract(&self, text: &str, concurrency: u32) -> MetricRecord {
        let mut found: BTreeMap<MetricField, f64> = BTreeMap::new();
        for rule in &self.table.rules {
            if found.contains_key(&rule.field) {
                continue;
            }
            match scan(text, rule) {
                Some(value) => {
                    found.insert(rule.field, value);
                }
                None => tracing::debug!(field = ?rule.field, label = %rule.label, "Metric not reported"),
            }
        }

        let get = |field: MetricField| found.get(&field).copied();
        let count = |field: MetricField| get(field).and_then(as_count);

        let successful_requests = count(MetricField::SuccessfulRequests);
        let failed_requests = count(MetricField::FailedRequests);
        let total_requests = count(MetricField::TotalRequests);

        let output_token_throughput = get(MetricField::OutputTokenThroughput);
        let total_token_throughput = get(MetricField::TotalTokenThroughput);
        let per_concurrency = |value: Option<f64>| {
            value
                .filter(|_| concurrency > 0)
                .map(|v| round2(v / f64::from(concurrency)))
        };

        MetricRecord {
            successful_requests,
            successful_pct: percentage(
                get(MetricField::SuccessfulPct),
                successful_requests,
                total_requests,
            ),
            failed_requests,
            failed_pct: percentage(get(MetricField::FailedPct), failed_requests, total_requests),
            total_requests,
            benchmark_duration_s: get(MetricField::BenchmarkDuration),
            total_input_tokens: count(MetricField::TotalInputTokens),
            total_generated_tokens: count(MetricField::TotalGeneratedTokens),
            request_throughput: get(MetricField::RequestThroughput),
            output_token_throughput,
            total_token_throughput,
            per_concurrency_output_throughput: per_concurrency(output_token_throughput),
            per_concurrency_total_throughput: per_concurrency(total_token_throughput),
            ttft: LatencyStats {
                mean: get(MetricField::TtftMean),
                median: get(MetricField::TtftMedian),
                p99: get(MetricField::TtftP99),
            },
            tpot: LatencyStats {
                mean: get(MetricField::TpotMean),
                median: get(MetricField::TpotMedian),
                p99: get(MetricField::TpotP99),
            },
            itl: LatencyStats {
                mean: get(MetricField::ItlMean),
                median: get(MetricField::ItlMedian),
                p99: get(MetricField::ItlP99),
            },
        }
    }
}

fn scan(text: &str, rule: &LabelRule) -> Option<f64> {
    let line = text.lines().find(|line| line.contains(&rule.label))?;
    let after_label = &line[line.find(&rule.label)? + rule.label.len()..];
    let after_colon = &after_label[after_label.find(':')? + 1..];
    let token = after_colon.split_whitespace().nth(rule.token)?;
    let cleaned = token.trim_matches(|c: char| matches!(c, '(' | ')' | '%' | ','));
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn as_count(value: f64) -> Option<u64> {
    (value >= 0.0 && value.fract() == 0.0).then_some(value as u64)
}

/// Reported percentage, or one recomputed from count and total
///
/// A missing total (or a total of zero) falls back to `0.00`.
fn percentage(reported: Option<f64>, count: Option<u64>, total: Option<u64>) -> Option<f64> {
    if let Some(pct) = reported.filter(|p| (0.0..=100.0).contains(p)) {
        return Some(round2(pct));
    }
    match (count, total) {
        (_, None) | (_, Some(0)) => Some(0.0),
        (Some(count), Some(total)) => Some(round2(count as f64 / total as f64 * 100.0)),
        (None, Some(_)) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VLLM_OUTPUT: &str = "\
============ Serving Benchmark Result ============
Successful requests:                     20 (100.00%)
Failed requests:                         0 (0.00%)
Total requests:                          20
Benchmark duration (s):                  12.48
Total input tokens:                      1000
Total generated tokens:                  20480
Request throughput (req/s):              1.60
Output token throughput (tok/s):         1640.00
Total Token throughput (tok/s):          1720.40
---------------Time to First Token----------------
Mean TTFT (ms):                          45.21
Median TTFT (ms):                        41.00
P99 TTFT (ms):                           88.73
-----Time per Output Token (excl. 1st token)------
Mean TPOT (ms):                          9.71
Median TPOT (ms):                        9.70
P99 TPOT (ms):                           9.95
---------------Inter-token Latency----------------
Mean ITL (ms):                           9.71
Median ITL (ms):                         9.66
P99 ITL (ms):                            11.20
==================================================
";

    #[test]
    fn test_full_output() {
        let record = MetricExtractor::default().extract(VLLM_OUTPUT, 4);

        assert_eq!(record.successful_requests, Some(20));
        assert_eq!(record.successful_pct, Some(100.0));
        assert_eq!(record.failed_requests, Some(0));
        assert_eq!(record.failed_pct, Some(0.0));
        assert_eq!(record.total_requests, Some(20));
        assert_eq!(record.benchmark_duration_s, Some(12.48));
        assert_eq!(record.total_input_tokens, Some(1000));
        assert_eq!(record.total_generated_tokens, Some(20480));
        assert_eq!(record.request_throughput, Some(1.60));
        assert_eq!(record.output_token_throughput, Some(1640.0));
        assert_eq!(record.total_token_throughput, Some(1720.4));
        assert_eq!(record.per_concurrency_output_throughput, Some(410.0));
        assert_eq!(record.per_concurrency_total_throughput, Some(430.1));
        assert_eq!(record.ttft.mean, Some(45.21));
        assert_eq!(record.ttft.p99, Some(88.73));
        assert_eq!(record.tpot.median, Some(9.70));
        assert_eq!(record.itl.p99, Some(11.20));
    }

    #[test]
    fn test_minimal_scenario_output() {
        let text = "Successful requests: 20 (100.00%)\nOutput token throughput: 400.0\n";
        let record = MetricExtractor::default().extract(text, 4);

        assert_eq!(record.successful_requests, Some(20));
        assert_eq!(record.successful_pct, Some(100.0));
        assert_eq!(record.output_token_throughput, Some(400.0));
        assert_eq!(record.per_concurrency_output_throughput, Some(100.0));
        // absent lines stay absent
        assert_eq!(record.total_token_throughput, None);
        assert_eq!(record.per_concurrency_total_throughput, None);
        assert_eq!(record.request_throughput, None);
        assert_eq!(record.ttft, LatencyStats::default());
    }

    #[test]
    fn test_missing_percentage_recomputed_from_total() {
        let text = "Successful requests: 15\nFailed requests: 5 (n/a)\nTotal requests: 20\n";
        let record = MetricExtractor::default().extract(text, 1);
        assert_eq!(record.successful_pct, Some(75.0));
        assert_eq!(record.failed_pct, Some(25.0));
    }

    #[test]
    fn test_recomputed_percentage_rounds_to_two_decimals() {
        let text = "Successful requests: 2\nTotal requests: 3\n";
        let record = MetricExtractor::default().extract(text, 1);
        assert_eq!(record.successful_pct, Some(66.67));
    }

    #[test]
    fn test_percentage_falls_back_to_zero_without_total() {
        let record = MetricExtractor::default().extract("Successful requests: 20\n", 1);
        assert_eq!(record.successful_requests, Some(20));
        assert_eq!(record.successful_pct, Some(0.0));

        let record = MetricExtractor::default()
            .extract("Successful requests: 0\nTotal requests: 0\n", 1);
        assert_eq!(record.successful_pct, Some(0.0));
    }

    #[test]
    fn test_empty_output_reports_nothing_numeric() {
        let record = MetricExtractor::default().extract("Traceback (most recent call last):\n", 8);
        assert_eq!(record.successful_requests, None);
        assert_eq!(record.output_token_throughput, None);
        assert_eq!(record.per_concurrency_output_throughput, None);
        assert_eq!(record.ttft, LatencyStats::default());
    }

    #[test]
    fn test_malformed_value_is_absent() {
        let record = MetricExtractor::default().extract("Mean TTFT (ms): nan-ish\n", 1);
        assert_eq!(record.ttft.mean, None);
    }

    #[test]
    fn test_first_matching_line_wins() {
        let text = "Request throughput (req/s): 2.0\nRequest throughput (req/s): 9.0\n";
        let record = MetricExtractor::default().extract(text, 1);
        assert_eq!(record.request_throughput, Some(2.0));
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario_01.log");
        std::fs::write(&path, VLLM_OUTPUT).unwrap();

        let extractor = MetricExtractor::default();
        let first = extractor.extract_file(&path, 4).unwrap();
        let second = extractor.extract_file(&path, 4).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_table_from_json() {
        let json = r#"[
            {"field": "output_token_throughput", "label": "Output tok/s"},
            {"field": "ttft_mean", "label": "TTFT avg", "token": 1}
        ]"#;
        let table = ExtractionTable::from_json(json).unwrap();
        let text = "Output tok/s: 120.5\nTTFT avg: ms 33.3\n";
        let record = MetricExtractor::new(table).extract(text, 2);

        assert_eq!(record.output_token_throughput, Some(120.5));
        assert_eq!(record.per_concurrency_output_throughput, Some(60.25));
        assert_eq!(record.ttft.mean, Some(33.3));
    }

    #[test]
    fn test_table_object_shape() {
        let json = serde_json::to_string(&ExtractionTable::default()).unwrap();
        assert_eq!(
            ExtractionTable::from_json(&json).unwrap(),
            ExtractionTable::default()
        );
    }
}
