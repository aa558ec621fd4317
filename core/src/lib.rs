//! bench-sweep-core: the execution half of a benchmark sweep
//!
//! This crate provides everything needed to turn a declared scenario into a
//! parsed metric record:
//!
//! - Scenario model and parameter clamping
//! - Capability discovery for the external benchmark executable
//! - Argument list construction gated on those capabilities
//! - Scenario execution with tee'd output
//! - Metric extraction from the tool's textual report
//! - Configuration and error handling

#![warn(clippy::all)]

pub mod capability;
pub mod command;
pub mod config;
pub mod error;
pub mod extract;
pub mod runner;
pub mod scenario;

pub use capability::{probe, CapabilityTable};
pub use command::{build, ArgumentList, BaseArgs, BuiltCommand, Program, REQUEST_RATE_FLAG};
pub use config::{load_scenarios, validate_scenarios, ConfigError, SweepConfig};
pub use error::*;
pub use extract::{
    round2, ExtractionTable, LabelRule, LatencyStats, MetricExtractor, MetricField, MetricRecord,
};
pub use runner::{RunResult, ScenarioRunner, NO_EXIT_CODE};
pub use scenario::{ClampWarning, ScenarioSpec};

#[cfg(test)]
mod integration_tests {
    use super::*;

    // =========================================================================
    // Build -> run -> extract on a fake benchmark tool
    // =========================================================================

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_build_run_extract() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake_bench.sh");
        std::fs::write(
            &script,
            r#"case "$1" in
  --help) echo "--max-concurrency N --num-prompts N --request-rate R"; exit 0;;
esac
echo "Successful requests: 20 (100.00%)"
echo "Output token throughput: 400.0"
"#,
        )
        .unwrap();

        let program = Program::new("sh").with_leading_args([script.display().to_string()]);
        let caps = probe(&program, &["--help"]).await.unwrap();
        let base = BaseArgs::new(program, "http://127.0.0.1:8000", "test");

        let spec = ScenarioSpec::new(50, 1024, 4, 20);
        let built = build(&spec, &caps, &base);
        assert!(!built.arguments.contains_flag("--model"));
        assert_eq!(built.arguments.value_of("--max-concurrency"), Some("4"));

        let log = dir.path().join("scenario_01.log");
        let result = ScenarioRunner::new()
            .run(&built.effective, &built.arguments, &log)
            .await;
        assert_eq!(result.exit_code, 0);

        let record = MetricExtractor::default()
            .extract_file(&result.raw_output_path, result.spec.concurrency)
            .unwrap();
        assert_eq!(record.successful_requests, Some(20));
        assert_eq!(record.successful_pct, Some(100.0));
        assert_eq!(record.output_token_throughput, Some(400.0));
        assert_eq!(record.per_concurrency_output_throughput, Some(100.0));
    }
}
