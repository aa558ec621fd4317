//! Sweep configuration types

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::{BaseArgs, Program};
use crate::error::Result;
use crate::scenario::ScenarioSpec;

/// Sweep configuration
///
/// Defines what to run against, where artifacts go, and how scenarios are
/// paced. The scenario list itself is supplied separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Arguments shared by every scenario invocation
    pub base: BaseArgs,

    /// Arguments used for capability discovery
    pub help_args: Vec<String>,

    /// Directory under which the timestamped run directory is created
    pub output_root: PathBuf,

    /// Pause between scenarios so the server under test settles
    pub cooldown: Duration,

    /// Kill a scenario after this long; `None` waits indefinitely
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario_timeout: Option<Duration>,

    /// Mirror benchmark output to the console
    pub echo_output: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            base: BaseArgs::new(
                Program::new("python3").with_leading_args(["benchmark_serving.py"]),
                "http://127.0.0.1:8000",
                "test",
            ),
            help_args: vec!["--help".to_string()],
            output_root: PathBuf::from("."),
            cooldown: Duration::from_secs(10),
            scenario_timeout: None,
            echo_output: true,
        }
    }
}

impl SweepConfig {
    /// Create a config around the given base arguments
    pub fn new(base: BaseArgs) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }

    /// Set the output root
    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    /// Set the inter-scenario cooldown
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Set the per-scenario timeout
    pub fn with_scenario_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.scenario_timeout = timeout;
        self
    }

    /// Enable or disable console echo of benchmark output
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo_output = echo;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.base.program.executable.trim().is_empty() {
            return Err(ConfigError::MissingExecutable);
        }

        if self.base.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidBaseUrl("base URL is empty".into()));
        }

        if self.base.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel("model name is empty".into()));
        }

        if let Some(timeout) = self.scenario_timeout {
            if timeout.is_zero() {
                return Err(ConfigError::InvalidTimeout(
                    "scenario timeout must be positive".into(),
                ));
            }
        }

        Ok(())
    }
}

/// Validate a scenario list before the sweep starts
pub fn validate_scenarios(scenarios: &[ScenarioSpec]) -> std::result::Result<(), ConfigError> {
    if scenarios.is_empty() {
        return Err(ConfigError::NoScenarios);
    }
    for (idx, spec) in scenarios.iter().enumerate() {
        if spec.concurrency == 0 {
            return Err(ConfigError::InvalidScenario(
                idx + 1,
                "concurrency must be at least 1".into(),
            ));
        }
        if spec.num_prompts == 0 {
            return Err(ConfigError::InvalidScenario(
                idx + 1,
                "num_prompts must be at least 1".into(),
            ));
        }
    }
    Ok(())
}

/// Load scenarios from JSON: a bare array or `{"scenarios": [...]}`
pub fn load_scenarios(path: &Path) -> Result<Vec<ScenarioSpec>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Shape {
        Wrapped { scenarios: Vec<ScenarioSpec> },
        Bare(Vec<ScenarioSpec>),
    }

    let text = std::fs::read_to_string(path)?;
    let scenarios = match serde_json::from_str::<Shape>(&text)? {
        Shape::Wrapped { scenarios } => scenarios,
        Shape::Bare(scenarios) => scenarios,
    };
    tracing::info!(path = %path.display(), count = scenarios.len(), "Loaded scenarios");
    Ok(scenarios)
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No benchmark executable configured
    #[error("benchmark executable is not set")]
    MissingExecutable,

    /// Invalid base URL
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// Invalid model name
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Invalid timeout
    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    /// Empty scenario list
    #[error("no scenarios to run")]
    NoScenarios,

    /// A scenario that cannot be run
    #[error("Invalid scenario #{0}: {1}")]
    InvalidScenario(usize, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SweepConfig::default();
        assert_eq!(config.base.program.executable, "python3");
        assert_eq!(config.base.request_rate, "inf");
        assert_eq!(config.help_args, vec!["--help"]);
        assert_eq!(config.cooldown, Duration::from_secs(10));
        assert!(config.scenario_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder_pattern() {
        let config = SweepConfig::default()
            .with_output_root("/tmp/runs")
            .with_cooldown(Duration::ZERO)
            .with_scenario_timeout(Some(Duration::from_secs(600)))
            .with_echo(false);

        assert_eq!(config.output_root, PathBuf::from("/tmp/runs"));
        assert!(config.cooldown.is_zero());
        assert_eq!(config.scenario_timeout, Some(Duration::from_secs(600)));
        assert!(!config.echo_output);
    }

    #[test]
    fn test_config_validation_empty_model() {
        let mut config = SweepConfig::default();
        config.base.model = " ".into();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidModel(_))));
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let config = SweepConfig::default().with_scenario_timeout(Some(Duration::ZERO));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_scenarios() {
        assert!(matches!(validate_scenarios(&[]), Err(ConfigError::NoScenarios)));
        assert!(validate_scenarios(&ScenarioSpec::default_sweep()).is_ok());

        let bad = vec![ScenarioSpec::default(), ScenarioSpec::new(50, 50, 0, 10)];
        match validate_scenarios(&bad) {
            Err(ConfigError::InvalidScenario(idx, _)) => assert_eq!(idx, 2),
            other => panic!("expected invalid scenario, got {other:?}"),
        }
    }

    #[test]
    fn test_load_scenarios_both_shapes() {
        let dir = tempfile::tempdir().unwrap();

        let bare = dir.path().join("bare.json");
        std::fs::write(&bare, r#"[{"input_length": 64}, {"concurrency": 8}]"#).unwrap();
        let scenarios = load_scenarios(&bare).unwrap();
        assert_eq!(scenarios.len(), 2);
        assert_eq!(scenarios[0].input_length, 64);
        assert_eq!(scenarios[1].concurrency, 8);

        let wrapped = dir.path().join("wrapped.json");
        std::fs::write(
            &wrapped,
            r#"{"scenarios": [{"name": "long", "input_length": 4096, "prefix_length": 128}]}"#,
        )
        .unwrap();
        let scenarios = load_scenarios(&wrapped).unwrap();
        assert_eq!(scenarios[0].name.as_deref(), Some("long"));
        assert_eq!(scenarios[0].prefix_length, 128);
    }

    #[test]
    fn test_load_scenarios_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(load_scenarios(&path).is_err());
    }
}
