//! Argument list construction for the external benchmark tool

use serde::{Deserialize, Serialize};

use crate::capability::CapabilityTable;
use crate::scenario::{ClampWarning, ScenarioSpec};

/// The flag that is emitted for every scenario, declared or not
pub const REQUEST_RATE_FLAG: &str = "--request-rate";

/// An executable plus the arguments that always precede the built ones
///
/// For a Python benchmark script this is `python3` with the script path as
/// its leading argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Executable name or path
    pub executable: String,
    /// Arguments placed before every generated argument list
    pub leading_args: Vec<String>,
}

impl Program {
    /// Create a program with no leading arguments
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            leading_args: Vec::new(),
        }
    }

    /// Set the leading arguments
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Render as a shell-like command line for logs
    pub fn display(&self) -> String {
        std::iter::once(self.executable.as_str())
            .chain(self.leading_args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Settings shared by every scenario's invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseArgs {
    /// Program to run
    pub program: Program,
    /// Backend name passed as `--backend`
    pub backend: String,
    /// Server base URL passed as `--base-url`
    pub base_url: String,
    /// Model name passed as `--model`
    pub model: String,
    /// Tokenizer path passed as `--tokenizer`
    pub tokenizer: Option<String>,
    /// Dataset name passed as `--dataset-name`
    pub dataset_name: String,
    /// Value for `--request-rate`
    pub request_rate: String,
    /// Whether to pass `--profile`
    pub profile: bool,
}

impl BaseArgs {
    /// Create base arguments with the usual defaults
    pub fn new(program: Program, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            program,
            backend: "openai".to_string(),
            base_url: base_url.into(),
            model: model.into(),
            tokenizer: None,
            dataset_name: "random".to_string(),
            request_rate: "inf".to_string(),
            profile: false,
        }
    }
}

/// A fully built invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentList {
    /// Executable to spawn
    pub executable: String,
    /// Every argument after the executable, leading args included
    pub args: Vec<String>,
    /// Extra environment for the child process
    pub env: Vec<(String, String)>,
}

impl ArgumentList {
    /// Render as a single command line for logs
    pub fn display(&self) -> String {
        std::iter::once(self.executable.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whether the flag appears in the argument list
    pub fn contains_flag(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    /// Value following the flag, if present
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

/// Output of [`build`]
#[derive(Debug, Clone)]
pub struct BuiltCommand {
    /// The invocation
    pub arguments: ArgumentList,
    /// The scenario after clamping
    pub effective: ScenarioSpec,
    /// Clamps that fired
    pub warnings: Vec<ClampWarning>,
}

/// Build the argument list for one scenario
///
/// Every flag is appended only when the capability table declares it, with
/// the single exception of `--request-rate`, which is always emitted.
/// Output order is fixed.
pub fn build(spec: &ScenarioSpec, capabilities: &CapabilityTable, base: &BaseArgs) -> BuiltCommand {
    let (effective, warnings) = spec.clamped();
    for warning in &warnings {
        tracing::warn!(scenario = %spec.label(), "{}", warning);
    }

    let mut args = base.program.leading_args.clone();
    let mut push = |flag: &str, value: Option<String>| {
        if !capabilities.supports(flag) {
            tracing::debug!(flag, "Skipping option not declared by the benchmark tool");
            return;
        }
        args.push(flag.to_string());
        if let Some(value) = value {
            args.push(value);
        }
    };

    push("--backend", Some(base.backend.clone()));
    push("--base-url", Some(base.base_url.clone()));
    push("--model", Some(base.model.clone()));
    if let Some(tokenizer) = &base.tokenizer {
        push("--tokenizer", Some(tokenizer.clone()));
    }
    push("--dataset-name", Some(base.dataset_name.clone()));
    push("--random-input-len", Some(effective.input_length.to_string()));
    push("--random-output-len", Some(effective.output_length.to_string()));
    push("--max-concurrency", Some(effective.concurrency.to_string()));
    push("--num-prompts", Some(effective.num_prompts.to_string()));
    push("--random-range-ratio", Some(effective.range_ratio.to_string()));
    push("--random-prefix-len", Some(effective.prefix_length.to_string()));
    push("--burstiness", Some(effective.burstiness.to_string()));

    args.push(REQUEST_RATE_FLAG.to_string());
    args.push(base.request_rate.clone());

    if base.profile && capabilities.supports("--profile") {
        args.push("--profile".to_string());
    }

    BuiltCommand {
        arguments: ArgumentList {
            executable: base.program.executable.clone(),
            args,
            env: Vec::new(),
        },
        effective,
        warnings,
    }
}
