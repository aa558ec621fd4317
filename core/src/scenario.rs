//! Scenario definitions and parameter clamping

use serde::{Deserialize, Serialize};
use std::fmt;

/// One fixed combination of sweep parameters, executed as a single run
///
/// Values are stored as declared. [`ScenarioSpec::clamped`] produces the
/// effective scenario that is actually handed to the benchmark tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioSpec {
    /// Optional display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Random input length in tokens
    pub input_length: u32,
    /// Random output length in tokens
    pub output_length: u32,
    /// Maximum number of in-flight requests
    pub concurrency: u32,
    /// Number of prompts to send
    pub num_prompts: u32,
    /// Sampling range ratio for input/output lengths, at most 1.0
    pub range_ratio: f64,
    /// Fixed prefix tokens before the random context, at most `input_length`
    pub prefix_length: u32,
    /// Request arrival burstiness factor
    pub burstiness: f64,
}

impl Default for ScenarioSpec {
    fn default() -> Self {
        Self {
            name: None,
            input_length: 50,
            output_length: 1024,
            concurrency: 4,
            num_prompts: 20,
            range_ratio: 1.0,
            prefix_length: 0,
            burstiness: 1.0,
        }
    }
}

/// A clamp that fired while deriving the effective scenario
#[derive(Debug, Clone, PartialEq)]
pub enum ClampWarning {
    /// Range ratio was outside `[0.0, 1.0]`
    RangeRatio {
        /// Declared value
        requested: f64,
        /// Value used instead
        applied: f64,
    },
    /// Prefix length exceeded the input length
    PrefixLength {
        /// Declared value
        requested: u32,
        /// Value used instead (the input length)
        applied: u32,
    },
}

impl fmt::Display for ClampWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RangeRatio { requested, applied } => {
                write!(f, "range ratio {requested} clamped to {applied}")
            }
            Self::PrefixLength { requested, applied } => write!(
                f,
                "prefix length {requested} exceeds input length, clamped to {applied}"
            ),
        }
    }
}

impl ScenarioSpec {
    /// Create a scenario from the four primary sweep dimensions
    pub fn new(input_length: u32, output_length: u32, concurrency: u32, num_prompts: u32) -> Self {
        Self {
            input_length,
            output_length,
            concurrency,
            num_prompts,
            ..Default::default()
        }
    }

    /// Set the range ratio
    pub fn with_range_ratio(mut self, range_ratio: f64) -> Self {
        self.range_ratio = range_ratio;
        self
    }

    /// Set the prefix length
    pub fn with_prefix_length(mut self, prefix_length: u32) -> Self {
        self.prefix_length = prefix_length;
        self
    }

    /// Set the burstiness factor
    pub fn with_burstiness(mut self, burstiness: f64) -> Self {
        self.burstiness = burstiness;
        self
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Return the effective scenario together with every clamp that fired
    pub fn clamped(&self) -> (ScenarioSpec, Vec<ClampWarning>) {
        let mut effective = self.clone();
        let mut warnings = Vec::new();

        // NaN compares false on both sides and is treated as the upper bound.
        let ratio = if self.range_ratio.is_nan() || self.range_ratio > 1.0 {
            1.0
        } else if self.range_ratio < 0.0 {
            0.0
        } else {
            self.range_ratio
        };
        if ratio != self.range_ratio {
            warnings.push(ClampWarning::RangeRatio {
                requested: self.range_ratio,
                applied: ratio,
            });
            effective.range_ratio = ratio;
        }

        if self.prefix_length > self.input_length {
            warnings.push(ClampWarning::PrefixLength {
                requested: self.prefix_length,
                applied: self.input_length,
            });
            effective.prefix_length = self.input_length;
        }

        (effective, warnings)
    }

    /// Short one-line label used in logs, subjects and report headings
    pub fn label(&self) -> String {
        let core = format!(
            "input={} output={} concurrency={} prompts={} range_ratio={} prefix={}",
            self.input_length,
            self.output_length,
            self.concurrency,
            self.num_prompts,
            self.range_ratio,
            self.prefix_length
        );
        match &self.name {
            Some(name) => format!("{name} ({core})"),
            None => core,
        }
    }

    /// The sweep used when no scenario file is given
    pub fn default_sweep() -> Vec<ScenarioSpec> {
        vec![
            ScenarioSpec::new(50, 1024, 4, 20),
            ScenarioSpec::new(50, 1024, 8, 40),
            ScenarioSpec::new(50, 1024, 16, 80),
            ScenarioSpec::new(512, 512, 4, 20),
            ScenarioSpec::new(512, 512, 16, 80),
            ScenarioSpec::new(2048, 256, 4, 20),
            ScenarioSpec::new(2048, 256, 16, 80),
        ]
    }
}
