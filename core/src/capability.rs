//! Capability discovery for the external benchmark executable
//!
//! The tool's help text is read once at startup; every long option it
//! mentions becomes a supported capability for the rest of the run.

use std::collections::BTreeSet;
use std::process::Stdio;
use std::sync::OnceLock;

use regex::Regex;
use tokio::process::Command;

use crate::command::Program;
use crate::error::{Error, Result};

fn long_option_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"--([A-Za-z0-9][A-Za-z0-9_-]*)").expect("long option pattern is valid")
    })
}

/// Set of long options the benchmark executable declares
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityTable {
    options: BTreeSet<String>,
}

impl CapabilityTable {
    /// Extract every `--name` token from help text
    pub fn from_help_text(text: &str) -> Self {
        let options = long_option_regex()
            .captures_iter(text)
            .map(|caps| caps[1].to_string())
            .collect();
        Self { options }
    }

    /// Whether the option is declared; accepts `name` or `--name`
    pub fn supports(&self, option: &str) -> bool {
        self.options.contains(option.trim_start_matches('-'))
    }

    /// Number of declared options
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Whether no options were found
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Iterate over option names (without leading dashes)
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for CapabilityTable {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            options: iter
                .into_iter()
                .map(|s| s.into().trim_start_matches('-').to_string())
                .collect(),
        }
    }
}

/// Invoke `program <help_args>` once and build the capability table
///
/// Failing to start the tool, or getting back no options at all, is fatal:
/// no scenario can be built without knowing which arguments are legal.
pub async fn probe(program: &Program, help_args: &[&str]) -> Result<CapabilityTable> {
    let rendered = format!("{} {}", program.display(), help_args.join(" "));
    tracing::debug!(command = %rendered, "Probing benchmark capabilities");

    let output = Command::new(&program.executable)
        .args(&program.leading_args)
        .args(help_args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| Error::probe(&rendered, e.to_string()))?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    let table = CapabilityTable::from_help_text(&text);
    if table.is_empty() {
        return Err(Error::probe(
            &rendered,
            format!(
                "no long options found in help output (exit status {})",
                output.status
            ),
        ));
    }

    if !output.status.success() {
        tracing::warn!(
            status = %output.status,
            options = table.len(),
            "Help command exited unsuccessfully, using the options it printed"
        );
    }

    tracing::info!(options = table.len(), "Capability table ready");
    Ok(table)
}
