//! CLI argument parsing and command handling

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};

use bench_sweep_core::{
    load_scenarios, BaseArgs, ExtractionTable, MetricExtractor, Program, ScenarioSpec, SweepConfig,
};
use bench_sweep_notify::{NotifyConfig, DEFAULT_SMTP_PORT, DEFAULT_SMTP_SERVER};

use crate::keys::{ApiKeyStore, DEFAULT_KEY_STORE};
use crate::orchestrator::{OrchestratorBuilder, SweepOutcome};
use crate::sysinfo::SystemInventory;

/// bench-sweep - runs a sweep of load-test scenarios against an inference
/// server and reports the results
#[derive(Parser, Debug)]
#[command(name = "bench-sweep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the server under test
    #[arg(short = 'u', long = "url", default_value = "http://127.0.0.1:8000")]
    pub base_url: String,

    /// Model name passed to the benchmark tool
    #[arg(short, long, default_value = "test")]
    pub model: String,

    /// Tokenizer passed to the benchmark tool
    #[arg(short, long)]
    pub tokenizer: Option<String>,

    /// Backend name; also selects the stored API key
    #[arg(short, long, default_value = "openai")]
    pub backend: String,

    /// Executable that runs the benchmark tool
    #[arg(long, default_value = "python3")]
    pub bench_exe: String,

    /// Argument placed before the generated options (repeatable)
    #[arg(
        long = "bench-arg",
        default_value = "benchmark_serving.py",
        allow_hyphen_values = true
    )]
    pub bench_args: Vec<String>,

    /// JSON file with the scenario list (built-in sweep otherwise)
    #[arg(long)]
    pub scenarios: Option<PathBuf>,

    /// JSON file with metric label rules (built-in table otherwise)
    #[arg(long)]
    pub metric_labels: Option<PathBuf>,

    /// Dataset name passed to the benchmark tool
    #[arg(long, default_value = "random")]
    pub dataset_name: String,

    /// Request rate passed to the benchmark tool
    #[arg(long, default_value = "inf")]
    pub request_rate: String,

    /// Ask the benchmark tool to profile, if it supports it
    #[arg(long)]
    pub profile: bool,

    /// Pause between scenarios, in seconds
    #[arg(long, default_value_t = 10)]
    pub cooldown_secs: u64,

    /// Kill a scenario after this many seconds
    #[arg(long)]
    pub scenario_timeout_secs: Option<u64>,

    /// Directory under which the run directory is created
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Do not mirror benchmark output to the console
    #[arg(long)]
    pub no_echo: bool,

    /// Skip host inventory collection
    #[arg(long)]
    pub no_system_info: bool,

    /// Sender address (also the SMTP login)
    #[arg(short = 'f', long, env = "BENCH_SWEEP_EMAIL_FROM")]
    pub email_from: Option<String>,

    /// Comma-separated recipient addresses
    #[arg(short = 'e', long, env = "BENCH_SWEEP_EMAIL_TO")]
    pub email_to: Option<String>,

    /// File holding the SMTP password
    #[arg(long, default_value = "config/email_password.txt")]
    pub credential_file: PathBuf,

    /// SMTP server
    #[arg(long, default_value = DEFAULT_SMTP_SERVER)]
    pub smtp_server: String,

    /// SMTP port
    #[arg(long, default_value_t = DEFAULT_SMTP_PORT)]
    pub smtp_port: u16,

    /// Text prepended to every email body
    #[arg(long)]
    pub email_preface: Option<String>,

    /// Email after every scenario (default)
    #[arg(long, overrides_with = "no_send_each")]
    pub send_each: bool,

    /// Do not email after each scenario
    #[arg(long, overrides_with = "send_each")]
    pub no_send_each: bool,

    /// Email once the sweep finishes (default)
    #[arg(long, overrides_with = "no_send_final")]
    pub send_final: bool,

    /// Do not email when the sweep finishes
    #[arg(long, overrides_with = "send_final")]
    pub no_send_final: bool,

    /// Store an API key and exit
    #[arg(long, num_args = 2, value_names = ["SERVICE", "KEY"])]
    pub add_key: Option<Vec<String>>,

    /// List stored API keys (masked) and exit
    #[arg(long)]
    pub list_keys: bool,

    /// Delete a stored API key and exit
    #[arg(long, value_name = "SERVICE")]
    pub delete_key: Option<String>,

    /// API key store location
    #[arg(long, default_value = DEFAULT_KEY_STORE)]
    pub key_store: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Drop long options the CLI does not declare, with their values
///
/// Returns the kept arguments and the dropped options. Everything after a
/// bare `--` is kept as is.
pub fn filter_unknown_flags<I>(args: I, known: &HashSet<String>) -> (Vec<OsString>, Vec<String>)
where
    I: IntoIterator<Item = OsString>,
{
    let mut kept = Vec::new();
    let mut dropped = Vec::new();
    let mut iter = args.into_iter().peekable();

    if let Some(program) = iter.next() {
        kept.push(program);
    }

    while let Some(arg) = iter.next() {
        let text = arg.to_string_lossy().into_owned();
        if text == "--" {
            kept.push(arg);
            kept.extend(iter);
            break;
        }
        let Some(option) = text.strip_prefix("--") else {
            kept.push(arg);
            continue;
        };
        let (name, inline_value) = match option.split_once('=') {
            Some((name, _)) => (name, true),
            None => (option, false),
        };
        if known.contains(name) {
            kept.push(arg);
            continue;
        }

        dropped.push(text.clone());
        if !inline_value {
            let takes_value = iter
                .peek()
                .map(|next| !next.to_string_lossy().starts_with('-'))
                .unwrap_or(false);
            if takes_value {
                iter.next();
            }
        }
    }

    (kept, dropped)
}

fn known_long_flags() -> HashSet<String> {
    let command = Cli::command();
    let mut known: HashSet<String> = command
        .get_arguments()
        .flat_map(|arg| {
            arg.get_long()
                .into_iter()
                .chain(arg.get_all_aliases().unwrap_or_default())
                .map(String::from)
                .collect::<Vec<_>>()
        })
        .collect();
    known.insert("help".to_string());
    known.insert("version".to_string());
    known
}

impl Cli {
    /// Parse arguments, ignoring unknown long options
    ///
    /// Returns the dropped options so they can be logged once tracing is up.
    pub fn parse_lenient() -> (Self, Vec<String>) {
        Self::parse_lenient_from(std::env::args_os())
    }

    pub fn parse_lenient_from<I>(args: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = OsString>,
    {
        let (kept, dropped) = filter_unknown_flags(args, &known_long_flags());
        (Self::parse_from(kept), dropped)
    }

    /// Effective per-scenario notification toggle
    pub fn send_each_enabled(&self) -> bool {
        self.send_each || !self.no_send_each
    }

    /// Effective final notification toggle
    pub fn send_final_enabled(&self) -> bool {
        self.send_final || !self.no_send_final
    }

    /// Sweep configuration from the arguments
    pub fn sweep_config(&self) -> SweepConfig {
        let program = Program::new(&self.bench_exe).with_leading_args(self.bench_args.clone());
        let mut base = BaseArgs::new(program, &self.base_url, &self.model);
        base.backend = self.backend.clone();
        base.tokenizer = self.tokenizer.clone();
        base.dataset_name = self.dataset_name.clone();
        base.request_rate = self.request_rate.clone();
        base.profile = self.profile;

        SweepConfig::new(base)
            .with_output_root(&self.output_dir)
            .with_cooldown(Duration::from_secs(self.cooldown_secs))
            .with_scenario_timeout(self.scenario_timeout_secs.map(Duration::from_secs))
            .with_echo(!self.no_echo)
    }

    /// Notification configuration from the arguments
    pub fn notify_config(&self) -> NotifyConfig {
        let recipients = self
            .email_to
            .as_deref()
            .map(NotifyConfig::parse_recipients)
            .unwrap_or_default();
        NotifyConfig::new(self.email_from.clone().unwrap_or_default(), recipients)
            .with_credential_file(&self.credential_file)
            .with_smtp(&self.smtp_server, self.smtp_port)
            .with_triggers(self.send_each_enabled(), self.send_final_enabled())
            .with_preface(self.email_preface.clone())
    }

    /// Handle `--add-key`, `--list-keys` and `--delete-key`
    ///
    /// Returns `true` when a key action ran and no sweep should follow.
    pub fn run_key_action(&self) -> Result<bool> {
        if self.add_key.is_none() && !self.list_keys && self.delete_key.is_none() {
            return Ok(false);
        }

        let mut store = ApiKeyStore::load(&self.key_store)?;

        if let Some(pair) = &self.add_key {
            if let [service, key] = pair.as_slice() {
                store.add(service.as_str(), key.as_str());
                store.save()?;
                println!("Stored API key for {service}");
            }
        }

        if let Some(service) = &self.delete_key {
            if store.delete(service) {
                store.save()?;
                println!("Deleted API key for {service}");
            } else {
                println!("No API key stored for {service}");
            }
        }

        if self.list_keys {
            let keys = store.masked();
            if keys.is_empty() {
                println!("No API keys stored in {}", store.path().display());
            }
            for (service, masked) in keys {
                println!("  {service:<16} {masked}");
            }
        }

        Ok(true)
    }

    fn api_key(&self) -> Option<String> {
        match ApiKeyStore::load(&self.key_store) {
            Ok(store) => store.get(&self.backend).map(String::from),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable API key store");
                None
            }
        }
    }

    fn load_scenarios(&self) -> Result<Vec<ScenarioSpec>> {
        match &self.scenarios {
            Some(path) => load_scenarios(path)
                .with_context(|| format!("Failed to load scenarios from {}", path.display())),
            None => Ok(ScenarioSpec::default_sweep()),
        }
    }

    fn load_extractor(&self) -> Result<MetricExtractor> {
        let table = match &self.metric_labels {
            Some(path) => ExtractionTable::from_file(path)
                .with_context(|| format!("Failed to load metric labels from {}", path.display()))?,
            None => ExtractionTable::default(),
        };
        Ok(MetricExtractor::new(table))
    }

    /// Run key actions or a full sweep based on CLI arguments
    pub async fn run(&self) -> Result<()> {
        if self.run_key_action()? {
            return Ok(());
        }

        let config = self.sweep_config();
        let scenarios = self.load_scenarios()?;
        let notify = self.notify_config();

        tracing::info!("Starting bench-sweep");
        tracing::info!("Base URL: {}", config.base.base_url);
        tracing::info!("Model: {}", config.base.model);
        tracing::info!("Scenarios: {}", scenarios.len());

        println!("\n{}", "=".repeat(70));
        println!("   bench-sweep - Inference Server Load-Test Sweep");
        println!("{}", "=".repeat(70));
        println!();
        println!("Configuration:");
        println!("  Benchmark:    {}", config.base.program.display());
        println!("  Base URL:     {}", config.base.base_url);
        println!("  Model:        {}", config.base.model);
        println!("  Backend:      {}", config.base.backend);
        println!("  Scenarios:    {}", scenarios.len());
        println!("  Cooldown:     {} s", config.cooldown.as_secs());
        println!(
            "  Email:        {}",
            if notify.is_configured() {
                notify.recipients.join(", ")
            } else {
                "disabled".to_string()
            }
        );
        println!("{}", "=".repeat(70));
        println!();

        let system = if self.no_system_info {
            None
        } else {
            Some(SystemInventory::collect().await)
        };

        let orchestrator = OrchestratorBuilder::new()
            .config(config)
            .scenarios(scenarios)
            .extractor(self.load_extractor()?)
            .notify(notify)
            .system_inventory(system)
            .api_key(self.api_key())
            .build()?;

        let outcome = orchestrator.run_with_signal_handling().await?;
        print_outcome(&outcome);
        Ok(())
    }
}

fn print_outcome(outcome: &SweepOutcome) {
    println!("\n{}", "=".repeat(70));
    println!(
        "   Sweep {}",
        if outcome.interrupted {
            "interrupted"
        } else {
            "complete"
        }
    );
    println!("{}", "=".repeat(70));
    println!("  Succeeded:    {}", outcome.state.succeeded_count);
    println!("  Failed:       {}", outcome.state.failed_count);
    if outcome.notifications_sent + outcome.notifications_failed > 0 {
        println!(
            "  Emails:       {} sent, {} failed",
            outcome.notifications_sent, outcome.notifications_failed
        );
    }
    println!("  Run dir:      {}", outcome.run_dir.display());
    println!("  Report:       {}", outcome.report.summary_path.display());
    println!("  CSV:          {}", outcome.report.csv_path.display());
    println!("  JSON:         {}", outcome.report.json_path.display());
    println!("{}", "=".repeat(70));
}
